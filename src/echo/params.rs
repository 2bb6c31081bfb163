//! Query-string parameter parsing.
//!
//! # Recognized parameters
//! - `delay`, `jitter`: milliseconds
//! - `codes`: comma-separated code pool
//! - `code`: integer, or `random`/`r`
//! - `location`: `Location` header value
//! - `headers`: flat `key,value,...` list
//! - `empty`: `true` closes the connection without a response
//! - `replace` / `hijack`: `true` writes the request body back raw
//! - `proxy`: upstream URL (only when query overrides are enabled)
//!
//! Malformed integers and URLs are logged and ignored so the request still
//! proceeds. A malformed header list fails the request.

use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use thiserror::Error;

use crate::echo::codes::{parse_code_list, CodeSpec};

/// Errors produced while parsing request parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("{param}: '{value}' is not a valid integer")]
    InvalidInteger { param: &'static str, value: String },

    #[error("headers: expected key,value pairs but got {count} items")]
    OddHeaderList { count: usize },

    #[error("headers: '{0}' is not a valid header name")]
    InvalidHeaderName(String),

    #[error("headers: invalid value for '{0}'")]
    InvalidHeaderValue(String),

    #[error("proxy: '{value}' is not a usable upstream URL: {reason}")]
    InvalidProxyTarget { value: String, reason: String },
}

/// Overrides carried by one request's query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOverrides {
    pub delay_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub codes: Option<Vec<i64>>,
    pub code: Option<CodeSpec>,
    pub location: Option<HeaderValue>,
    pub headers: HeaderMap,
    pub proxy: Option<Uri>,
    pub empty: bool,
    pub replace: bool,
}

impl QueryOverrides {
    /// Parse the raw query string. Only header-list errors are returned;
    /// everything else is logged and the parameter skipped.
    pub fn parse(query: Option<&str>) -> Result<Self, ParamError> {
        let mut params: HashMap<String, String> = HashMap::new();
        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                // First occurrence wins.
                params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
            }
        }
        let get = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());

        let mut overrides = QueryOverrides::default();

        // Fatal errors first, so a rejected request changes nothing.
        if let Some(list) = get("headers") {
            overrides.headers = parse_header_list(list.split(','))?;
        }

        overrides.delay_ms = get("delay").and_then(|v| soft(parse_millis("delay", v)));
        overrides.jitter_ms = get("jitter").and_then(|v| soft(parse_millis("jitter", v)));
        overrides.codes = get("codes").and_then(|v| soft(parse_code_list(v)));
        overrides.code = get("code").and_then(|v| soft(v.parse::<CodeSpec>()));
        overrides.location = get("location").and_then(|v| {
            soft(
                HeaderValue::from_str(v)
                    .map_err(|_| ParamError::InvalidHeaderValue("Location".into())),
            )
        });
        overrides.proxy = get("proxy").and_then(|v| soft(parse_proxy_target(v)));
        overrides.empty = get("empty") == Some("true");
        overrides.replace = get("replace") == Some("true") || get("hijack") == Some("true");

        Ok(overrides)
    }
}

fn soft<T>(result: Result<T, ParamError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring query parameter");
            None
        }
    }
}

fn parse_millis(param: &'static str, value: &str) -> Result<u64, ParamError> {
    value.parse().map_err(|_| ParamError::InvalidInteger {
        param,
        value: value.to_string(),
    })
}

/// Parse a flat `key,value,key,value` list into a header map.
///
/// Later duplicates replace earlier ones. An odd item count is an error.
pub fn parse_header_list<'a, I>(items: I) -> Result<HeaderMap, ParamError>
where
    I: IntoIterator<Item = &'a str>,
{
    let items: Vec<&str> = items.into_iter().collect();
    if items.len() % 2 != 0 {
        return Err(ParamError::OddHeaderList { count: items.len() });
    }

    let mut headers = HeaderMap::new();
    for pair in items.chunks(2) {
        let name = HeaderName::from_bytes(pair[0].trim().as_bytes())
            .map_err(|_| ParamError::InvalidHeaderName(pair[0].to_string()))?;
        let value = HeaderValue::from_str(pair[1])
            .map_err(|_| ParamError::InvalidHeaderValue(pair[0].to_string()))?;
        tracing::debug!(name = %name, value = ?value, "Custom header");
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Validate an upstream URL. Only plain `http` targets can be reached.
pub fn parse_proxy_target(value: &str) -> Result<Uri, ParamError> {
    let invalid = |reason: String| ParamError::InvalidProxyTarget {
        value: value.to_string(),
        reason,
    };

    let url = url::Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    url.as_str().parse::<Uri>().map_err(|e| invalid(e.to_string()))
}
