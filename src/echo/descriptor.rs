//! The per-request response descriptor.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

/// Value of the identification header every response carries.
pub const SERVER_NAME: &str = "http-echo";

/// Status, headers and body assembled for one request.
///
/// Created by the resolver, adjusted by the proxy delegate, and consumed by
/// either the connection controller or the response emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    /// Status code as requested; not range-checked until it is emitted.
    pub status: i64,
    pub headers: HeaderMap,
    /// Explicit body. `None` means the status text of `status`.
    pub body: Option<Bytes>,
    /// Close the connection without writing anything.
    pub empty: bool,
    /// Write the request body back over the raw connection.
    pub replace: bool,
}

impl ResponseDescriptor {
    pub fn new(status: i64) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
        Self {
            status,
            headers,
            body: None,
            empty: false,
            replace: false,
        }
    }

    /// The bytes that will be sent as the body.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            Some(body) => body.clone(),
            None => status_text_body(self.status),
        }
    }

    /// Swap in an upstream's headers, keeping the identification header
    /// unless the upstream names its own server.
    pub fn replace_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
        if !self.headers.contains_key(header::SERVER) {
            self.headers
                .insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
        }
    }
}

impl Default for ResponseDescriptor {
    fn default() -> Self {
        Self::new(200)
    }
}

/// The standard reason phrase for `status` followed by a newline; just the
/// newline for codes without one.
pub fn status_text_body(status: i64) -> Bytes {
    let reason = wire_status(status)
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");
    Bytes::from(format!("{}\n", reason))
}

/// The status as it can be put on the wire, if it can (100..=999).
pub fn wire_status(status: i64) -> Option<StatusCode> {
    u16::try_from(status)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
}
