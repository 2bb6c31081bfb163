//! Upstream proxy delegate.
//!
//! # Responsibilities
//! - Forward the inbound method, headers and body to the configured target
//! - Buffer the upstream response in full
//! - Replace the descriptor's headers and body with the upstream's
//!
//! # Design Decisions
//! - The locally computed status code is kept; only headers and body change
//! - One pooled client per process (bounded idle connections, idle eviction)
//! - Failures are returned to the caller, which logs them and carries on with
//!   the local response

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, request, HeaderMap, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::echo::descriptor::ResponseDescriptor;
use crate::resilience::timeouts::{with_deadline, Elapsed};

/// Errors from an upstream exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),

    #[error(transparent)]
    Timeout(#[from] Elapsed),
}

/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Upstream {
    /// Replace the descriptor's headers and body with this response's.
    pub fn apply_to(self, descriptor: &mut ResponseDescriptor) {
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);
        // The body is re-framed locally.
        headers.remove(header::CONTENT_LENGTH);
        descriptor.replace_headers(headers);
        descriptor.body = Some(self.body);
    }
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Forwards requests to an upstream origin over a pooled client.
#[derive(Clone)]
pub struct ProxyDelegate {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl ProxyDelegate {
    pub fn new(config: &ProxyConfig, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(HttpConnector::new());

        Self { client, timeout }
    }

    /// Send the inbound request to `target` and buffer the reply.
    ///
    /// The exchange is bounded by the proxy timeout, and also by `budget`
    /// when the caller has less time than that left.
    pub async fn forward(
        &self,
        target: &Uri,
        parts: &request::Parts,
        body: Bytes,
        budget: Option<Duration>,
    ) -> Result<Upstream, ProxyError> {
        let mut builder = Request::builder().method(parts.method.clone()).uri(target.clone());
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                if name == header::HOST || name == header::CONTENT_LENGTH {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
            strip_hop_by_hop(headers);
        }
        let request = builder.body(Body::from(body))?;

        tracing::debug!(upstream = %target, method = %parts.method, "Forwarding to upstream");

        let exchange = async {
            let response = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), usize::MAX).await?;
            Ok::<_, ProxyError>(Upstream {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        let limit = match budget {
            Some(budget) if self.timeout.is_zero() => budget,
            Some(budget) => self.timeout.min(budget),
            None => self.timeout,
        };
        let upstream = with_deadline("upstream exchange", limit, exchange).await??;
        tracing::debug!(
            upstream = %target,
            status = %upstream.status,
            body_len = upstream.body.len(),
            "Upstream responded"
        );
        Ok(upstream)
    }
}
