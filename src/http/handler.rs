//! The per-request response pipeline.
//!
//! ```text
//! buffer body → parse query → resolve descriptor → dump request
//!     → delay + jitter → [proxy] → [close | raw replace] → dump response → emit
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
};

use crate::echo::latency;
use crate::echo::params::QueryOverrides;
use crate::http::controller;
use crate::http::request::request_id;
use crate::http::response::{emit, error_response};
use crate::http::server::{AppState, RequestLimits};
use crate::net::takeover::ConnectionHandle;
use crate::resilience::timeouts::{with_deadline, Deadline};

/// Part of the write deadline kept back from the upstream call.
const RESPONSE_RESERVE: Duration = Duration::from_millis(50);

/// Handler for every method on every path.
pub async fn echo_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request);
    let connection = request.extensions().get::<ConnectionHandle>().cloned();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let deadline = request.extensions().get::<Deadline>().copied();
    let (parts, body) = request.into_parts();

    tracing::debug!(
        request_id = %request_id,
        peer = %peer,
        method = %parts.method,
        uri = %parts.uri,
        "Handling request"
    );

    // 1. Buffer the request body
    let body = match read_body(body, state.limits).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    // 2. Parse query overrides
    let overrides = match QueryOverrides::parse(parts.uri.query()) {
        Ok(overrides) => overrides,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting request parameters");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    // 3. Resolve against the shared settings
    let resolved = state.settings.resolve(&overrides);
    state.console.request(&parts, &body);

    // 4. Latency
    latency::inject(resolved.delay_ms, resolved.jitter_ms).await;

    // 5. Upstream proxy
    let mut descriptor = resolved.descriptor;
    if let Some(target) = &resolved.proxy_target {
        // Leave room to send the local response if the upstream runs late.
        let budget = deadline.map(|d| d.remaining().saturating_sub(RESPONSE_RESERVE));
        if budget.is_some_and(|b| b.is_zero()) {
            tracing::warn!(
                request_id = %request_id,
                upstream = %target,
                "No time left before the write deadline, sending local response"
            );
        } else {
            match state.proxy.forward(target, &parts, body.clone(), budget).await {
                Ok(upstream) => {
                    state.console.upstream(&upstream);
                    upstream.apply_to(&mut descriptor);
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        upstream = %target,
                        error = %e,
                        "Proxy failed, sending local response"
                    );
                }
            }
        }
    }

    // 6. Connection control
    if descriptor.empty {
        return match controller::abrupt_close(connection.as_ref()).await {
            Ok(()) => taken_over(),
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Could not close connection");
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        };
    }
    if descriptor.replace {
        return match controller::raw_replace(connection.as_ref(), &body).await {
            Ok(_) => {
                state.console.raw(&controller::replacement_bytes(&body));
                taken_over()
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Raw replacement failed");
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        };
    }

    // 7. Normal response
    state.console.response(&descriptor);
    tracing::debug!(request_id = %request_id, status = descriptor.status, "Sending response");
    emit(descriptor)
}

async fn read_body(body: Body, limits: RequestLimits) -> Result<Bytes, Response> {
    let buffered = axum::body::to_bytes(body, limits.max_body_bytes);
    match with_deadline("request body", limits.read_timeout, buffered).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Failed to read request body");
            Err(error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body rejected"))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Request body read timed out");
            Err(error_response(StatusCode::REQUEST_TIMEOUT, &e.to_string()))
        }
    }
}

/// Placeholder returned once the connection has been taken over; the
/// server never writes it.
fn taken_over() -> Response {
    Response::new(Body::empty())
}
