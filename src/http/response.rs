//! Response emitter.
//!
//! Turns a finished descriptor into the response written through the normal
//! HTTP path. The body is already fully buffered at this point.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::echo::descriptor::{wire_status, ResponseDescriptor};

/// Build the HTTP response for `descriptor`.
///
/// Codes outside 100..=999 cannot be written on the wire and produce a 500.
pub fn emit(descriptor: ResponseDescriptor) -> Response {
    let status = match wire_status(descriptor.status) {
        Some(status) => status,
        None => {
            tracing::error!(code = descriptor.status, "Status code cannot be sent");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("status code {} cannot be sent", descriptor.status),
            );
        }
    };

    let body = descriptor.body_bytes();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = descriptor.headers;
    response
}

/// A plain-text error response carrying the identification header.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let mut response = (status, format!("{}\n", message)).into_response();
    response.headers_mut().insert(
        header::SERVER,
        HeaderValue::from_static(crate::echo::descriptor::SERVER_NAME),
    );
    response
}
