//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, hyper connection, deadlines)
//!     → request.rs (request ID)
//!     → handler.rs (resolve, delay, proxy)
//!         ├── proxy.rs (forward to upstream, merge its response)
//!         ├── controller.rs (abrupt close | raw replacement)
//!         └── response.rs (descriptor → HTTP response)
//!     → Send to client
//! ```

pub mod controller;
pub mod handler;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{EchoServer, ServerError};
