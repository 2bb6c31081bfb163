//! HTTP echo endpoint library.
//!
//! A scriptable HTTP server for exercising clients, proxies and load
//! balancers: status code, headers, body, latency and upstream proxying are
//! set from defaults and per-request query parameters, and a request can ask
//! for its connection to be dropped or for raw bytes to be written in place
//! of a normal response.

// Core subsystems
pub mod config;
pub mod echo;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::EchoConfig;
pub use http::EchoServer;
pub use lifecycle::Shutdown;
