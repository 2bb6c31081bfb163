//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, filtered by level)
//!
//! The request handler additionally produces:
//!     → console.rs (human-readable request/response dump on stdout)
//! ```
//!
//! # Design Decisions
//! - Logs and the console dump are separate streams; either can be silenced
//! - Request ID flows through all request-scoped log events

pub mod console;
pub mod logging;

pub use console::Console;
