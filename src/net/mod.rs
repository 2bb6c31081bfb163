//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (optional TLS handshake)
//!     → takeover.rs (shared stream, write-state machine, stall timers)
//!     → connection.rs (lifecycle tracking for drain)
//!     → Hand off to HTTP layer
//!
//! Write States:
//!     Unstarted → NormalWrite → RawTakeover → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled transparently; takeover works over both

pub mod connection;
pub mod listener;
pub mod takeover;
pub mod tls;
