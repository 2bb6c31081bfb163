//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! request body read      → timeouts.rs (read deadline)
//! upstream proxy call    → timeouts.rs (proxy deadline)
//! response production    → timeouts.rs (write deadline)
//! ```
//!
//! # Design Decisions
//! - Every external wait has a deadline
//! - Timeout errors are distinct from other errors

pub mod timeouts;
