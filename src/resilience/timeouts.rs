//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound body reads, upstream exchanges and response production
//! - Report which operation exceeded its deadline
//! - Carry a request's response deadline so inner calls can fit under it

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// An operation did not finish within its deadline.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{operation} timed out after {limit:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

/// The instant by which a request's response must be produced.
///
/// Inserted as a request extension by the server when a write timeout is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self(Instant::now() + limit)
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// Run `future` with a deadline. A zero `limit` disables the deadline.
pub async fn with_deadline<F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    if limit.is_zero() {
        return Ok(future.await);
    }
    tokio::time::timeout(limit, future).await.map_err(|_| {
        tracing::debug!(operation, limit_ms = limit.as_millis() as u64, "Deadline exceeded");
        Elapsed { operation, limit }
    })
}
