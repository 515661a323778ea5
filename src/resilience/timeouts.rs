//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole call (every attempt and backoff) by one deadline
//! - Cancel the in-flight attempt cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Elapsed deadlines surface as `DEADLINE_EXCEEDED`, like a server-side expiry

use std::future::Future;
use std::time::Duration;

use tonic::Status;

/// Run `call` under `deadline`.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(Status::deadline_exceeded(format!(
            "deadline of {deadline:?} exceeded"
        ))),
    }
}
