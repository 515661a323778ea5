//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call through a Connection:
//!     → timeouts.rs (one deadline for the whole call)
//!     → attempt fails with a retryable code:
//!         retries.rs (throttle check, attempt budget)
//!         → backoff.rs (jittered exponential delay)
//!         → next attempt
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call has a deadline
//! - Retries only for status codes the policy document lists
//! - Throttling is per channel, shared by all methods

pub mod backoff;
pub mod retries;
pub mod timeouts;
