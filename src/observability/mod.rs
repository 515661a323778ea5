//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config resolution, policy loading, dialing, retries
//!     → tracing events with structured fields
//!     → logging.rs (EnvFilter + fmt layer on stdout)
//! ```

pub mod logging;
