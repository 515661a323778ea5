//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Validate → Load policy → Dial → hand back Connection
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then policy, then network
//! - The connection lives as long as the returned handle

pub mod startup;
