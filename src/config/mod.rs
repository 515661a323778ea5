//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! dial config file (TOML, optional) + CLI overrides
//!     → loader.rs (parse & deserialize)          ─┐
//! environment variables                           ├→ BootstrapConfig
//!     → env.rs (parse with fallbacks)            ─┘
//!     → validation.rs (semantic checks)
//!     → handed to lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup and never mutated
//! - All fields have defaults to allow minimal configs
//! - Env parse failures fall back rather than fail, but are reported

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BootstrapConfig;
pub use schema::DialConfig;
pub use schema::TransportConfig;
