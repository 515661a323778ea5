//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level at runtime
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set
//! - Transport crates are held at `warn` so handshake chatter stays out

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for `level`, applied to this crate only.
pub fn default_directive(level: &str) -> String {
    format!("grpc_policy_check={level},tonic=warn,h2=warn,rustls=warn")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_parses() {
        let directive = default_directive("debug");
        assert!(directive.starts_with("grpc_policy_check=debug"));
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        init("info");
        init("debug");
    }
}
