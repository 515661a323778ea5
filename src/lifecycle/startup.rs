//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve transport tunables and validate the combined configuration
//! - Load the policy document
//! - Dial the target
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Ordered: config first, then policy, then network
//! - Nothing touches the network until the policy document has been read

use thiserror::Error;

use crate::config::loader::{build_config, load_transport_config, ConfigError};
use crate::config::schema::{BootstrapConfig, DialConfig};
use crate::net::dial::{dial, Connection, DialError};
use crate::policy::{load_policy, PolicyError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Dial(#[from] DialError),
}

impl StartupError {
    /// Process exit code: 1 before any dial was attempted, 2 for dial failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(_) | StartupError::Policy(_) => 1,
            StartupError::Dial(_) => 2,
        }
    }
}

/// Merge `dial` with the environment's transport tunables.
pub fn prepare(dial: DialConfig) -> Result<BootstrapConfig, StartupError> {
    let (transport, fallbacks) = load_transport_config();
    if !fallbacks.is_empty() {
        tracing::warn!(
            count = fallbacks.len(),
            vars = ?fallbacks.iter().map(|f| f.var).collect::<Vec<_>>(),
            "Transport tunables fell back to defaults"
        );
    }

    let config = build_config(dial, transport)?;
    tracing::info!(
        read_buffer_size = config.transport.read_buffer_size,
        write_buffer_size = config.transport.write_buffer_size,
        max_recv_msg_size = config.transport.max_recv_msg_size,
        max_concurrent_streams = config.transport.max_concurrent_streams,
        keepalive_timeout_secs = config.transport.keepalive.timeout.as_secs(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Load the policy document and dial.
pub async fn run(config: &BootstrapConfig) -> Result<Connection, StartupError> {
    let policy = load_policy(&config.dial.policy_path)?;
    let connection = dial(&config.dial, &config.transport, policy).await?;
    Ok(connection)
}
