//! grpc-policy-check
//!
//! Opens one TLS-secured gRPC channel to a remote host using a service
//! policy document read from disk, then exits.
//!
//! # Flow
//!
//! ```text
//!   CLI flags ──┐
//!   dial.toml ──┼─▶ DialConfig ─┐
//!               │               ├─▶ validate ─▶ load policy ─▶ dial (TLS, h2) ─▶ exit
//!   GRPC_* env ─┴─▶ TransportConfig
//! ```
//!
//! # Exit codes
//! - `0` connected
//! - `1` configuration or policy document rejected (nothing dialed)
//! - `2` dial failed or timed out

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use grpc_policy_check::config::loader::{load_dial_config, ConfigError};
use grpc_policy_check::config::schema::DialConfig;
use grpc_policy_check::lifecycle::startup::{self, StartupError};
use grpc_policy_check::observability::logging;

#[derive(Parser)]
#[command(name = "grpc-policy-check")]
#[command(about = "Dial a gRPC endpoint over TLS with a service policy document", long_about = None)]
struct Cli {
    /// Dial settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote host:port
    #[arg(short, long)]
    target: Option<String>,

    /// Policy document (gRPC service config JSON)
    #[arg(short, long)]
    policy: Option<PathBuf>,

    /// Dial timeout in seconds
    #[arg(long)]
    dial_timeout_secs: Option<u64>,

    /// Extra PEM CA bundle to trust
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn dial_config(&self) -> Result<DialConfig, ConfigError> {
        let mut dial = match &self.config {
            Some(path) => load_dial_config(path)?,
            None => DialConfig::default(),
        };

        if let Some(target) = &self.target {
            dial.target = target.clone();
        }
        if let Some(policy) = &self.policy {
            dial.policy_path = policy.clone();
        }
        if let Some(secs) = self.dial_timeout_secs {
            dial.dial_timeout_secs = secs;
        }
        if let Some(ca_cert) = &self.ca_cert {
            dial.tls.ca_cert_path = Some(ca_cert.clone());
        }
        Ok(dial)
    }
}

async fn check(cli: &Cli) -> Result<(), StartupError> {
    let config = startup::prepare(cli.dial_config()?)?;
    let connection = startup::run(&config).await?;

    tracing::info!(
        remote = connection.target(),
        method_configs = connection.policy().method_config.len(),
        "Policy check passed"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    tracing::info!("grpc-policy-check v{} starting", env!("CARGO_PKG_VERSION"));

    match check(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Policy check failed");
            ExitCode::from(e.exit_code())
        }
    }
}
