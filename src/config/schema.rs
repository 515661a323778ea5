//! Configuration schema definitions.
//!
//! `DialConfig` carries the bootstrap's connection settings and derives Serde
//! traits so it can be read from a TOML file. `TransportConfig` is resolved
//! from the environment (see [`crate::config::env`]).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the bootstrap needs, constructed once at startup.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub dial: DialConfig,
    pub transport: TransportConfig,
}

/// Outbound connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DialConfig {
    /// Remote `host:port`.
    pub target: String,

    /// Path to the policy document (gRPC service config).
    pub policy_path: PathBuf,

    /// Upper bound on connection establishment, in seconds.
    pub dial_timeout_secs: u64,

    /// Default per-call deadline when the policy sets none, in seconds.
    pub call_timeout_secs: u64,

    /// Transport security settings.
    pub tls: TlsSettings,

    /// Client keepalive settings.
    pub keepalive: KeepaliveSettings,

    /// Bytes the connection may have in flight before waiting on the peer.
    pub write_buffer_size: usize,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            target: "api.dev.siden.io:443".to_string(),
            policy_path: PathBuf::from("./grpc_service_policy.yml"),
            dial_timeout_secs: 10,
            call_timeout_secs: 15,
            tls: TlsSettings::default(),
            keepalive: KeepaliveSettings::default(),
            write_buffer_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

impl DialConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Lowest TLS protocol version the client will negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum TlsVersion {
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    #[default]
    Tls13,
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsVersion::Tls12 => write!(f, "TLSv1.2"),
            TlsVersion::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

/// Transport security settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsSettings {
    /// Minimum protocol version (default 1.3).
    pub min_version: TlsVersion,

    /// Extra PEM CA bundle trusted in addition to the webpki roots.
    pub ca_cert_path: Option<PathBuf>,
}

/// Client keepalive settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeepaliveSettings {
    /// Ping interval in seconds.
    pub interval_secs: u64,

    /// Send pings even without active streams.
    pub permit_without_stream: bool,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            permit_without_stream: true,
        }
    }
}

impl KeepaliveSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Transport tunables resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Bytes. Reported only; the HTTP/2 stream window keeps its default.
    pub read_buffer_size: usize,
    /// Bytes. Reported only; the dial applies
    /// [`DialConfig::write_buffer_size`] instead.
    pub write_buffer_size: usize,
    /// Bytes.
    pub max_recv_msg_size: usize,
    pub max_concurrent_streams: u32,
    pub keepalive: ServerKeepalive,
    pub client_keepalive_time: Duration,
}

/// Server-side keepalive enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerKeepalive {
    /// Ping an idle client after this long.
    pub time: Duration,
    /// Close the connection if a ping is not acknowledged within this.
    pub timeout: Duration,
    /// Close connections idle for longer than this.
    pub max_idle: Duration,
}

impl TransportConfig {
    pub fn server_keepalive(&self) -> ServerKeepalive {
        self.keepalive
    }
}
