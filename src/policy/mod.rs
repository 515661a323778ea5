//! Policy document subsystem.
//!
//! # Data Flow
//! ```text
//! policy file on disk
//!     → load_policy (read verbatim; unreadable file is fatal)
//!     → PolicyDocument::parse (gRPC service config JSON)
//!     → ServiceConfig::validate (same rules the gRPC runtime applies)
//!     → attached to the dialed Connection
//! ```
//!
//! # Design Decisions
//! - The raw text is kept alongside the typed view so it can be logged or
//!   forwarded unchanged
//! - Loading happens before any network activity

pub mod service_config;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use service_config::{MethodConfig, MethodName, RetryPolicy, RetryThrottling, ServiceConfig};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy document {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("policy document is not a valid service config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("policy document rejected: {0}")]
    Invalid(String),
}

/// A service config as read from disk.
#[derive(Debug, Clone)]
pub struct PolicyDocument {
    raw: String,
    config: ServiceConfig,
}

impl PolicyDocument {
    pub fn parse(raw: impl Into<String>) -> Result<Self, PolicyError> {
        let raw = raw.into();
        let config: ServiceConfig = serde_json::from_str(&raw)?;
        config.validate().map_err(PolicyError::Invalid)?;
        Ok(Self { raw, config })
    }

    /// The document exactly as it was read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn into_config(self) -> ServiceConfig {
        self.config
    }
}

/// Read and parse the policy document at `path`.
pub fn load_policy(path: &Path) -> Result<PolicyDocument, PolicyError> {
    let raw = fs::read_to_string(path).map_err(|source| PolicyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = PolicyDocument::parse(raw)?;

    tracing::debug!(
        path = ?path,
        method_configs = document.config.method_config.len(),
        retry_throttling = document.config.retry_throttling.is_some(),
        "Policy document loaded"
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn keeps_raw_text_verbatim() {
        let raw = "{ \"methodConfig\": [] }\n";
        let document = PolicyDocument::parse(raw).unwrap();
        assert_eq!(document.raw(), raw);
        assert!(document.config().method_config.is_empty());
    }

    #[test]
    fn unreadable_path_is_read_error() {
        let err = load_policy(Path::new("/nonexistent/grpc_service_policy.yml")).unwrap_err();
        match err {
            PolicyError::Read { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/grpc_service_policy.yml"))
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn yaml_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "methodConfig:\n  - name: []").unwrap();

        let err = load_policy(file.path()).unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let err = PolicyDocument::parse(r#"{"retryThrottling": {"maxTokens": 0, "tokenRatio": 1}}"#)
            .unwrap_err();
        assert!(matches!(err, PolicyError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"methodConfig": [{{"name": [{{}}], "timeout": "5s"}}]}}"#).unwrap();

        let document = load_policy(file.path()).unwrap();
        let config = document.config().method_config("/any.Service/Method").unwrap();
        assert_eq!(config.timeout, Some(std::time::Duration::from_secs(5)));
    }
}
