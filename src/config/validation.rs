//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of dial settings (serde handles syntax)
//! - Validate value ranges (timeouts > 0, window sizes within HTTP/2 limits)
//! - Check the dial target is a `host:port` pair
//!
//! Environment tunables are not checked here: the env resolver already
//! replaces unusable values with fallbacks.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BootstrapConfig → Result<(), Vec<ValidationError>>
//! - Runs before the policy document is read or any dial is attempted

use thiserror::Error;

use crate::config::schema::{BootstrapConfig, DialConfig};

/// Largest flow-control window HTTP/2 permits.
pub const MAX_WINDOW_SIZE: usize = (1 << 31) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("target '{0}' is not a host:port pair")]
    InvalidTarget(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} of {value} bytes exceeds the HTTP/2 window limit")]
    WindowTooLarge { field: &'static str, value: usize },
}

pub fn validate_config(config: &BootstrapConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_dial(&config.dial, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_dial(dial: &DialConfig, errors: &mut Vec<ValidationError>) {
    if split_target(&dial.target).is_none() {
        errors.push(ValidationError::InvalidTarget(dial.target.clone()));
    }
    if dial.dial_timeout_secs == 0 {
        errors.push(ValidationError::Zero("dial_timeout_secs"));
    }
    if dial.call_timeout_secs == 0 {
        errors.push(ValidationError::Zero("call_timeout_secs"));
    }
    if dial.keepalive.interval_secs == 0 {
        errors.push(ValidationError::Zero("keepalive.interval_secs"));
    }
    check_window("write_buffer_size", dial.write_buffer_size, errors);
}

fn check_window(field: &'static str, value: usize, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::Zero(field));
    } else if value > MAX_WINDOW_SIZE {
        errors.push(ValidationError::WindowTooLarge { field, value });
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
pub fn split_target(target: &str) -> Option<(&str, u16)> {
    let (host, port) = target.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() || (host.contains(':') && !target.starts_with('[')) {
        return None;
    }
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::EnvResolver;

    fn valid_config() -> BootstrapConfig {
        BootstrapConfig {
            dial: DialConfig::default(),
            transport: EnvResolver::new(|_: &str| None).resolve(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = valid_config();
        config.dial.target = "no-port".into();
        config.dial.dial_timeout_secs = 0;
        config.dial.keepalive.interval_secs = 0;
        config.dial.write_buffer_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidTarget("no-port".into()),
                ValidationError::Zero("dial_timeout_secs"),
                ValidationError::Zero("keepalive.interval_secs"),
                ValidationError::Zero("write_buffer_size"),
            ]
        );
    }

    #[test]
    fn oversized_window_rejected() {
        let mut config = valid_config();
        config.dial.write_buffer_size = MAX_WINDOW_SIZE + 1;

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::WindowTooLarge { field: "write_buffer_size", .. }
        ));
    }

    #[test]
    fn splits_targets() {
        assert_eq!(split_target("api.dev.siden.io:443"), Some(("api.dev.siden.io", 443)));
        assert_eq!(split_target("[::1]:50051"), Some(("::1", 50051)));
        assert_eq!(split_target("::1:50051"), None);
        assert_eq!(split_target(":443"), None);
        assert_eq!(split_target("host:http"), None);
    }
}
