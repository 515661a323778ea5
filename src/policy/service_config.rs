//! Typed view of a gRPC service config.
//!
//! Only the parts the client acts on are typed: per-method deadlines and
//! retry policies, and retry throttling. Load-balancing entries are kept as
//! opaque JSON since a single-target channel has nothing to balance.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tonic::Code;

/// Upper bound the gRPC runtime places on `maxAttempts`.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Upper bound the gRPC runtime places on `retryThrottling.maxTokens`.
pub const MAX_THROTTLE_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub load_balancing_policy: Option<String>,
    pub load_balancing_config: Vec<serde_json::Value>,
    pub method_config: Vec<MethodConfig>,
    pub retry_throttling: Option<RetryThrottling>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodConfig {
    pub name: Vec<MethodName>,
    /// Informational: the channel is connected before any call is made.
    pub wait_for_ready: Option<bool>,
    #[serde(deserialize_with = "de_opt_duration")]
    pub timeout: Option<Duration>,
    /// Informational: outbound size limits belong to the generated stub.
    #[serde(deserialize_with = "de_opt_bytes")]
    pub max_request_message_bytes: Option<u64>,
    /// Caps the per-method decoding limit of [`crate::net::Connection`].
    #[serde(deserialize_with = "de_opt_bytes")]
    pub max_response_message_bytes: Option<u64>,
    pub retry_policy: Option<RetryPolicy>,
}

/// Selects the methods a [`MethodConfig`] applies to.
///
/// An empty service matches every method; an empty method matches every
/// method of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MethodName {
    pub service: Option<String>,
    pub method: Option<String>,
}

impl MethodName {
    fn service(&self) -> &str {
        self.service.as_deref().unwrap_or_default()
    }

    fn method(&self) -> &str {
        self.method.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(deserialize_with = "de_duration")]
    pub initial_backoff: Duration,
    #[serde(deserialize_with = "de_duration")]
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    #[serde(deserialize_with = "de_codes")]
    pub retryable_status_codes: Vec<Code>,
}

impl RetryPolicy {
    /// `maxAttempts` clamped to what the runtime honors.
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts.min(MAX_RETRY_ATTEMPTS)
    }

    pub fn is_retryable(&self, code: Code) -> bool {
        self.retryable_status_codes.contains(&code)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryThrottling {
    pub max_tokens: u32,
    pub token_ratio: f64,
}

impl ServiceConfig {
    /// Check the rules the gRPC runtime enforces when accepting a config.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<(&str, &str)> = Vec::new();
        for (index, config) in self.method_config.iter().enumerate() {
            for name in &config.name {
                if name.service().is_empty() && !name.method().is_empty() {
                    return Err(format!(
                        "methodConfig[{index}]: method '{}' has no service",
                        name.method()
                    ));
                }
                let key = (name.service(), name.method());
                if seen.contains(&key) {
                    return Err(format!(
                        "methodConfig[{index}]: duplicate name {}/{}",
                        key.0, key.1
                    ));
                }
                seen.push(key);
            }
            if let Some(retry) = &config.retry_policy {
                validate_retry(retry).map_err(|e| format!("methodConfig[{index}]: {e}"))?;
            }
        }

        if let Some(throttling) = &self.retry_throttling {
            if throttling.max_tokens == 0 || throttling.max_tokens > MAX_THROTTLE_TOKENS {
                return Err(format!(
                    "retryThrottling.maxTokens must be in 1..={MAX_THROTTLE_TOKENS}"
                ));
            }
            if throttling.token_ratio <= 0.0 {
                return Err("retryThrottling.tokenRatio must be positive".to_string());
            }
        }
        Ok(())
    }

    /// Config for a full method path such as `/pkg.Service/Method`.
    ///
    /// Exact matches win over service-wide entries, which win over the
    /// default entry.
    pub fn method_config(&self, path: &str) -> Option<&MethodConfig> {
        let (service, method) = split_path(path)?;

        let find = |want_service: &str, want_method: &str| {
            self.method_config.iter().find(|config| {
                config
                    .name
                    .iter()
                    .any(|n| n.service() == want_service && n.method() == want_method)
            })
        };

        find(service, method)
            .or_else(|| find(service, ""))
            .or_else(|| find("", ""))
    }
}

fn validate_retry(retry: &RetryPolicy) -> Result<(), String> {
    if retry.max_attempts <= 1 {
        return Err("retryPolicy.maxAttempts must be greater than 1".to_string());
    }
    if retry.initial_backoff.is_zero() {
        return Err("retryPolicy.initialBackoff must be positive".to_string());
    }
    if retry.max_backoff.is_zero() {
        return Err("retryPolicy.maxBackoff must be positive".to_string());
    }
    if !(retry.backoff_multiplier > 0.0) {
        return Err("retryPolicy.backoffMultiplier must be positive".to_string());
    }
    if retry.retryable_status_codes.is_empty() {
        return Err("retryPolicy.retryableStatusCodes must not be empty".to_string());
    }
    Ok(())
}

fn split_path(path: &str) -> Option<(&str, &str)> {
    let (service, method) = path.strip_prefix('/')?.split_once('/')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some((service, method))
}

/// Parse a protobuf JSON duration such as `"1.5s"`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let number = raw.strip_suffix('s')?;
    let (secs, frac) = match number.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (number, ""),
    };
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: u64 = secs.parse().ok()?;
    let nanos = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().ok()?
    };
    Some(Duration::new(secs, nanos))
}

/// Parse a status code by canonical name or number.
pub fn parse_code(raw: &str) -> Option<Code> {
    let code = match raw {
        "OK" => Code::Ok,
        "CANCELLED" => Code::Cancelled,
        "UNKNOWN" => Code::Unknown,
        "INVALID_ARGUMENT" => Code::InvalidArgument,
        "DEADLINE_EXCEEDED" => Code::DeadlineExceeded,
        "NOT_FOUND" => Code::NotFound,
        "ALREADY_EXISTS" => Code::AlreadyExists,
        "PERMISSION_DENIED" => Code::PermissionDenied,
        "RESOURCE_EXHAUSTED" => Code::ResourceExhausted,
        "FAILED_PRECONDITION" => Code::FailedPrecondition,
        "ABORTED" => Code::Aborted,
        "OUT_OF_RANGE" => Code::OutOfRange,
        "UNIMPLEMENTED" => Code::Unimplemented,
        "INTERNAL" => Code::Internal,
        "UNAVAILABLE" => Code::Unavailable,
        "DATA_LOSS" => Code::DataLoss,
        "UNAUTHENTICATED" => Code::Unauthenticated,
        _ => return code_from_number(raw.parse().ok()?),
    };
    Some(code)
}

fn code_from_number(number: i64) -> Option<Code> {
    match number {
        0..=16 => Some(Code::from(number as i32)),
        _ => None,
    }
}

fn de_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'")))
}

fn de_opt_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{raw}'"))),
        None => Ok(None),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    String(String),
}

fn de_opt_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => u64::try_from(n).ok(),
        Some(NumberOrString::String(s)) => s.parse().ok(),
        None => return Ok(None),
    };
    value
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("message size must be a non-negative integer"))
}

fn de_codes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Code>, D::Error> {
    Vec::<NumberOrString>::deserialize(deserializer)?
        .into_iter()
        .map(|raw| {
            let code = match &raw {
                NumberOrString::Number(n) => code_from_number(*n),
                NumberOrString::String(s) => parse_code(s),
            };
            code.ok_or_else(|| serde::de::Error::custom("unknown status code"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"{
        "loadBalancingConfig": [{"round_robin": {}}],
        "methodConfig": [
            {
                "name": [{"service": "content_access.ContentAccess", "method": "LogRequest"}],
                "timeout": "2.5s",
                "retryPolicy": {
                    "maxAttempts": 4,
                    "initialBackoff": "0.1s",
                    "maxBackoff": "1s",
                    "backoffMultiplier": 2,
                    "retryableStatusCodes": ["UNAVAILABLE", 8]
                }
            },
            {
                "name": [{"service": "content_access.ContentAccess"}],
                "waitForReady": true,
                "maxResponseMessageBytes": "1048576"
            },
            {
                "name": [{}],
                "timeout": "30s"
            }
        ],
        "retryThrottling": {"maxTokens": 10, "tokenRatio": 0.1}
    }"#;

    fn policy() -> ServiceConfig {
        serde_json::from_str(POLICY).unwrap()
    }

    #[test]
    fn parses_full_document() {
        let config = policy();
        assert_eq!(config.method_config.len(), 3);
        assert_eq!(config.load_balancing_config.len(), 1);
        assert_eq!(
            config.retry_throttling,
            Some(RetryThrottling { max_tokens: 10, token_ratio: 0.1 })
        );

        let retry = config.method_config[0].retry_policy.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.initial_backoff, Duration::from_millis(100));
        assert_eq!(retry.max_backoff, Duration::from_secs(1));
        assert_eq!(
            retry.retryable_status_codes,
            vec![Code::Unavailable, Code::ResourceExhausted]
        );
        assert_eq!(config.method_config[1].max_response_message_bytes, Some(1_048_576));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn lookup_precedence() {
        let config = policy();

        let exact = config
            .method_config("/content_access.ContentAccess/LogRequest")
            .unwrap();
        assert_eq!(exact.timeout, Some(Duration::from_millis(2500)));

        let service = config
            .method_config("/content_access.ContentAccess/Other")
            .unwrap();
        assert_eq!(service.wait_for_ready, Some(true));

        let fallback = config.method_config("/other.Service/Call").unwrap();
        assert_eq!(fallback.timeout, Some(Duration::from_secs(30)));

        assert!(config.method_config("not-a-path").is_none());
    }

    #[test]
    fn empty_document_is_valid() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert!(config.method_config("/a.B/C").is_none());
    }

    #[test]
    fn rejects_method_without_service() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"methodConfig": [{"name": [{"method": "Get"}]}]}"#).unwrap();
        assert!(config.validate().unwrap_err().contains("has no service"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"methodConfig": [
                {"name": [{"service": "a.B"}]},
                {"name": [{"service": "a.B"}]}
            ]}"#,
        )
        .unwrap();
        assert!(config.validate().unwrap_err().contains("duplicate"));
    }

    #[test]
    fn rejects_single_attempt_retry() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"methodConfig": [{"name": [{}], "retryPolicy": {
                "maxAttempts": 1, "initialBackoff": "1s", "maxBackoff": "1s",
                "backoffMultiplier": 1, "retryableStatusCodes": ["UNAVAILABLE"]
            }}]}"#,
        )
        .unwrap();
        assert!(config.validate().unwrap_err().contains("maxAttempts"));
    }

    #[test]
    fn rejects_bad_throttling() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"retryThrottling": {"maxTokens": 5000, "tokenRatio": 1}}"#)
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(serde_json::from_str::<ServiceConfig>(
            r#"{"methodConfig": [{"timeout": "10 seconds"}]}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ServiceConfig>(
            r#"{"methodConfig": [{"retryPolicy": {
                "maxAttempts": 2, "initialBackoff": "1s", "maxBackoff": "1s",
                "backoffMultiplier": 1, "retryableStatusCodes": ["TEAPOT"]
            }}]}"#
        )
        .is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("0.000000001s"), Some(Duration::from_nanos(1)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("-1s"), None);
        assert_eq!(parse_duration("1"), None);
        assert_eq!(parse_duration(".5s"), None);
        assert_eq!(parse_duration("1.0000000001s"), None);
    }

    #[test]
    fn codes_by_name_and_number() {
        assert_eq!(parse_code("UNAVAILABLE"), Some(Code::Unavailable));
        assert_eq!(parse_code("14"), Some(Code::Unavailable));
        assert_eq!(parse_code("17"), None);
        assert_eq!(parse_code("unavailable"), None);
    }

    #[test]
    fn attempts_are_capped() {
        let retry = RetryPolicy {
            max_attempts: 9,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            retryable_status_codes: vec![Code::Unavailable],
        };
        assert_eq!(retry.effective_max_attempts(), MAX_RETRY_ATTEMPTS);
        assert!(retry.is_retryable(Code::Unavailable));
        assert!(!retry.is_retryable(Code::Internal));
    }
}
