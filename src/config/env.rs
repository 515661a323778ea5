//! Transport tunables resolved from environment variables.
//!
//! # Responsibilities
//! - Look up each tunable by name, substituting a string default when unset
//! - Parse the string as a float or integer
//! - Substitute a hardcoded fallback when parsing fails or the value is out
//!   of range (zero sizes, zero stream limit, zero ack timeout)
//! - Convert to the target unit (bytes from megabytes, durations from mins/secs)
//!
//! # Design Decisions
//! - Accessors never fail; a malformed value degrades to its fallback
//! - Every substitution is recorded and logged so misconfiguration is visible
//! - The lookup is injectable so resolution can be tested without touching
//!   the process environment

use std::time::Duration;

use crate::config::schema::{ServerKeepalive, TransportConfig};

/// Bytes per megabyte as used by the buffer tunables.
pub const MEGABYTE: f64 = 1024.0 * 1024.0;

/// 32 kB expressed in megabytes.
pub const THIRTY_TWO_KILOBYTES_MB: f64 = 0.032;

pub const READ_BUFFER_VAR: &str = "GRPC_READ_BUFFER_MBs";
pub const WRITE_BUFFER_VAR: &str = "GRPC_WRITE_BUFFER_MBs";
pub const MAX_RECV_VAR: &str = "GRPC_MAX_RECV_MBs";
pub const MAX_CONCURRENT_VAR: &str = "GRPC_MAX_CONCURRENT";
pub const KEEPALIVE_TIME_VAR: &str = "GRPC_KEEPALIVE_MINs";
pub const KEEPALIVE_TIMEOUT_VAR: &str = "GRPC_KEEPALIVE_TIMEOUT_SECs";
pub const MAX_IDLE_VAR: &str = "GRPC_MAX_IDLE_MINs";
pub const CLIENT_KEEPALIVE_VAR: &str = "GRPC_CLIENT_KEEPALIVE_SECs";

pub const READ_BUFFER_DEFAULT: &str = "0.032";
pub const WRITE_BUFFER_DEFAULT: &str = "0.032";
pub const MAX_RECV_DEFAULT: &str = "4.0";
pub const MAX_CONCURRENT_DEFAULT: &str = "10000";
pub const KEEPALIVE_TIME_DEFAULT: &str = "5";
pub const KEEPALIVE_TIMEOUT_DEFAULT: &str = "20";
pub const MAX_IDLE_DEFAULT: &str = "20";
pub const CLIENT_KEEPALIVE_DEFAULT: &str = "60";

const MAX_RECV_FALLBACK_MB: f64 = 4.0;
const MAX_CONCURRENT_FALLBACK: u32 = 100;
const KEEPALIVE_TIME_FALLBACK_MINS: u64 = 120;
const KEEPALIVE_TIMEOUT_FALLBACK_SECS: u64 = 20;
const MAX_IDLE_FALLBACK_MINS: u64 = 20;
const CLIENT_KEEPALIVE_FALLBACK_SECS: u64 = 30;

/// Largest buffer size accepted from the environment.
pub const MAX_BUFFER_SIZE: usize = (1 << 31) - 1;

fn parse_megabytes(raw: &str) -> Option<usize> {
    let mb: f64 = raw.parse().ok()?;
    if !mb.is_finite() || mb < 0.0 {
        return None;
    }
    Some(megabytes_to_bytes(mb))
}

fn megabytes_to_bytes(mb: f64) -> usize {
    (mb * MEGABYTE) as usize
}

fn parse_buffer_size(raw: &str) -> Option<usize> {
    parse_megabytes(raw).filter(|bytes| (1..=MAX_BUFFER_SIZE).contains(bytes))
}

fn parse_message_size(raw: &str) -> Option<usize> {
    parse_megabytes(raw).filter(|&bytes| bytes > 0)
}

fn parse_stream_limit(raw: &str) -> Option<u32> {
    raw.parse().ok().filter(|&limit| limit > 0)
}

fn parse_minutes(raw: &str) -> Option<Duration> {
    let mins: u64 = raw.parse().ok()?;
    mins.checked_mul(60).map(Duration::from_secs)
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.parse().ok().map(Duration::from_secs)
}

fn parse_ack_timeout(raw: &str) -> Option<Duration> {
    parse_seconds(raw).filter(|timeout| !timeout.is_zero())
}

fn buffer_fallback() -> usize {
    megabytes_to_bytes(THIRTY_TWO_KILOBYTES_MB)
}

fn max_recv_fallback() -> usize {
    megabytes_to_bytes(MAX_RECV_FALLBACK_MB)
}

/// Read buffer size in bytes. Falls back to 32 kB.
pub fn read_buffer_size(raw: &str) -> usize {
    parse_buffer_size(raw).unwrap_or_else(buffer_fallback)
}

/// Write buffer size in bytes. Falls back to 32 kB.
pub fn write_buffer_size(raw: &str) -> usize {
    parse_buffer_size(raw).unwrap_or_else(buffer_fallback)
}

/// Maximum receivable message size in bytes. Falls back to 4 MB.
pub fn max_recv_msg_size(raw: &str) -> usize {
    parse_message_size(raw).unwrap_or_else(max_recv_fallback)
}

/// Maximum concurrent streams. Falls back to 100.
pub fn max_concurrent_streams(raw: &str) -> u32 {
    parse_stream_limit(raw).unwrap_or(MAX_CONCURRENT_FALLBACK)
}

/// Server keepalive ping interval. Falls back to two hours.
pub fn keepalive_time(raw: &str) -> Duration {
    parse_minutes(raw).unwrap_or(Duration::from_secs(KEEPALIVE_TIME_FALLBACK_MINS * 60))
}

/// Server keepalive ack timeout. Falls back to 20 seconds.
pub fn keepalive_timeout(raw: &str) -> Duration {
    parse_ack_timeout(raw).unwrap_or(Duration::from_secs(KEEPALIVE_TIMEOUT_FALLBACK_SECS))
}

/// Idle time before a server closes a connection. Falls back to 20 minutes.
pub fn max_idle_time(raw: &str) -> Duration {
    parse_minutes(raw).unwrap_or(Duration::from_secs(MAX_IDLE_FALLBACK_MINS * 60))
}

/// Client keepalive ping interval. Falls back to 30 seconds.
pub fn client_keepalive_time(raw: &str) -> Duration {
    parse_seconds(raw).unwrap_or(Duration::from_secs(CLIENT_KEEPALIVE_FALLBACK_SECS))
}

/// A tunable whose raw value could not be parsed or was out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub var: &'static str,
    pub raw: String,
}

/// Resolves [`TransportConfig`] through a variable lookup.
pub struct EnvResolver<F> {
    lookup: F,
    fallbacks: Vec<Fallback>,
}

impl EnvResolver<fn(&str) -> Option<String>> {
    /// Resolver backed by the process environment.
    pub fn from_process_env() -> Self {
        fn lookup(var: &str) -> Option<String> {
            std::env::var(var).ok()
        }
        Self::new(lookup)
    }
}

impl<F> EnvResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            fallbacks: Vec::new(),
        }
    }

    /// Look up `var`, returning `default` when it is unset.
    pub fn value_or_default(&self, var: &str, default: &str) -> String {
        (self.lookup)(var).unwrap_or_else(|| default.to_string())
    }

    fn resolve_one<T>(
        &mut self,
        var: &'static str,
        default: &str,
        valid: impl Fn(&str) -> bool,
        accessor: impl Fn(&str) -> T,
    ) -> T {
        let raw = self.value_or_default(var, default);
        if !valid(&raw) {
            tracing::warn!(var, raw = %raw, "Unusable transport tunable, using fallback");
            self.fallbacks.push(Fallback {
                var,
                raw: raw.clone(),
            });
        }
        accessor(&raw)
    }

    /// Resolve every tunable.
    pub fn resolve(&mut self) -> TransportConfig {
        let buffer_ok = |raw: &str| parse_buffer_size(raw).is_some();
        let mins_ok = |raw: &str| parse_minutes(raw).is_some();
        let secs_ok = |raw: &str| parse_seconds(raw).is_some();

        let read_buffer_size =
            self.resolve_one(READ_BUFFER_VAR, READ_BUFFER_DEFAULT, buffer_ok, read_buffer_size);
        let write_buffer_size =
            self.resolve_one(WRITE_BUFFER_VAR, WRITE_BUFFER_DEFAULT, buffer_ok, write_buffer_size);
        let max_recv_msg_size = self.resolve_one(
            MAX_RECV_VAR,
            MAX_RECV_DEFAULT,
            |raw| parse_message_size(raw).is_some(),
            max_recv_msg_size,
        );
        let max_concurrent_streams = self.resolve_one(
            MAX_CONCURRENT_VAR,
            MAX_CONCURRENT_DEFAULT,
            |raw| parse_stream_limit(raw).is_some(),
            max_concurrent_streams,
        );
        let time = self.resolve_one(
            KEEPALIVE_TIME_VAR,
            KEEPALIVE_TIME_DEFAULT,
            mins_ok,
            keepalive_time,
        );
        let timeout = self.resolve_one(
            KEEPALIVE_TIMEOUT_VAR,
            KEEPALIVE_TIMEOUT_DEFAULT,
            |raw| parse_ack_timeout(raw).is_some(),
            keepalive_timeout,
        );
        let max_idle = self.resolve_one(MAX_IDLE_VAR, MAX_IDLE_DEFAULT, mins_ok, max_idle_time);
        let client_keepalive_time = self.resolve_one(
            CLIENT_KEEPALIVE_VAR,
            CLIENT_KEEPALIVE_DEFAULT,
            secs_ok,
            client_keepalive_time,
        );

        TransportConfig {
            read_buffer_size,
            write_buffer_size,
            max_recv_msg_size,
            max_concurrent_streams,
            keepalive: ServerKeepalive {
                time,
                timeout,
                max_idle,
            },
            client_keepalive_time,
        }
    }

    /// Tunables that fell back during [`resolve`](Self::resolve).
    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }
}
