//! Outbound connection establishment.
//!
//! # Responsibilities
//! - Translate dial settings and transport tunables into an HTTP/2 endpoint
//! - Connect over TLS within the dial timeout
//! - Attach the policy document to the resulting connection

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::config::schema::{DialConfig, KeepaliveSettings, TransportConfig};
use crate::config::validation::{split_target, MAX_WINDOW_SIZE};
use crate::net::connector::TlsConnector;
use crate::net::tls::{client_config, TlsError};
use crate::policy::{PolicyDocument, ServiceConfig};
use crate::resilience::retries::{call_with_policy, RetryThrottle};

#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid dial target '{0}'")]
    InvalidTarget(String),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("{}", with_causes(.0))]
    Transport(#[from] tonic::transport::Error),

    #[error("dial to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },
}

/// `err` followed by each of its sources, colon separated.
///
/// tonic's transport error only says "transport error"; the rustls or io
/// cause sits further down the chain.
pub fn with_causes(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Client keepalive parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientKeepalive {
    /// Ping interval.
    pub interval: Duration,
    /// Ping even when no streams are open.
    pub permit_without_stream: bool,
}

impl Default for ClientKeepalive {
    fn default() -> Self {
        Self::from(&KeepaliveSettings::default())
    }
}

impl From<&KeepaliveSettings> for ClientKeepalive {
    fn from(settings: &KeepaliveSettings) -> Self {
        Self {
            interval: settings.interval(),
            permit_without_stream: settings.permit_without_stream,
        }
    }
}

fn window(size: usize) -> u32 {
    size.min(MAX_WINDOW_SIZE) as u32
}

/// Build the endpoint for `dial.target`.
pub fn endpoint(dial: &DialConfig, transport: &TransportConfig) -> Result<Endpoint, DialError> {
    let invalid = || DialError::InvalidTarget(dial.target.clone());

    let (host, port) = split_target(&dial.target).ok_or_else(invalid)?;
    let uri = if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    };
    let keepalive = ClientKeepalive::from(&dial.keepalive);

    let endpoint = Endpoint::from_shared(uri)
        .map_err(|_| invalid())?
        .connect_timeout(dial.dial_timeout())
        .tcp_nodelay(true)
        .http2_keep_alive_interval(keepalive.interval)
        .keep_alive_while_idle(keepalive.permit_without_stream)
        .keep_alive_timeout(transport.keepalive.timeout)
        .initial_connection_window_size(window(dial.write_buffer_size))
        .concurrency_limit(transport.max_concurrent_streams as usize);

    Ok(endpoint)
}

/// Open a TLS connection to `dial.target`, failing once the dial timeout
/// elapses.
pub async fn dial(
    dial: &DialConfig,
    transport: &TransportConfig,
    policy: PolicyDocument,
) -> Result<Connection, DialError> {
    let tls = client_config(&dial.tls)?;
    let endpoint = endpoint(dial, transport)?;
    let timeout = dial.dial_timeout();

    tracing::info!(
        remote = %dial.target,
        min_tls_version = %dial.tls.min_version,
        dial_timeout_secs = dial.dial_timeout_secs,
        keepalive_secs = dial.keepalive.interval_secs,
        write_buffer_size = dial.write_buffer_size,
        "Dialing"
    );

    let connect = endpoint.connect_with_connector(TlsConnector::new(tls));
    let channel = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| DialError::Timeout {
            target: dial.target.clone(),
            timeout,
        })??;

    tracing::info!(remote = %dial.target, "Connected");

    Ok(Connection::new(
        dial.target.clone(),
        channel,
        policy.into_config(),
        dial.call_timeout(),
        transport.max_recv_msg_size,
    ))
}

/// An open channel plus the policy that governs calls on it.
///
/// The underlying connection closes when the last clone of the channel is
/// dropped.
#[derive(Debug, Clone)]
pub struct Connection {
    target: String,
    channel: Channel,
    policy: Arc<ServiceConfig>,
    throttle: Option<Arc<RetryThrottle>>,
    call_timeout: Duration,
    max_decoding_message_size: usize,
}

impl Connection {
    fn new(
        target: String,
        channel: Channel,
        policy: ServiceConfig,
        call_timeout: Duration,
        max_decoding_message_size: usize,
    ) -> Self {
        let throttle = policy
            .retry_throttling
            .as_ref()
            .map(|config| Arc::new(RetryThrottle::new(config)));
        Self {
            target,
            channel,
            policy: Arc::new(policy),
            throttle,
            call_timeout,
            max_decoding_message_size,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Channel for constructing generated client stubs.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    pub fn policy(&self) -> &ServiceConfig {
        &self.policy
    }

    /// Limit to pass to a generated stub's `max_decoding_message_size`.
    pub fn max_decoding_message_size(&self) -> usize {
        self.max_decoding_message_size
    }

    /// Decoding limit for the method at `path`: the smaller of the
    /// transport limit and the policy's `maxResponseMessageBytes`.
    pub fn max_decoding_message_size_for(&self, path: &str) -> usize {
        self.policy
            .method_config(path)
            .and_then(|config| config.max_response_message_bytes)
            .map_or(self.max_decoding_message_size, |limit| {
                usize::try_from(limit)
                    .unwrap_or(usize::MAX)
                    .min(self.max_decoding_message_size)
            })
    }

    /// Deadline for `path`: the policy's method timeout, else the default.
    ///
    /// Enforced on the client only; it is not sent as `grpc-timeout`.
    pub fn deadline_for(&self, path: &str) -> Duration {
        self.policy
            .method_config(path)
            .and_then(|config| config.timeout)
            .unwrap_or(self.call_timeout)
    }

    /// Run a unary call for the method at `path` (e.g.
    /// `/pkg.Service/Method`) under its policy deadline and retry rules.
    pub async fn invoke<T, F, Fut>(&self, path: &str, mut call: F) -> Result<T, Status>
    where
        F: FnMut(Channel) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let retry = self
            .policy
            .method_config(path)
            .and_then(|config| config.retry_policy.as_ref());

        call_with_policy(
            self.deadline_for(path),
            retry,
            self.throttle.as_deref(),
            || call(self.channel.clone()),
        )
        .await
    }
}
