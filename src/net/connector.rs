//! TLS connector handed to the gRPC channel.
//!
//! # Responsibilities
//! - Resolve and connect TCP to the URI authority
//! - Run the rustls handshake with the configured client config
//! - Wrap the stream for hyper's IO traits
//!
//! # Design Decisions
//! - TLS is terminated here rather than inside the channel so the minimum
//!   protocol version stays under our control
//! - The connection deadline is enforced by the caller, not per step

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tonic::transport::Uri;
use tower::Service;

const DEFAULT_TLS_PORT: u16 = 443;

/// `Service<Uri>` that yields TLS streams.
#[derive(Clone)]
pub struct TlsConnector {
    tls: Arc<ClientConfig>,
}

impl TlsConnector {
    pub fn new(tls: Arc<ClientConfig>) -> Self {
        Self { tls }
    }
}

impl Service<Uri> for TlsConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = tokio_rustls::TlsConnector::from(Arc::clone(&self.tls));

        Box::pin(async move {
            let (host, port) = authority(&uri)?;
            let tcp = TcpStream::connect((host.as_str(), port)).await?;
            tcp.set_nodelay(true)?;

            let server_name = ServerName::try_from(host)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let stream = connector.connect(server_name, tcp).await?;

            let (_, session) = stream.get_ref();
            tracing::debug!(
                protocol = ?session.protocol_version(),
                alpn = ?session.alpn_protocol().map(String::from_utf8_lossy),
                "TLS session established"
            );
            Ok(TokioIo::new(stream))
        })
    }
}

/// Host (without IPv6 brackets) and port of `uri`.
pub fn authority(uri: &Uri) -> io::Result<(String, u16)> {
    let host = uri.host().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("URI '{uri}' has no host"))
    })?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let port = uri.port_u16().unwrap_or(DEFAULT_TLS_PORT);
    Ok((host.to_string(), port))
}
