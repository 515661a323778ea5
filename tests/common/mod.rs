//! Shared utilities for bootstrap integration tests.

use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rcgen::CertifiedKey;
use rustls::crypto::ring;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, SupportedProtocolVersion};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use grpc_policy_check::config::env::EnvResolver;
use grpc_policy_check::{BootstrapConfig, DialConfig};

pub const POLICY: &str = r#"{
    "methodConfig": [{
        "name": [{"service": "content_access.ContentAccess"}],
        "timeout": "15s",
        "retryPolicy": {
            "maxAttempts": 3,
            "initialBackoff": "0.5s",
            "maxBackoff": "5s",
            "backoffMultiplier": 2,
            "retryableStatusCodes": ["UNAVAILABLE"]
        }
    }]
}"#;

/// Write `contents` to a temporary policy file.
pub fn policy_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Config aimed at `target` with env tunables at their defaults.
pub fn config(
    target: impl Into<String>,
    policy_path: PathBuf,
    dial_timeout_secs: u64,
) -> BootstrapConfig {
    BootstrapConfig {
        dial: DialConfig {
            target: target.into(),
            policy_path,
            dial_timeout_secs,
            ..DialConfig::default()
        },
        transport: EnvResolver::new(|_: &str| None).resolve(),
    }
}

/// Start a server that accepts TCP connections and never speaks.
///
/// Returns its address and a counter of accepted connections.
pub async fn start_silent_server() -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    (addr, accepted)
}

/// An address with nothing listening on it.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A local TLS server speaking HTTP/2, with a self-signed `localhost`
/// certificate.
pub struct TlsServer {
    pub addr: SocketAddr,
    /// PEM file holding the server certificate, to trust as a CA.
    pub ca: NamedTempFile,
}

impl TlsServer {
    pub fn target(&self) -> String {
        format!("localhost:{}", self.addr.port())
    }
}

/// Start a TLS server that only negotiates `versions` and answers every
/// HTTP/2 request with an empty 200.
pub async fn start_tls_server(versions: &[&'static SupportedProtocolVersion]) -> TlsServer {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let mut ca = NamedTempFile::new().unwrap();
    ca.write_all(cert.pem().as_bytes()).unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let mut tls = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_protocol_versions(versions)
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    tls.alpn_protocols = vec![b"h2".to_vec()];
    let acceptor = TlsAcceptor::from(Arc::new(tls));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(stream) = acceptor.accept(socket).await else {
                    return;
                };
                let service = service_fn(|_req: Request<Incoming>| async {
                    Ok::<_, Infallible>(Response::new(String::new()))
                });
                let _ = http2::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    TlsServer { addr, ca }
}
