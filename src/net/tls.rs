//! TLS client configuration and CA loading.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use thiserror::Error;

use crate::config::schema::{TlsSettings, TlsVersion};

static TLS12_AND_UP: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read CA bundle {path:?}: {source}")]
    CaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CA bundle {0:?} contains no certificates")]
    EmptyCa(PathBuf),

    #[error("TLS configuration rejected: {0}")]
    Config(#[from] rustls::Error),
}

/// Protocol versions allowed for a given minimum.
pub fn protocol_versions(min: TlsVersion) -> &'static [&'static SupportedProtocolVersion] {
    match min {
        TlsVersion::Tls12 => TLS12_AND_UP,
        TlsVersion::Tls13 => TLS13_ONLY,
    }
}

/// Build the client config: webpki roots plus any extra CA bundle, the
/// configured minimum version and ALPN `h2`.
pub fn client_config(settings: &TlsSettings) -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = &settings.ca_cert_path {
        let added = add_pem_roots(&mut roots, path)?;
        tracing::debug!(path = ?path, certificates = added, "Extra CA bundle loaded");
    }

    let mut config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_protocol_versions(protocol_versions(settings.min_version))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec()];

    Ok(Arc::new(config))
}

fn add_pem_roots(roots: &mut RootCertStore, path: &Path) -> Result<usize, TlsError> {
    let ca_read = |source| TlsError::CaRead {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(ca_read)?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ca_read)?;
    if certs.is_empty() {
        return Err(TlsError::EmptyCa(path.to_path_buf()));
    }

    let count = certs.len();
    for cert in certs {
        roots.add(cert)?;
    }
    Ok(count)
}
