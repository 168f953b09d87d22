//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::path::{Path, PathBuf};

/// Error type for TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{kind} file not found: {}", path.display())]
    Missing { kind: &'static str, path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no PEM certificates in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("no PEM private key in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("invalid TLS material: {0}")]
    Invalid(#[source] std::io::Error),
}

/// Load TLS configuration from certificate and key files.
///
/// The files are checked for usable PEM content before being handed to
/// rustls, so a misconfigured path fails with a precise error. ALPN offers
/// `h2` and `http/1.1`.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let cert = read_pem("certificate", cert_path).await?;
    let key = read_pem("private key", key_path).await?;

    let certs = rustls_pemfile::certs(&mut cert.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Invalid)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.to_path_buf()));
    }

    if rustls_pemfile::private_key(&mut key.as_slice())
        .map_err(TlsError::Invalid)?
        .is_none()
    {
        return Err(TlsError::NoPrivateKey(key_path.to_path_buf()));
    }

    tracing::info!(
        cert = %cert_path.display(),
        certificates = certs.len(),
        "TLS material loaded"
    );

    RustlsConfig::from_pem(cert, key).await.map_err(TlsError::Invalid)
}

async fn read_pem(kind: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TlsError::Missing {
            kind,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(TlsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
