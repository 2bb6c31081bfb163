//! TLS configuration and per-connection handshakes.

use std::io;
use std::path::Path;

use axum_server::accept::{Accept, DefaultAcceptor};
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::net::TcpStream;

use crate::config::schema::TlsConfig;
use crate::net::takeover::RawIo;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, io::Error> {
    if !cert_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Turns accepted TCP streams into the byte stream HTTP is served over.
#[derive(Clone)]
pub enum Acceptor {
    Plain,
    Tls(RustlsAcceptor<DefaultAcceptor>),
}

impl Acceptor {
    /// Build the acceptor for the listener. Missing or invalid TLS material
    /// is a startup error.
    pub async fn from_config(tls: Option<&TlsConfig>) -> Result<Self, io::Error> {
        match tls {
            None => Ok(Acceptor::Plain),
            Some(tls) => {
                let config =
                    load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                tracing::info!(cert = %tls.cert_path, "TLS enabled");
                Ok(Acceptor::Tls(RustlsAcceptor::new(config)))
            }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Acceptor::Tls(_))
    }

    /// Complete the handshake (if any) for one connection.
    pub async fn accept(&self, stream: TcpStream) -> Result<Box<dyn RawIo + Unpin>, io::Error> {
        match self {
            Acceptor::Plain => Ok(Box::new(stream)),
            Acceptor::Tls(acceptor) => {
                let (tls_stream, ()) = acceptor.accept(stream, ()).await?;
                Ok(Box::new(tls_stream))
            }
        }
    }
}
