//! TLS support for outbound handoff connections.
//!
//! Material is loaded from the PEM files named in [`TlsOptions`]. Loading is
//! attempted once per connection; callers fall back to plain TCP when the
//! material is missing or unreadable.

use crate::config::TlsOptions;
use crate::error::{Error, Result};
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Build a TLS connector from the configured material.
pub fn build_connector(opts: &TlsOptions) -> Result<TlsConnector> {
    let ca_file = opts
        .ca_file
        .as_ref()
        .ok_or_else(|| Error::Config("TLS enabled without a CA bundle".to_string()))?;

    let mut roots = RootCertStore::empty();
    for cert in read_certs(ca_file)? {
        roots
            .add(cert)
            .map_err(|e| Error::Config(format!("CA bundle {}: {}", ca_file.display(), e)))?;
    }

    let certs = read_certs(&opts.cert_file)?;
    let key = read_key(&opts.key_file)?;

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| Error::Config(format!("TLS client config: {}", e)))?;

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Parse the listener host into a TLS server name.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|e| Error::Config(format!("invalid TLS server name {}: {}", host, e)))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("cert {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<_>>()
        .map_err(|e| Error::Config(format!("cert {}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(Error::Config(format!(
            "cert {}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file =
        File::open(path).map_err(|e| Error::Config(format!("key {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Config(format!("key {}: {}", path.display(), e)))?
        .ok_or_else(|| Error::Config(format!("key {}: no private key found", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_requires_ca() {
        let opts = TlsOptions::new("/tmp/cert.pem", "/tmp/key.pem");
        let err = build_connector(&opts).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_cert_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, b"").unwrap();

        let opts = TlsOptions::new(dir.path().join("missing.pem"), dir.path().join("k.pem"))
            .with_ca_file(&ca);
        assert!(build_connector(&opts).is_err());
    }

    #[test]
    fn test_server_name_accepts_ip_and_dns() {
        assert!(server_name("10.0.0.1").is_ok());
        assert!(server_name("handoff.internal").is_ok());
    }
}
