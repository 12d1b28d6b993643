//! Configuration types for the handoff engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names understood by [`HandoffConfig::from_env`].
const ENV_RECV_TIMEOUT: &str = "HANDOFF_RECV_TIMEOUT_SECS";
const ENV_CONNECT_TIMEOUT: &str = "HANDOFF_CONNECT_TIMEOUT_SECS";
const ENV_STATUS_INTERVAL: &str = "HANDOFF_STATUS_INTERVAL_SECS";
const ENV_ACK_THRESHOLD: &str = "HANDOFF_ACK_THRESHOLD";
const ENV_SSL_CERT: &str = "HANDOFF_SSL_CERT";
const ENV_SSL_KEY: &str = "HANDOFF_SSL_KEY";
const ENV_SSL_CACERT: &str = "HANDOFF_SSL_CACERT";

/// Configuration for a handoff sender.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// Bound on establishing the outbound connection.
    pub connect_timeout: Duration,

    /// Bound on every framed receive (handshake reply, keep-alive ack,
    /// final-sync ack). Also bounds individual frame writes.
    pub recv_timeout: Duration,

    /// Minimum interval between progress snapshots pushed to the status sink.
    pub status_interval: Duration,

    /// Number of items sent between keep-alive round trips. This window is
    /// the engine's sole flow-control mechanism.
    pub ack_threshold: usize,

    /// Optional TLS material. When present and valid, the transfer runs over
    /// TLS; invalid material falls back to plain TCP with a logged cause.
    pub tls: Option<TlsOptions>,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            recv_timeout: Duration::from_secs(60),
            status_interval: Duration::from_secs(2),
            ack_threshold: 1000,
            tls: None,
        }
    }
}

impl HandoffConfig {
    /// Create a configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment, falling back to defaults for
    /// unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_env_u64(ENV_RECV_TIMEOUT) {
            config.recv_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env_u64(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env_u64(ENV_STATUS_INTERVAL) {
            config.status_interval = Duration::from_secs(secs);
        }
        if let Some(n) = read_env_u64(ENV_ACK_THRESHOLD) {
            config.ack_threshold = n as usize;
        }

        let cert = std::env::var(ENV_SSL_CERT).ok();
        let key = std::env::var(ENV_SSL_KEY).ok();
        if let (Some(cert), Some(key)) = (cert, key) {
            let mut tls = TlsOptions::new(cert, key);
            if let Ok(ca) = std::env::var(ENV_SSL_CACERT) {
                tls = tls.with_ca_file(ca);
            }
            config.tls = Some(tls);
        }

        config
    }

    /// Set the receive timeout.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the status report interval.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the ack window threshold.
    pub fn with_ack_threshold(mut self, threshold: usize) -> Self {
        self.ack_threshold = threshold;
        self
    }

    /// Set TLS options.
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}

fn read_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// TLS material for an outbound handoff connection.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Client certificate chain (PEM).
    pub cert_file: PathBuf,

    /// Client private key (PEM).
    pub key_file: PathBuf,

    /// CA bundle used to verify the receiver (PEM). Required to actually
    /// enable TLS; cluster-internal deployments pin the cluster CA here.
    pub ca_file: Option<PathBuf>,
}

impl TlsOptions {
    /// Create TLS options from certificate and key paths.
    pub fn new(cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            ca_file: None,
        }
    }

    /// Set the CA bundle path.
    pub fn with_ca_file(mut self, ca_file: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }

    /// Check that every configured file exists and is readable.
    ///
    /// Returns the first offending path. Callers downgrade to plain TCP on
    /// failure instead of aborting the transfer.
    pub fn validate(&self) -> std::result::Result<(), (PathBuf, String)> {
        check_readable(&self.cert_file)?;
        check_readable(&self.key_file)?;
        match &self.ca_file {
            Some(ca) => check_readable(ca),
            None => Err((
                self.cert_file.clone(),
                "no CA bundle configured for peer verification".to_string(),
            )),
        }
    }
}

fn check_readable(path: &Path) -> std::result::Result<(), (PathBuf, String)> {
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) => Err((path.to_path_buf(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HandoffConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.recv_timeout, Duration::from_secs(60));
        assert_eq!(config.status_interval, Duration::from_secs(2));
        assert_eq!(config.ack_threshold, 1000);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = HandoffConfig::new()
            .with_recv_timeout(Duration::from_secs(5))
            .with_ack_threshold(10);

        assert_eq!(config.recv_timeout, Duration::from_secs(5));
        assert_eq!(config.ack_threshold, 10);
    }

    #[test]
    fn test_tls_validate_missing_file() {
        let tls = TlsOptions::new("/nonexistent/cert.pem", "/nonexistent/key.pem")
            .with_ca_file("/nonexistent/ca.pem");
        let (path, _reason) = tls.validate().unwrap_err();
        assert_eq!(path, PathBuf::from("/nonexistent/cert.pem"));
    }

    #[test]
    fn test_tls_validate_requires_ca() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        for p in [&cert, &key] {
            let mut f = std::fs::File::create(p).unwrap();
            f.write_all(b"---").unwrap();
        }

        let tls = TlsOptions::new(&cert, &key);
        assert!(tls.validate().is_err());

        let ca = dir.path().join("ca.pem");
        std::fs::File::create(&ca).unwrap();
        let tls = TlsOptions::new(&cert, &key).with_ca_file(&ca);
        assert!(tls.validate().is_ok());
    }
}
