//! Outbound transport for handoff connections.
//!
//! One transfer owns one connection. The protocol alternates strictly
//! between writes and request/reply exchanges, so the transport exposes a
//! sequential send/recv pair; there is never a concurrent reader and writer
//! on the same connection.

use crate::cluster::ListenerAddr;
use crate::config::HandoffConfig;
use crate::error::{Error, NetworkError, Result};
use crate::network::wire::Frame;
use crate::network::{tls, wire};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A connection that can carry framed handoff messages.
///
/// Every operation is bounded: an elapsed bound surfaces as
/// [`Error::Timeout`], a clean close as [`NetworkError::ConnectionClosed`].
#[async_trait]
pub trait Transport: Send {
    /// Send one framed message.
    async fn send_frame(&mut self, tag: u8, payload: &[u8]) -> Result<()>;

    /// Receive one framed message.
    async fn recv_frame(&mut self) -> Result<Frame>;
}

enum Stream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// TCP (optionally TLS) transport to a peer's handoff listener.
pub struct TcpTransport {
    stream: Stream,
    peer: SocketAddr,
    io_timeout: Duration,
}

impl TcpTransport {
    /// Connect to a resolved handoff listener.
    ///
    /// TLS is used when the configuration carries material that validates;
    /// missing or unreadable material downgrades to plain TCP with a logged
    /// cause rather than failing the transfer.
    pub async fn connect(addr: &ListenerAddr, config: &HandoffConfig) -> Result<Self> {
        let target = Self::lookup(addr).await?;

        let tcp = timeout(config.connect_timeout, TcpStream::connect(target))
            .await
            .map_err(|_| NetworkError::ConnectFailed {
                addr: target.to_string(),
                reason: "connect timed out".to_string(),
            })?
            .map_err(|e| NetworkError::ConnectFailed {
                addr: target.to_string(),
                reason: e.to_string(),
            })?;

        let stream = match Self::tls_connector(config) {
            Some(connector) => {
                let name = tls::server_name(&addr.host)?;
                let tls_stream = timeout(config.connect_timeout, connector.connect(name, tcp))
                    .await
                    .map_err(|_| NetworkError::ConnectFailed {
                        addr: target.to_string(),
                        reason: "TLS handshake timed out".to_string(),
                    })?
                    .map_err(|e| NetworkError::ConnectFailed {
                        addr: target.to_string(),
                        reason: format!("TLS handshake: {}", e),
                    })?;
                debug!(peer = %target, "Handoff connection established (TLS)");
                Stream::Tls(Box::new(tls_stream))
            }
            None => {
                debug!(peer = %target, "Handoff connection established");
                Stream::Plain(tcp)
            }
        };

        Ok(Self {
            stream,
            peer: target,
            io_timeout: config.recv_timeout,
        })
    }

    /// Address of the connected peer.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn lookup(addr: &ListenerAddr) -> Result<SocketAddr> {
        if let Some(ip) = addr.ip_override {
            return Ok(SocketAddr::new(ip, addr.port));
        }

        let mut candidates = tokio::net::lookup_host((addr.host.as_str(), addr.port))
            .await
            .map_err(|e| NetworkError::InvalidAddress(format!("{}: {}", addr.host, e)))?;
        candidates
            .next()
            .ok_or_else(|| NetworkError::InvalidAddress(addr.host.clone()).into())
    }

    fn tls_connector(config: &HandoffConfig) -> Option<tokio_rustls::TlsConnector> {
        let opts = config.tls.as_ref()?;

        if let Err((path, reason)) = opts.validate() {
            warn!(path = %path.display(), reason, "TLS material unusable, falling back to TCP");
            return None;
        }
        match tls::build_connector(opts) {
            Ok(connector) => Some(connector),
            Err(e) => {
                warn!(error = %e, "TLS material rejected, falling back to TCP");
                None
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_frame(&mut self, tag: u8, payload: &[u8]) -> Result<()> {
        let bound = self.io_timeout;
        let result = match &mut self.stream {
            Stream::Plain(s) => timeout(bound, wire::write_frame(s, tag, payload)).await,
            Stream::Tls(s) => timeout(bound, wire::write_frame(s.as_mut(), tag, payload)).await,
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NetworkError::SendFailed(e.to_string()).into()),
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn recv_frame(&mut self) -> Result<Frame> {
        let bound = self.io_timeout;
        match &mut self.stream {
            Stream::Plain(s) => recv_bounded(s, bound).await,
            Stream::Tls(s) => recv_bounded(s.as_mut(), bound).await,
        }
    }
}

async fn recv_bounded<R>(reader: &mut R, bound: Duration) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    match timeout(bound, wire::read_frame(reader, wire::MAX_REPLY_LEN)).await {
        Ok(Ok(Some(frame))) => Ok(frame),
        Ok(Ok(None)) => Err(NetworkError::ConnectionClosed.into()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::Timeout),
    }
}
