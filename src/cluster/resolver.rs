//! Handoff listener address resolution.
//!
//! Mapping a node name to a reachable endpoint is a membership concern that
//! lives outside this crate; the sender only needs the lookup result. The
//! trait models that remote call, and [`StaticResolver`] backs it with a
//! plain table for embedders and tests.

use crate::error::{Error, Result};
use crate::types::NodeName;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;

/// Resolved endpoint of a peer's handoff listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerAddr {
    /// Host taken from the node name.
    pub host: String,

    /// Listener port from the membership lookup.
    pub port: u16,

    /// Optional IP override from the membership lookup; takes precedence
    /// over resolving `host` when present.
    pub ip_override: Option<IpAddr>,
}

impl ListenerAddr {
    /// Create a listener address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ip_override: None,
        }
    }

    /// Set the IP override.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_override = Some(ip);
        self
    }
}

impl std::fmt::Display for ListenerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ip_override {
            Some(ip) => write!(f, "{}:{}", ip, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Lookup of a node's handoff listener endpoint.
///
/// The lookup may fail; failure aborts the transfer before any socket is
/// opened.
#[async_trait]
pub trait ListenerResolver: Send + Sync {
    /// Resolve the handoff listener endpoint for `node`.
    async fn resolve(&self, node: &NodeName) -> Result<ListenerAddr>;
}

/// Resolver backed by a static table of node entries.
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: RwLock<HashMap<NodeName, (u16, Option<IpAddr>)>>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's listener port.
    pub fn add_listener(&self, node: NodeName, port: u16) {
        self.entries.write().insert(node, (port, None));
    }

    /// Register a node's listener port with an IP override.
    pub fn add_listener_with_ip(&self, node: NodeName, port: u16, ip: IpAddr) {
        self.entries.write().insert(node, (port, Some(ip)));
    }

    /// Remove a node.
    pub fn remove_listener(&self, node: &NodeName) {
        self.entries.write().remove(node);
    }
}

#[async_trait]
impl ListenerResolver for StaticResolver {
    async fn resolve(&self, node: &NodeName) -> Result<ListenerAddr> {
        let entries = self.entries.read();
        match entries.get(node) {
            Some(&(port, ip_override)) => Ok(ListenerAddr {
                host: node.host().to_string(),
                port,
                ip_override,
            }),
            None => Err(Error::Resolve {
                node: node.to_string(),
                reason: "no handoff listener registered".to_string(),
            }),
        }
    }
}
