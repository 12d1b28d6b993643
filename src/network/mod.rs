//! Wire protocol and transport for handoff connections.

pub mod tls;
pub mod transport;
pub mod wire;

pub use transport::{TcpTransport, Transport};
pub use wire::Frame;
