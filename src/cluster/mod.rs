//! Cluster-facing collaborators: listener address resolution and the
//! lifecycle events a sender reports to its coordinator.

mod events;
mod resolver;

pub use events::{
    FailureKind, HandoffEvent, HandoffEventListener, LoggingEventListener, NoopEventListener,
};
pub use resolver::{ListenerAddr, ListenerResolver, StaticResolver};
