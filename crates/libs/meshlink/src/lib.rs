//! # meshlink
//!
//! Peer-link transport and liveness core for the meshlink service mesh.
//!
//! Nodes hold bidirectional TCP links to one another and exchange
//! [`meshlink_wire`] envelopes over them. This crate provides:
//!
//! - [`ServicePool`] — a pool of worker event loops that I/O and timers are
//!   distributed across,
//! - [`Link`] / [`LinkRegistry`] — peer identity and the authoritative set
//!   of live links,
//! - [`Listener`] — TCP accept + session handshake,
//! - [`Service`] — envelope send/receive and dispatch to registered
//!   [`Handler`]s,
//! - [`HeartbeatService`] — the ping/pong liveness protocol.
//!
//! Failure isolation is the organizing rule: one peer's timeout, disconnect
//! or malformed message never affects another peer's link, and one
//! handler's failure never affects another handler.

pub mod error;
pub mod heartbeat;
pub mod link;
pub mod listener;
pub mod pool;
pub mod registry;
pub mod service;
pub mod session;
pub mod time;

pub use error::{ListenerError, PoolError, RegistryError, ServiceError};
pub use heartbeat::{HeartbeatConfig, HeartbeatService};
pub use link::{Link, LinkId, NodeIdentity};
pub use listener::Listener;
pub use pool::ServicePool;
pub use registry::LinkRegistry;
pub use service::{Handler, Service};
