use crate::link::LinkId;
use meshlink_wire::PayloadKind;

/// Errors from [`crate::LinkRegistry`] mutations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A link with the same identifier is already registered.
    #[error("duplicate link id {0}")]
    DuplicateLink(LinkId),
}

/// Startup-time configuration errors from [`crate::Service`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Two handlers claimed the same payload kind.
    #[error("payload kind {0} already claimed by another handler")]
    HandlerConflict(PayloadKind),
}

/// Errors from [`crate::Listener`] startup.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("couldn't bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Errors from [`crate::ServicePool`] construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool size must be non-zero")]
    ZeroSize,

    #[error("couldn't start worker runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
