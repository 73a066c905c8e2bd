//! Message routing hub.
//!
//! [`Service`] owns the handler table and the send/receive paths: it
//! encodes envelopes going out to a [`Link`], decodes raw frames coming in
//! from a session, dispatches decoded payloads to the handler registered
//! for that payload kind, and fans link lifecycle notifications out to
//! every handler.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use meshlink_wire::{Envelope, Payload, PayloadKind, ServiceKind};

use crate::error::ServiceError;
use crate::link::Link;
use crate::registry::LinkRegistry;

/// A component registered to process one or more payload kinds and to
/// observe link lifecycle events.
///
/// Callbacks run on whichever worker loop carries the peer's session, so
/// implementations must be `Send + Sync` and must not block.
pub trait Handler: Send + Sync {
    /// Payload kinds this handler claims. Fixed for the handler's lifetime.
    fn payload_kinds(&self) -> &[PayloadKind];

    /// A decoded message of one of the claimed kinds arrived from `link`.
    fn on_message(&self, link: &Link, payload: &Payload);

    /// A new peer link finished its handshake and was registered.
    fn on_link_up(&self, link: &Link);

    /// A peer link was torn down.
    fn on_link_down(&self, link: &Link);
}

#[derive(Default)]
struct HandlerTable {
    by_kind: HashMap<PayloadKind, Arc<dyn Handler>>,
    // Registration order, for lifecycle fan-out.
    ordered: Vec<Arc<dyn Handler>>,
}

/// The message router: envelope construction, transmission, inbound decode
/// and dispatch, and link lifecycle fan-out.
pub struct Service {
    identity: ServiceKind,
    registry: Arc<LinkRegistry>,
    handlers: RwLock<HandlerTable>,
}

impl Service {
    pub fn new(identity: ServiceKind, registry: Arc<LinkRegistry>) -> Self {
        Self {
            identity,
            registry,
            handlers: RwLock::new(HandlerTable::default()),
        }
    }

    pub fn registry(&self) -> &Arc<LinkRegistry> {
        &self.registry
    }

    /// Register `handler` for every payload kind it declares.
    ///
    /// At most one handler per kind; a second claim is a startup
    /// configuration error. Registration must complete before any message
    /// traffic starts; dispatch takes only a read lock.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> Result<(), ServiceError> {
        let mut table = self.handlers.write().unwrap_or_else(|e| e.into_inner());

        for kind in handler.payload_kinds() {
            if table.by_kind.contains_key(kind) {
                return Err(ServiceError::HandlerConflict(*kind));
            }
        }
        for kind in handler.payload_kinds() {
            table.by_kind.insert(*kind, handler.clone());
        }
        table.ordered.push(handler);
        Ok(())
    }

    /// Encode `payload` into an envelope stamped with this service's
    /// identity and submit it on `link`. Fire-and-forget.
    pub fn send(&self, link: &Link, payload: Payload) {
        let envelope = Envelope::new(self.identity, payload);
        match envelope.encode() {
            Ok(bytes) => link.send_raw(bytes),
            Err(err) => log::warn!("service: dropping unencodable message to {link}: {err}"),
        }
    }

    /// Decode one inbound frame from `link` and dispatch it.
    ///
    /// A malformed frame or an unclaimed payload kind is logged and
    /// discarded; the link stays up either way.
    pub fn on_receive(&self, link: &Link, raw: &[u8]) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!("service: malformed message from {link}: {err}");
                return;
            }
        };

        let kind = envelope.payload.kind();
        let handler = {
            let table = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            table.by_kind.get(&kind).cloned()
        };

        match handler {
            Some(handler) => {
                // A panicking handler loses this message, nothing more; the
                // session keeps reading and the link stays registered.
                if catch_unwind(AssertUnwindSafe(|| handler.on_message(link, &envelope.payload)))
                    .is_err()
                {
                    log::warn!("service: handler panicked on {kind} message from {link}, dropped");
                }
            }
            None => {
                log::warn!("service: no handler for {kind} message from {link}, dropping");
            }
        }
    }

    /// Fan a link-up notification out to every handler in registration
    /// order. A panicking handler is logged and skipped; the rest still run.
    pub fn notify_link_up(&self, link: &Link) {
        log::debug!("service: link up {link}");
        for handler in self.handlers_in_order() {
            if catch_unwind(AssertUnwindSafe(|| handler.on_link_up(link))).is_err() {
                log::warn!("service: handler panicked in link-up for {link}, skipped");
            }
        }
    }

    /// Fan a link-down notification out to every handler, then drop the
    /// link from the registry.
    pub fn notify_link_down(&self, link: &Link) {
        log::debug!("service: link down {link}");
        for handler in self.handlers_in_order() {
            if catch_unwind(AssertUnwindSafe(|| handler.on_link_down(link))).is_err() {
                log::warn!("service: handler panicked in link-down for {link}, skipped");
            }
        }
        self.registry.remove(&link.id);
    }

    fn handlers_in_order(&self) -> Vec<Arc<dyn Handler>> {
        let table = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        table.ordered.clone()
    }
}
