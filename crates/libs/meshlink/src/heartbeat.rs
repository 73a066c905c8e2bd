//! Ping/pong liveness protocol.
//!
//! One recurring timer per monitor. Every period it sends a Ping carrying a
//! monotonic timestamp to every peer it has been told is alive; a received
//! Ping is answered immediately with a Pong echoing the timestamp verbatim;
//! a received Pong yields the round-trip latency, which is logged as a
//! warning when it crosses the configured threshold. The heartbeat only
//! observes and reports; it never tears a link down itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use meshlink_wire::{Payload, PayloadKind};

use crate::link::{Link, LinkId};
use crate::service::{Handler, Service};
use crate::time::monotonic_millis;

const HANDLED_KINDS: &[PayloadKind] = &[PayloadKind::Ping, PayloadKind::Pong];

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between ping broadcast cycles.
    pub period: Duration,
    /// Round-trip latency above which a warning is logged.
    pub latency_warn: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(15),
            latency_warn: Duration::from_millis(250),
        }
    }
}

/// Registered handler implementing the heartbeat protocol.
///
/// Holds its own peer table, kept consistent with the registry through
/// link-up/link-down notifications, and one recurring timer task.
pub struct HeartbeatService {
    service: Weak<Service>,
    config: HeartbeatConfig,
    peers: Mutex<HashMap<LinkId, Link>>,
    cancel: CancellationToken,
}

impl HeartbeatService {
    pub fn new(service: &Arc<Service>, config: HeartbeatConfig) -> Arc<Self> {
        Arc::new(Self {
            service: Arc::downgrade(service),
            config,
            peers: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Arm the recurring ping timer on `handle`.
    pub fn spawn(self: &Arc<Self>, handle: &Handle) {
        let monitor = self.clone();
        handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = monitor.cancel.cancelled() => break,
                    _ = tokio::time::sleep(monitor.config.period) => {
                        if !monitor.trigger_pings() {
                            break;
                        }
                    }
                }
            }
            log::debug!("heartbeat: timer stopped");
        });
    }

    /// One timer firing: ping every known peer.
    ///
    /// Returns whether the timer should re-arm; a firing that observes the
    /// cancellation does nothing and reports `false`. One timestamp is
    /// generated for the whole cycle, which slightly understates latency
    /// for peers pinged later in the cycle but costs a single clock read.
    pub fn trigger_pings(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(service) = self.service.upgrade() else {
            return false;
        };

        let timestamp = monotonic_millis();
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        for link in peers.values() {
            service.send(link, Payload::Ping { timestamp });
        }
        true
    }

    /// Cancel the recurring timer. Idempotent; a firing already queued
    /// observes the cancellation and does nothing.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Number of peers currently known to the monitor.
    pub fn peer_count(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn handle_ping(&self, link: &Link, timestamp: u64) {
        if let Some(service) = self.service.upgrade() {
            // Echo the timestamp verbatim so the sender can compute the
            // exact round trip.
            service.send(link, Payload::Pong { timestamp });
        }
    }

    fn handle_pong(&self, link: &Link, timestamp: u64) {
        if let Some(latency) = self.excessive_latency(timestamp, monotonic_millis()) {
            log::warn!("heartbeat: detected high latency to {link}: {latency}ms");
        }
    }

    /// Round-trip latency, if it crossed the warning threshold. A `sent`
    /// of zero means "no timestamp available" and is skipped.
    fn excessive_latency(&self, sent: u64, now: u64) -> Option<u64> {
        if sent == 0 {
            return None;
        }
        let latency = now.saturating_sub(sent);
        let threshold = self.config.latency_warn.as_millis() as u64;
        (latency > threshold).then_some(latency)
    }
}

impl Handler for HeartbeatService {
    fn payload_kinds(&self) -> &[PayloadKind] {
        HANDLED_KINDS
    }

    fn on_message(&self, link: &Link, payload: &Payload) {
        match payload {
            Payload::Ping { timestamp } => self.handle_ping(link, *timestamp),
            Payload::Pong { timestamp } => self.handle_pong(link, *timestamp),
            other => {
                log::warn!(
                    "heartbeat: unhandled {} message from {link}",
                    other.kind()
                );
            }
        }
    }

    fn on_link_up(&self, link: &Link) {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.insert(link.id, link.clone());
    }

    fn on_link_down(&self, link: &Link) {
        // Matched by id; descriptions are not unique.
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.remove(&link.id);
    }
}
