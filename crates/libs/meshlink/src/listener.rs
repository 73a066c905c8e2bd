//! TCP accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::ListenerError;
use crate::pool::ServicePool;
use crate::session::{self, SessionContext};

/// Accepts incoming peer connections and spawns a session for each one,
/// distributing sessions across the pool's worker loops.
pub struct Listener {
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

impl Listener {
    /// Bind `interface:port` and start accepting.
    ///
    /// Accept failures are logged and the loop keeps accepting; only
    /// [`shutdown`](Self::shutdown) (or pool shutdown) stops it. Sessions
    /// whose handshake completes after shutdown are discarded without
    /// touching the registry.
    pub async fn bind(
        interface: &str,
        port: u16,
        pool: Arc<ServicePool>,
        ctx: SessionContext,
    ) -> Result<Self, ListenerError> {
        let addr = format!("{interface}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        log::info!("listener: listening on <{local_addr}>");

        // Sessions inherit this token, so both listener shutdown and pool
        // shutdown reach them.
        let cancel = ctx.cancel.child_token();
        let ctx = SessionContext {
            cancel: cancel.clone(),
            ..ctx
        };

        let accept_pool = pool.clone();
        let accept_cancel = cancel.clone();
        pool.handle().spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            log::info!("listener: accepted connection from <{peer}>");
                            accept_pool.handle().spawn(session::run(stream, ctx.clone()));
                        }
                        Err(err) => {
                            // Non-fatal: keep accepting.
                            log::warn!("listener: accept failed: {err}");
                        }
                    },
                }
            }
            log::info!("listener: stopped on <{local_addr}>");
        });

        Ok(Self { local_addr, cancel })
    }

    /// Address actually bound, useful when the port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancel the pending accept and stop every session spawned by this
    /// listener, deregistering their links. Idempotent. Outbound sessions
    /// dialled with a different token are unaffected.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
