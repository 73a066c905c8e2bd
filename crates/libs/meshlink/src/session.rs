//! Per-connection session: framing, handshake, and the reader/writer tasks
//! that carry a [`Link`] for its lifetime.
//!
//! Frames are a `u16` big-endian length prefix followed by one envelope.
//! Immediately after TCP establishment each side sends a Hello envelope
//! carrying its node identity; the peer's Hello (bounded by a timeout)
//! produces the [`Link`]. From then on the writer task drains the link's
//! transmit queue (serializing concurrent senders onto the socket) and
//! the reader feeds every inbound frame to [`Service::on_receive`].

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use meshlink_wire::{Envelope, Payload, ServiceKind};

use crate::link::{Link, LinkId, NodeIdentity};
use crate::service::Service;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a session needs from its surroundings.
#[derive(Clone)]
pub struct SessionContext {
    /// Local identity sent in our half of the handshake.
    pub identity: NodeIdentity,
    pub service: Arc<Service>,
    /// Cancelled when the listener (or the whole process) shuts down.
    pub cancel: CancellationToken,
}

/// Read one length-prefixed frame.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zero-length frame"));
    }
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).await?;
    Ok(frame)
}

/// Write one length-prefixed frame.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    stream: &mut W,
    bytes: &[u8],
) -> io::Result<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame too large"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Send our Hello, then wait (bounded) for the peer's.
async fn exchange_hello(
    stream: &mut TcpStream,
    identity: &NodeIdentity,
) -> io::Result<(LinkId, String)> {
    let hello = Envelope::new(
        ServiceKind::Core,
        Payload::Hello {
            id: *identity.id.as_bytes(),
            description: identity.description.clone(),
        },
    );
    let bytes = hello
        .encode()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    write_frame(stream, &bytes).await?;

    let frame = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_frame(stream))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "handshake timed out"))??;
    let envelope = Envelope::decode(&frame)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    match envelope.payload {
        Payload::Hello { id, description } => Ok((LinkId(id), description)),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("expected Hello, got {}", other.kind()),
        )),
    }
}

/// Dial a peer and drive the resulting session to completion.
pub async fn connect(addr: &str, ctx: SessionContext) -> io::Result<()> {
    let stream = TcpStream::connect(addr).await?;
    log::info!("session: connected to <{addr}>");
    run(stream, ctx).await;
    Ok(())
}

/// Drive one established TCP connection: handshake, register the link,
/// pump frames both ways, and tear down exactly once on closure.
pub async fn run(stream: TcpStream, ctx: SessionContext) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".into());

    let mut stream = stream;
    let (peer_id, description) = match exchange_hello(&mut stream, &ctx.identity).await {
        Ok(negotiated) => negotiated,
        Err(err) => {
            log::warn!("session: handshake with <{peer}> failed: {err}");
            return;
        }
    };

    // A handshake that completes after shutdown must leave no trace.
    if ctx.cancel.is_cancelled() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let link = Link::new(peer_id, description, tx);

    if let Err(err) = ctx.service.registry().add(link.clone()) {
        log::warn!("session: rejecting <{peer}>: {err}");
        return;
    }
    ctx.service.notify_link_up(&link);
    log::info!("session: link {link} up via <{peer}>");

    let (mut read_half, mut write_half) = stream.into_split();
    let closed = CancellationToken::new();

    let writer = {
        let cancel = ctx.cancel.clone();
        let closed = closed.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = closed.cancelled() => break,
                    queued = rx.recv() => match queued {
                        Some(bytes) => {
                            if let Err(err) = write_frame(&mut write_half, &bytes).await {
                                log::debug!("session: write failed: {err}");
                                closed.cancel();
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        })
    };

    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = closed.cancelled() => break,
            result = read_frame(&mut read_half) => match result {
                Ok(frame) => ctx.service.on_receive(&link, &frame),
                Err(err) => {
                    log::debug!("session: read from {link} ended: {err}");
                    break;
                }
            },
        }
    }

    closed.cancel();
    let _ = writer.await;

    ctx.service.notify_link_down(&link);
    log::info!("session: link {link} down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(256);
        write_frame(&mut a, &[1, 2, 3]).await.expect("write");
        let frame = read_frame(&mut b).await.expect("read");
        assert_eq!(frame, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn frames_preserve_boundaries() {
        let (mut a, mut b) = tokio::io::duplex(256);
        write_frame(&mut a, &[1, 2]).await.expect("write");
        write_frame(&mut a, &[3]).await.expect("write");
        assert_eq!(read_frame(&mut b).await.expect("read"), vec![1, 2]);
        assert_eq!(read_frame(&mut b).await.expect("read"), vec![3]);
    }

    #[tokio::test]
    async fn zero_length_frame_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(256);
        a.write_all(&[0, 0]).await.expect("write");
        let err = read_frame(&mut b).await.expect_err("must reject");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected_on_write() {
        let (mut a, _b) = tokio::io::duplex(256);
        let huge = vec![0u8; u16::MAX as usize + 1];
        let err = write_frame(&mut a, &huge).await.expect_err("must reject");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn truncated_frame_reports_eof() {
        let (mut a, mut b) = tokio::io::duplex(256);
        a.write_all(&[0, 5, 1, 2]).await.expect("write");
        drop(a);
        assert!(read_frame(&mut b).await.is_err());
    }
}
