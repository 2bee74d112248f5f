//! Coordinator-side endpoint.
//!
//! ```text
//! stream 0 ─► reader task ─┐                      ┌─► writer task ─► stream 0
//! stream 1 ─► reader task ─┼─► mpsc<Inbound> ─► recv/send
//! stream N ─► reader task ─┘                      └─► writer task ─► stream N
//! ```
//!
//! Reader tasks only decode; the one consumer of the inbox sees every
//! message in arrival order, so the coordinator can stay single-threaded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{PeerId, Stream};
use crate::error::{LifeError, Result};
use crate::protocol::{Envelope, FrameBuffer};
use crate::writer::{spawn_writer_task_default, WriterHandle};

/// Inbox capacity.
const INBOX_CAPACITY: usize = 4096;

/// Read chunk size for reader tasks.
const READ_CHUNK: usize = 8 * 1024;

enum Inbound {
    Connected {
        peer: PeerId,
        writer: WriterHandle,
        writer_task: JoinHandle<Result<()>>,
    },
    Message {
        peer: PeerId,
        envelope: Envelope,
    },
    Disconnected {
        peer: PeerId,
    },
}

/// What a [`ServerEndpoint`] saw on one of its connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    Message { peer: PeerId, envelope: Envelope },
    /// The peer's stream hit EOF or failed; nothing more will arrive from it.
    Disconnected { peer: PeerId },
}

/// Attaches streams to a [`ServerEndpoint`]. Cloneable; the endpoint's inbox
/// closes once every acceptor and every reader task is gone.
#[derive(Clone)]
pub struct Acceptor {
    tx: mpsc::Sender<Inbound>,
    next_peer: Arc<AtomicU64>,
}

impl Acceptor {
    /// Attach a connected stream and return its peer id.
    pub async fn attach<S: Stream>(&self, stream: S) -> Result<PeerId> {
        let peer = PeerId(self.next_peer.fetch_add(1, Ordering::Relaxed));
        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task_default(write_half);

        self.tx
            .send(Inbound::Connected {
                peer,
                writer,
                writer_task,
            })
            .await
            .map_err(|_| LifeError::ConnectionClosed)?;

        tokio::spawn(read_loop(peer, read_half, self.tx.clone()));
        tracing::debug!(%peer, "connection attached");
        Ok(peer)
    }
}

async fn read_loop<R>(peer: PeerId, mut reader: R, tx: mpsc::Sender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = FrameBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "read failed");
                break;
            }
        };

        let frames = match buffer.push(&chunk[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // No way to find the next header after a bad one.
                tracing::warn!(%peer, error = %e, "dropping connection after framing error");
                break;
            }
        };

        for frame in frames {
            match Envelope::decode(&frame) {
                Ok(envelope) => {
                    if tx.send(Inbound::Message { peer, envelope }).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        %peer,
                        sequence = frame.sequence(),
                        error = %e,
                        "ignoring undecodable message"
                    );
                }
            }
        }
    }

    let _ = tx.send(Inbound::Disconnected { peer }).await;
}

/// Coordinator-side endpoint: receive from any peer, reply to a specific one.
pub struct ServerEndpoint {
    inbox: mpsc::Receiver<Inbound>,
    writers: HashMap<PeerId, WriterHandle>,
    writer_tasks: Vec<JoinHandle<Result<()>>>,
    accept_task: Option<JoinHandle<()>>,
}

impl ServerEndpoint {
    /// Create an endpoint with no connections.
    pub fn new() -> (Self, Acceptor) {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let endpoint = Self {
            inbox,
            writers: HashMap::new(),
            writer_tasks: Vec::new(),
            accept_task: None,
        };
        let acceptor = Acceptor {
            tx,
            next_peer: Arc::new(AtomicU64::new(0)),
        };
        (endpoint, acceptor)
    }

    /// Tie a listener's accept loop to this endpoint's lifetime.
    pub(crate) fn set_accept_task(&mut self, task: JoinHandle<()>) {
        self.accept_task = Some(task);
    }

    /// Wait for the next message or disconnect from any peer.
    ///
    /// Returns `None` once no connection can deliver anything anymore. With a
    /// live listener that never happens, so callers that must notice workers
    /// leaving watch for [`EndpointEvent::Disconnected`].
    pub async fn next_event(&mut self) -> Option<EndpointEvent> {
        loop {
            match self.inbox.recv().await? {
                Inbound::Connected {
                    peer,
                    writer,
                    writer_task,
                } => {
                    self.writers.insert(peer, writer);
                    self.writer_tasks.push(writer_task);
                }
                Inbound::Message { peer, envelope } => {
                    return Some(EndpointEvent::Message { peer, envelope })
                }
                Inbound::Disconnected { peer } => {
                    tracing::debug!(%peer, "connection closed");
                    self.writers.remove(&peer);
                    return Some(EndpointEvent::Disconnected { peer });
                }
            }
        }
    }

    /// Wait for the next message from any peer, skipping disconnects.
    pub async fn recv(&mut self) -> Option<(PeerId, Envelope)> {
        loop {
            if let EndpointEvent::Message { peer, envelope } = self.next_event().await? {
                return Some((peer, envelope));
            }
        }
    }

    /// Queue an envelope for one peer.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the peer is gone.
    pub async fn send(&self, peer: PeerId, envelope: &Envelope) -> Result<()> {
        match self.writers.get(&peer) {
            Some(writer) => writer.send_envelope(envelope).await,
            None => Err(LifeError::ConnectionClosed),
        }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.writers.len()
    }

    /// Stop accepting, flush every writer, and wait for the writer tasks.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
        self.writers.clear();
        for task in self.writer_tasks.drain(..) {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "writer ended with error"),
                Err(e) => tracing::debug!(error = %e, "writer task panicked"),
            }
        }
    }
}

impl Drop for ServerEndpoint {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CellRef, Message};
    use crate::transport::Connection;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn test_recv_and_reply() {
        let (mut endpoint, acceptor) = ServerEndpoint::new();
        let (client_side, server_side) = duplex(4096);
        let peer = acceptor.attach(server_side).await.unwrap();
        let mut connection = Connection::new(client_side);

        let request = Envelope::new(5, Message::CellGetRequest(CellRef { x: 1, y: 1 }));
        connection.send(&request).await.unwrap();

        let (from, received) = endpoint.recv().await.unwrap();
        assert_eq!(from, peer);
        assert_eq!(received, request);
        assert_eq!(endpoint.connection_count(), 1);

        let reply = Envelope::new(5, Message::RegisterRequest);
        endpoint.send(peer, &reply).await.unwrap();
        assert_eq!(connection.recv().await.unwrap(), reply);
    }

    #[tokio::test]
    async fn test_peers_get_distinct_ids() {
        let (_endpoint, acceptor) = ServerEndpoint::new();
        let (_a, a) = duplex(64);
        let (_b, b) = duplex(64);
        let first = acceptor.attach(a).await.unwrap();
        let second = acceptor.attach(b).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_undecodable_message_skipped() {
        let (mut endpoint, acceptor) = ServerEndpoint::new();
        let (mut client_side, server_side) = duplex(4096);
        acceptor.attach(server_side).await.unwrap();

        // Valid header for a CellGet request, garbage payload.
        let bad = crate::protocol::build_frame(
            &crate::protocol::Header::new(
                crate::protocol::MessageKind::CellGet,
                crate::protocol::MessageMode::Request,
                1,
                1,
            ),
            &[0xC1],
        );
        client_side.write_all(&bad).await.unwrap();
        let good = Envelope::new(2, Message::RegisterRequest);
        client_side.write_all(&good.encode().unwrap()).await.unwrap();

        let (_, received) = endpoint.recv().await.unwrap();
        assert_eq!(received, good);
    }

    #[tokio::test]
    async fn test_recv_none_when_everything_closed() {
        let (mut endpoint, acceptor) = ServerEndpoint::new();
        let (client_side, server_side) = duplex(64);
        acceptor.attach(server_side).await.unwrap();
        drop(acceptor);
        drop(client_side);

        assert!(endpoint.recv().await.is_none());
        assert_eq!(endpoint.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_is_reported() {
        let (mut endpoint, acceptor) = ServerEndpoint::new();
        let (client_side, server_side) = duplex(4096);
        let peer = acceptor.attach(server_side).await.unwrap();
        let (_other_client, other_server) = duplex(4096);
        acceptor.attach(other_server).await.unwrap();

        let mut connection = Connection::new(client_side);
        let request = Envelope::new(0, Message::RegisterRequest);
        connection.send(&request).await.unwrap();
        drop(connection);

        // The acceptor is still alive, as it is behind a real listener.
        assert_eq!(
            endpoint.next_event().await,
            Some(EndpointEvent::Message {
                peer,
                envelope: request
            })
        );
        assert_eq!(
            endpoint.next_event().await,
            Some(EndpointEvent::Disconnected { peer })
        );
        assert_eq!(endpoint.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let (endpoint, _acceptor) = ServerEndpoint::new();
        let envelope = Envelope::new(0, Message::RegisterRequest);
        assert!(matches!(
            endpoint.send(PeerId(9), &envelope).await,
            Err(LifeError::ConnectionClosed)
        ));
    }
}
