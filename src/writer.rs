//! Dedicated writer task per connection.
//!
//! The coordinator's serve loop never touches a socket directly: each
//! connection gets a writer task fed by an mpsc channel, which batches queued
//! frames into vectored writes.
//!
//! ```text
//! serve loop ─► WriterHandle (peer 0) ─► mpsc ─► Writer Task ─► socket
//!           └─► WriterHandle (peer 1) ─► mpsc ─► Writer Task ─► socket
//! ```

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{LifeError, Result};
use crate::protocol::{Envelope, Header, HEADER_SIZE};

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (10 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for a registration request).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Encode an envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let (header, payload) = envelope.encode_parts()?;
        Ok(Self::new(&header, payload))
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable. Dropping every handle shuts the task down after it
/// has flushed what was queued.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` once the writer task has exited.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| LifeError::ConnectionClosed)
    }

    /// Encode and queue an envelope.
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        self.send(OutboundFrame::from_envelope(envelope)?).await
    }

    /// Check if the writer task is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The `JoinHandle` resolves once every `WriterHandle` is dropped and the
/// queue is flushed, or on the first write error.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Spawn the writer task with the default channel capacity.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, DEFAULT_CHANNEL_CAPACITY)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                writer.shutdown().await.ok();
                return Ok(());
            }
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch with `write_vectored`, resuming after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut written = 0;

    while written < total_size {
        let slices = build_remaining_slices(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(LifeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// IoSlices for everything past the first `skip_bytes` of the batch.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.header[..], &frame.payload[..]] {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(offset)..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CellRef, FrameBuffer, Message, MessageKind, MessageMode};
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    fn frame(sequence: u32, payload: &'static [u8]) -> OutboundFrame {
        let header = Header::new(
            MessageKind::CellGet,
            MessageMode::Reply,
            sequence,
            payload.len() as u32,
        );
        OutboundFrame::new(&header, Bytes::from_static(payload))
    }

    #[test]
    fn test_outbound_frame_size() {
        let frame = frame(42, b"hello");
        assert_eq!(frame.header.len(), HEADER_SIZE);
        assert_eq!(frame.size(), HEADER_SIZE + 5);
    }

    #[tokio::test]
    async fn test_send_envelope_arrives_decodable() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task_default(client);

        let envelope = Envelope::new(9, Message::CellGetRequest(CellRef { x: 1, y: 2 }));
        handle.send_envelope(&envelope).await.unwrap();
        drop(handle);
        task.await.unwrap().unwrap();

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();
        let frames = FrameBuffer::new().push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(Envelope::decode(&frames[0]).unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_writer_batching_preserves_order() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task_default(client);

        for i in 0..10u32 {
            handle.send(frame(i, b"abcd")).await.unwrap();
        }
        drop(handle);
        task.await.unwrap().unwrap();

        let mut bytes = Vec::new();
        server.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len(), 10 * (HEADER_SIZE + 4));

        let frames = FrameBuffer::new().push(&bytes).unwrap();
        let sequences: Vec<u32> = frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_send_after_task_exit_is_connection_closed() {
        let (client, server) = duplex(64);
        drop(server);
        let (handle, task) = spawn_writer_task(client, 1);

        // The first write fails on the closed duplex and ends the task.
        handle.send(frame(0, b"x")).await.unwrap();
        assert!(task.await.unwrap().is_err());

        let result = handle.send(frame(1, b"y")).await;
        assert!(matches!(result, Err(LifeError::ConnectionClosed)));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![frame(42, b"hello")];

        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 5);
    }

    #[test]
    fn test_build_remaining_slices_skip_header() {
        let batch = vec![frame(42, b"hello")];

        let slices = build_remaining_slices(&batch, HEADER_SIZE);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 5);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|i| frame(i, b"abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 3));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task_default(client);

        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }
}
