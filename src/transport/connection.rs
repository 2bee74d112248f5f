//! Worker-side connection.
//!
//! Strictly sequential: one request in flight, and the next frame that
//! echoes its sequence number is the reply. Workers never have anything else
//! to do while waiting, so there is no writer task here.

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::Stream;
use crate::error::{LifeError, Result};
use crate::protocol::{Envelope, Frame, FrameBuffer, Message};

const READ_CHUNK: usize = 8 * 1024;

/// Request/reply connection to a coordinator.
pub struct Connection {
    stream: Box<dyn Stream>,
    buffer: FrameBuffer,
    ready: VecDeque<Frame>,
    chunk: Vec<u8>,
    next_sequence: u32,
}

impl Connection {
    /// Wrap an already connected stream.
    pub fn new<S: Stream>(stream: S) -> Self {
        Self {
            stream: Box::new(stream),
            buffer: FrameBuffer::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK],
            next_sequence: 0,
        }
    }

    /// Allocate the next sequence number.
    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        sequence
    }

    /// Write one envelope.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let bytes = envelope.encode()?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next decodable envelope.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` on EOF; framing errors are fatal for the connection.
    pub async fn recv(&mut self) -> Result<Envelope> {
        loop {
            while let Some(frame) = self.ready.pop_front() {
                match Envelope::decode(&frame) {
                    Ok(envelope) => return Ok(envelope),
                    Err(e) => tracing::warn!(
                        sequence = frame.sequence(),
                        error = %e,
                        "ignoring undecodable message"
                    ),
                }
            }

            let n = self.stream.read(&mut self.chunk).await?;
            if n == 0 {
                return Err(LifeError::ConnectionClosed);
            }
            self.ready.extend(self.buffer.push(&self.chunk[..n])?);
        }
    }

    /// Send `message` under a fresh sequence number and wait for the envelope
    /// echoing it. Frames with other sequence numbers are skipped.
    pub async fn request(&mut self, message: Message) -> Result<Envelope> {
        let sequence = self.next_sequence();
        self.send(&Envelope::new(sequence, message)).await?;

        loop {
            let envelope = self.recv().await?;
            if envelope.sequence == sequence {
                return Ok(envelope);
            }
            tracing::debug!(
                expected = sequence,
                got = envelope.sequence,
                "skipping unrelated message"
            );
        }
    }
}
