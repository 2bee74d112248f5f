//! Reassembles frames from arbitrary read chunks.
//!
//! The buffer holds at most one partial frame. Once a header is complete it is
//! validated and remembered, and the buffer then only waits for that many
//! payload bytes.
//!
//! # Example
//!
//! ```
//! use lifewire::protocol::{build_frame, FrameBuffer, Header, MessageKind, MessageMode};
//!
//! let mut buffer = FrameBuffer::new();
//! let header = Header::new(MessageKind::CellGet, MessageMode::Request, 1, 2);
//! let bytes = build_frame(&header, &[0x92, 0x00]);
//!
//! assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[4..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// Initial buffer capacity; most cell messages are well under this.
const INITIAL_CAPACITY: usize = 1024;

/// Accumulates socket bytes and yields complete frames.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: BytesMut,
    /// Header of the frame whose payload is still arriving.
    current: Option<Header>,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Buffer with the default 64 KiB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            pending: BytesMut::with_capacity(INITIAL_CAPACITY),
            current: None,
            max_payload_size,
        }
    }

    /// Append `data` and return every frame it completes, in order.
    ///
    /// # Errors
    ///
    /// `Protocol` for an unknown kind or mode byte, or a payload larger than
    /// the configured maximum. There is no way to find the next header after
    /// that, so the connection has to go.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.pending.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            let header = match self.current {
                Some(header) => header,
                None => match Header::decode(&self.pending) {
                    Some(header) => {
                        header.validate(self.max_payload_size)?;
                        let _ = self.pending.split_to(HEADER_SIZE);
                        self.current = Some(header);
                        header
                    }
                    None => break,
                },
            };

            let length = header.payload_length as usize;
            if self.pending.len() < length {
                break;
            }
            let payload = if length == 0 {
                Bytes::new()
            } else {
                self.pending.split_to(length).freeze()
            };
            self.current = None;
            frames.push(Frame::new(header, payload));
        }

        Ok(frames)
    }

    /// Buffered bytes not yet returned as part of a frame.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything buffered, including a half-read frame.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    /// True while a header has been read but its payload has not.
    pub fn in_payload(&self) -> bool {
        self.current.is_some()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
