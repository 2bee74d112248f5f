//! Wire format encoding and decoding.
//!
//! Implements the 10-byte header format:
//! ```text
//! ┌──────┬──────┬──────────┬──────────┐
//! │ Kind │ Mode │ Sequence │ Length   │
//! │ u8   │ u8   │ uint32 BE│ uint32 BE│
//! └──────┴──────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{LifeError, Result};

/// Header size in bytes (fixed, exactly 10).
pub const HEADER_SIZE: usize = 10;

/// Default maximum payload size (64 KiB). Every message is a handful of integers.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

/// Message kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Worker registration (logon).
    Registration = 1,
    /// Read one cell from the coordinator's `read` board.
    CellGet = 2,
    /// Write one cell into the coordinator's `write` board.
    CellSet = 3,
    /// Generation barrier.
    Barrier = 4,
}

impl MessageKind {
    /// Decode a kind byte. `0` is reserved and rejected like any unknown value.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageKind::Registration),
            2 => Some(MessageKind::CellGet),
            3 => Some(MessageKind::CellSet),
            4 => Some(MessageKind::Barrier),
            _ => None,
        }
    }
}

/// Direction of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageMode {
    /// Worker to coordinator.
    Request = 1,
    /// Coordinator to worker.
    Reply = 2,
    /// Coordinator refusal; payload is a MsgPack string.
    Error = 3,
}

impl MessageMode {
    /// Decode a mode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageMode::Request),
            2 => Some(MessageMode::Reply),
            3 => Some(MessageMode::Error),
            _ => None,
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Message kind byte (see [`MessageKind`]).
    pub kind: u8,
    /// Mode byte (see [`MessageMode`]).
    pub mode: u8,
    /// Per-sender sequence number; replies echo the request's.
    pub sequence: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(kind: MessageKind, mode: MessageMode, sequence: u32, payload_length: u32) -> Self {
        Self {
            kind: kind as u8,
            mode: mode as u8,
            sequence,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use lifewire::protocol::{Header, MessageKind, MessageMode};
    ///
    /// let header = Header::new(MessageKind::CellGet, MessageMode::Request, 42, 7);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 10);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (10 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.kind;
        buf[1] = self.mode;
        buf[2..6].copy_from_slice(&self.sequence.to_be_bytes());
        buf[6..10].copy_from_slice(&self.payload_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            kind: buf[0],
            mode: buf[1],
            sequence: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            payload_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Kind is known (0 is reserved)
    /// - Mode is known
    /// - Payload length doesn't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.message_kind().is_none() {
            return Err(LifeError::Protocol(format!(
                "Unknown message kind {}",
                self.kind
            )));
        }

        if self.message_mode().is_none() {
            return Err(LifeError::Protocol(format!(
                "Unknown message mode {}",
                self.mode
            )));
        }

        if self.payload_length > max_payload_size {
            return Err(LifeError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        Ok(())
    }

    /// Typed kind, if known.
    #[inline]
    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::from_byte(self.kind)
    }

    /// Typed mode, if known.
    #[inline]
    pub fn message_mode(&self) -> Option<MessageMode> {
        MessageMode::from_byte(self.mode)
    }

    /// Check if this is a request.
    #[inline]
    pub fn is_request(&self) -> bool {
        self.mode == MessageMode::Request as u8
    }

    /// Check if this is an error reply.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.mode == MessageMode::Error as u8
    }
}
