//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

use super::wire_format::{Header, MessageKind, MessageMode, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the sequence number.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    /// Typed message kind, if known.
    #[inline]
    pub fn kind(&self) -> Option<MessageKind> {
        self.header.message_kind()
    }

    /// Typed mode, if known.
    #[inline]
    pub fn mode(&self) -> Option<MessageMode> {
        self.header.message_mode()
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use lifewire::protocol::{build_frame, Header, MessageKind, MessageMode};
///
/// let header = Header::new(MessageKind::CellGet, MessageMode::Reply, 42, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), 10 + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let header = Header::new(MessageKind::CellSet, MessageMode::Request, 42, 5);
        let frame = Frame::new(header, Bytes::from_static(b"hello"));

        assert_eq!(frame.kind(), Some(MessageKind::CellSet));
        assert_eq!(frame.mode(), Some(MessageMode::Request));
        assert_eq!(frame.sequence(), 42);
        assert_eq!(frame.payload(), b"hello");
    }

    #[test]
    fn test_frame_unknown_kind() {
        let header = Header {
            kind: 77,
            mode: 1,
            sequence: 0,
            payload_length: 0,
        };
        let frame = Frame::new(header, Bytes::new());
        assert!(frame.kind().is_none());
    }

    #[test]
    fn test_build_frame() {
        let header = Header::new(MessageKind::Barrier, MessageMode::Reply, 9, 3);
        let bytes = build_frame(&header, b"abc");

        assert_eq!(bytes.len(), HEADER_SIZE + 3);
        assert_eq!(Header::decode(&bytes[..HEADER_SIZE]).unwrap(), header);
        assert_eq!(&bytes[HEADER_SIZE..], b"abc");
    }

    #[test]
    fn test_build_frame_empty_payload() {
        let header = Header::new(MessageKind::Registration, MessageMode::Request, 0, 0);
        assert_eq!(build_frame(&header, b"").len(), HEADER_SIZE);
    }
}
