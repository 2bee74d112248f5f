//! Packed cell codec for the collective variant.
//!
//! Blocks of cells travel one byte per cell, row-major, using the
//! [`CellState`] byte values. Extents are four `u32` BE (`start_x`,
//! `start_y`, `end_x`, `end_y`) and the step budget is one `u64` BE.
//!
//! # Example
//!
//! ```
//! use lifewire::board::CellState;
//! use lifewire::codec::CellCodec;
//!
//! let packed = CellCodec::encode_cells(&[CellState::Dead, CellState::Alive]);
//! assert_eq!(&packed[..], &[1, 2]);
//! assert_eq!(CellCodec::decode_cells(&packed).unwrap()[1], CellState::Alive);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::board::CellState;
use crate::error::{LifeError, Result};
use crate::partition::Area;

/// Encoded extents size (4 × u32).
pub const EXTENTS_SIZE: usize = 16;

/// Codec for packed cells and the fixed-width integers sent alongside them.
pub struct CellCodec;

impl CellCodec {
    /// Pack cells into one byte each.
    pub fn encode_cells(cells: &[CellState]) -> Bytes {
        let mut buf = BytesMut::with_capacity(cells.len());
        for &cell in cells {
            buf.put_u8(cell.into());
        }
        buf.freeze()
    }

    /// Unpack cells.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` on the first byte that is not a known cell state.
    pub fn decode_cells(bytes: &[u8]) -> Result<Vec<CellState>> {
        bytes.iter().map(|&b| CellState::try_from(b)).collect()
    }

    /// Encode extents as four big-endian `u32`.
    pub fn encode_extents(area: &Area) -> Bytes {
        let mut buf = BytesMut::with_capacity(EXTENTS_SIZE);
        buf.put_u32(area.start_x);
        buf.put_u32(area.start_y);
        buf.put_u32(area.end_x);
        buf.put_u32(area.end_y);
        buf.freeze()
    }

    /// Decode extents.
    pub fn decode_extents(bytes: &[u8]) -> Result<Area> {
        if bytes.len() != EXTENTS_SIZE {
            return Err(LifeError::Protocol(format!(
                "Extents must be {} bytes, got {}",
                EXTENTS_SIZE,
                bytes.len()
            )));
        }
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let area = Area {
            start_x: word(0),
            start_y: word(4),
            end_x: word(8),
            end_y: word(12),
        };
        if area.end_x < area.start_x || area.end_y < area.start_y {
            return Err(LifeError::Protocol(format!("Inverted extents {:?}", area)));
        }
        Ok(area)
    }

    /// Encode a `u64` big-endian.
    #[inline]
    pub fn encode_u64(value: u64) -> Bytes {
        Bytes::copy_from_slice(&value.to_be_bytes())
    }

    /// Decode a big-endian `u64`.
    pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            LifeError::Protocol(format!("Expected 8 bytes for u64, got {}", bytes.len()))
        })?;
        Ok(u64::from_be_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_one_byte_each() {
        let cells = [CellState::Alive, CellState::Dead, CellState::Dead, CellState::Alive];
        let packed = CellCodec::encode_cells(&cells);
        assert_eq!(&packed[..], &[2, 1, 1, 2]);
        assert_eq!(CellCodec::decode_cells(&packed).unwrap(), cells);
    }

    #[test]
    fn test_decode_cells_rejects_unknown_byte() {
        let err = CellCodec::decode_cells(&[1, 2, 7]).unwrap_err();
        assert!(matches!(err, LifeError::Protocol(_)));
    }

    #[test]
    fn test_extents_big_endian() {
        let area = Area {
            start_x: 0,
            start_y: 14,
            end_x: 100,
            end_y: 0x0102_0304,
        };
        let bytes = CellCodec::encode_extents(&area);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 14]);
        assert_eq!(&bytes[12..16], &[1, 2, 3, 4]);
        assert_eq!(CellCodec::decode_extents(&bytes).unwrap(), area);
    }

    #[test]
    fn test_extents_wrong_length() {
        assert!(CellCodec::decode_extents(&[0; 15]).is_err());
    }

    #[test]
    fn test_extents_inverted() {
        let area = Area {
            start_x: 5,
            start_y: 0,
            end_x: 4,
            end_y: 1,
        };
        assert!(CellCodec::decode_extents(&CellCodec::encode_extents(&area)).is_err());
    }

    #[test]
    fn test_u64() {
        let bytes = CellCodec::encode_u64(1_000_000_007);
        assert_eq!(bytes.len(), 8);
        assert_eq!(CellCodec::decode_u64(&bytes).unwrap(), 1_000_000_007);
        assert!(CellCodec::decode_u64(&bytes[..7]).is_err());
    }
}
