//! Tri-valued cell state.
//!
//! The byte values are part of the wire format: the packed cell codec sends
//! one `u8` per cell, and MsgPack payloads carry the same number.

use serde::{Deserialize, Serialize};

use crate::error::{LifeError, Result};

/// Life status of a single cell.
///
/// `Invalid` only shows up when something went wrong: the toroidal board never
/// returns it, so seeing it on the wire means a protocol desync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum CellState {
    /// Out-of-range or corrupted value.
    Invalid = 0,
    /// Dead cell.
    #[default]
    Dead = 1,
    /// Live cell.
    Alive = 2,
}

impl CellState {
    /// Check if the cell is alive.
    #[inline]
    pub fn is_alive(self) -> bool {
        self == CellState::Alive
    }

    /// Map a boolean to `Alive`/`Dead`.
    #[inline]
    pub fn from_alive(alive: bool) -> Self {
        if alive {
            CellState::Alive
        } else {
            CellState::Dead
        }
    }

    /// Next state given the number of live neighbours.
    #[inline]
    pub fn next(self, live_neighbours: u8) -> Self {
        match (self, live_neighbours) {
            (CellState::Alive, 2) | (CellState::Alive, 3) => CellState::Alive,
            (CellState::Dead, 3) => CellState::Alive,
            _ => CellState::Dead,
        }
    }
}

impl From<CellState> for u8 {
    #[inline]
    fn from(state: CellState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for CellState {
    type Error = LifeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CellState::Invalid),
            1 => Ok(CellState::Dead),
            2 => Ok(CellState::Alive),
            other => Err(LifeError::Protocol(format!(
                "Unknown cell state byte {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_values_are_stable() {
        assert_eq!(u8::from(CellState::Invalid), 0);
        assert_eq!(u8::from(CellState::Dead), 1);
        assert_eq!(u8::from(CellState::Alive), 2);
    }

    #[test]
    fn test_try_from_rejects_unknown_byte() {
        assert!(CellState::try_from(3).is_err());
        assert_eq!(CellState::try_from(2).unwrap(), CellState::Alive);
    }

    #[test]
    fn test_rule_table() {
        // Birth needs exactly three.
        assert_eq!(CellState::Dead.next(3), CellState::Alive);
        assert_eq!(CellState::Dead.next(2), CellState::Dead);
        assert_eq!(CellState::Dead.next(4), CellState::Dead);

        // Survival on two or three.
        assert_eq!(CellState::Alive.next(1), CellState::Dead);
        assert_eq!(CellState::Alive.next(2), CellState::Alive);
        assert_eq!(CellState::Alive.next(3), CellState::Alive);
        assert_eq!(CellState::Alive.next(4), CellState::Dead);

        assert_eq!(CellState::Invalid.next(3), CellState::Dead);
    }

    #[test]
    fn test_default_is_dead() {
        assert_eq!(CellState::default(), CellState::Dead);
    }
}
