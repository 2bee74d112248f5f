//! Board module - cell state, the toroidal grid, and the pattern format.
//!
//! - [`CellState`] - tri-valued cell (`Invalid`, `Dead`, `Alive`)
//! - [`Board`] - row-major toroidal grid with a pure `step()`
//! - [`pattern`] - run-length plaintext import/export

mod cell;
mod grid;
pub mod pattern;

pub use cell::CellState;
pub use grid::{Board, MAX_CELLS};
