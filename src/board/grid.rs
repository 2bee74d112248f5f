//! Toroidal board with wrapping and raw accessors.
//!
//! Storage is a single row-major `Vec<CellState>` indexed `y * width + x`.
//! The wrapping accessors (`get`/`set`) take signed coordinates and wrap both
//! axes, negative inputs included. The raw accessors (`get_raw`/`set_raw`)
//! skip the modulo and expect in-bounds coordinates.
//!
//! # Example
//!
//! ```
//! use lifewire::board::{Board, CellState};
//!
//! let mut board = Board::new(4, 3).unwrap();
//! board.set(-1, 0, CellState::Alive);
//! assert_eq!(board.get(3, 0), CellState::Alive);
//! assert_eq!(board.get(7, 3), CellState::Alive);
//! ```

use crate::error::{LifeError, Result};

use super::cell::CellState;

/// Largest board accepted, in cells (one byte each).
pub const MAX_CELLS: u64 = 1 << 30;

/// `width * height`, if the board is small enough to hold.
fn cell_count(width: u32, height: u32) -> Result<usize> {
    let cells = u64::from(width) * u64::from(height);
    if cells > MAX_CELLS {
        return Err(LifeError::Config(format!(
            "A {}x{} board has {} cells, more than the maximum of {}",
            width, height, cells, MAX_CELLS
        )));
    }
    usize::try_from(cells).map_err(|_| {
        LifeError::Config(format!("A {}x{} board does not fit in memory", width, height))
    })
}

/// One generation of cell states for a rectangular toroidal area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: u32,
    height: u32,
    cells: Vec<CellState>,
    generation: u64,
}

impl Board {
    /// Create an all-dead board.
    ///
    /// # Errors
    ///
    /// Returns `Config` if either dimension is zero, the board would hold more
    /// than [`MAX_CELLS`] cells, or the cells cannot be allocated.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LifeError::Config(format!(
                "Board dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        let len = cell_count(width, height)?;

        let mut cells = Vec::new();
        cells.try_reserve_exact(len).map_err(|e| {
            LifeError::Config(format!(
                "Cannot allocate a {}x{} board: {}",
                width, height, e
            ))
        })?;
        cells.resize(len, CellState::Dead);

        Ok(Self {
            width,
            height,
            cells,
            generation: 0,
        })
    }

    /// Create a board from row-major cells.
    pub fn from_cells(width: u32, height: u32, cells: Vec<CellState>) -> Result<Self> {
        let mut board = Self::new(width, height)?;
        if cells.len() != board.cells.len() {
            return Err(LifeError::Protocol(format!(
                "Expected {} cells for a {}x{} board, got {}",
                board.cells.len(),
                width,
                height,
                cells.len()
            )));
        }
        board.cells = cells;
        Ok(board)
    }

    /// Board width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Board height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Current generation number.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Overwrite the generation number.
    #[inline]
    pub fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Get a cell, wrapping both coordinates.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> CellState {
        let (x, y) = self.wrap(x, y);
        self.get_raw(x, y)
    }

    /// Set a cell, wrapping both coordinates.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, state: CellState) {
        let (x, y) = self.wrap(x, y);
        self.set_raw(x, y, state);
    }

    /// Get a cell without wrapping. Caller guarantees `x < width`, `y < height`.
    #[inline]
    pub fn get_raw(&self, x: u32, y: u32) -> CellState {
        self.cells[self.index(x, y)]
    }

    /// Set a cell without wrapping. Caller guarantees `x < width`, `y < height`.
    #[inline]
    pub fn set_raw(&mut self, x: u32, y: u32, state: CellState) {
        let index = self.index(x, y);
        self.cells[index] = state;
    }

    /// Row-major view of all cells.
    #[inline]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// Number of live cells.
    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_alive()).count()
    }

    /// Kill every cell. The generation number is left alone.
    pub fn clear(&mut self) {
        self.cells.fill(CellState::Dead);
    }

    /// Copy every cell of `other` into this board.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the boards differ in size.
    pub fn copy_from(&mut self, other: &Board) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(LifeError::DimensionMismatch {
                left: (self.width, self.height),
                right: (other.width, other.height),
            });
        }
        self.cells.copy_from_slice(&other.cells);
        Ok(())
    }

    /// Advance one generation.
    ///
    /// Reads only the current cells and writes into a fresh buffer, so no
    /// cell sees a neighbour that was already updated in this pass.
    pub fn step(&mut self) {
        let mut next = vec![CellState::Dead; self.cells.len()];
        let width = self.width as i64;
        let height = self.height as i64;

        for y in 0..height {
            for x in 0..width {
                let mut neighbours = 0u8;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        if (dx != 0 || dy != 0) && self.get(x + dx, y + dy).is_alive() {
                            neighbours += 1;
                        }
                    }
                }
                next[(y * width + x) as usize] =
                    self.get_raw(x as u32, y as u32).next(neighbours);
            }
        }

        self.cells = next;
        self.generation += 1;
    }

    /// Fill with pseudo-random cells (roughly half alive).
    pub fn randomize(&mut self, seed: u64) {
        let mut state = seed;
        for cell in self.cells.iter_mut() {
            *cell = CellState::from_alive(splitmix64(&mut state) & 1 == 1);
        }
    }

    #[inline]
    fn wrap(&self, x: i64, y: i64) -> (u32, u32) {
        (
            x.rem_euclid(self.width as i64) as u32,
            y.rem_euclid(self.height as i64) as u32,
        )
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }
}

/// SplitMix64 step; enough for seeding test boards.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(width: u32, height: u32, alive: &[(i64, i64)]) -> Board {
        let mut board = Board::new(width, height).unwrap();
        for &(x, y) in alive {
            board.set(x, y, CellState::Alive);
        }
        board
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(Board::new(0, 5).is_err());
        assert!(Board::new(5, 0).is_err());
    }

    #[test]
    fn test_oversized_board_rejected() {
        let err = Board::new(4_000_000_000, 4_000_000_000).unwrap_err();
        assert!(matches!(err, LifeError::Config(_)));
        assert!(err.to_string().contains("maximum"));

        // One past the limit in either direction.
        assert!(Board::new(1 << 15, (1 << 15) + 1).is_err());
        assert!(Board::new(u32::MAX, 1).is_err());
    }

    #[test]
    fn test_new_board_is_dead() {
        let board = Board::new(6, 4).unwrap();
        assert_eq!(board.live_count(), 0);
        assert_eq!(board.generation(), 0);
        assert!(board.cells().iter().all(|&c| c == CellState::Dead));
    }

    #[test]
    fn test_toroidal_wraparound_x() {
        let mut board = Board::new(5, 4).unwrap();
        board.set(4, 0, CellState::Alive);
        assert_eq!(board.get(-1, 0), board.get(4, 0));
        board.set(0, 1, CellState::Alive);
        assert_eq!(board.get(5, 1), board.get(0, 1));
        assert_eq!(board.get(-6, 0), CellState::Alive);
    }

    #[test]
    fn test_toroidal_wraparound_y() {
        let mut board = Board::new(5, 4).unwrap();
        board.set(2, 3, CellState::Alive);
        assert_eq!(board.get(2, -1), board.get(2, 3));
        board.set(1, 0, CellState::Alive);
        assert_eq!(board.get(1, 4), board.get(1, 0));
        assert_eq!(board.get(2, -9), CellState::Alive);
    }

    #[test]
    fn test_raw_accessors_are_row_major() {
        let mut board = Board::new(3, 2).unwrap();
        board.set_raw(2, 1, CellState::Alive);
        assert_eq!(board.cells()[1 * 3 + 2], CellState::Alive);
        assert_eq!(board.get_raw(2, 1), CellState::Alive);
    }

    #[test]
    fn test_dead_cell_with_three_neighbours_is_born() {
        let mut board = board_with(5, 5, &[(1, 1), (2, 1), (3, 1)]);
        board.step();
        assert_eq!(board.get(2, 2), CellState::Alive);
        assert_eq!(board.get(2, 0), CellState::Alive);
    }

    #[test]
    fn test_live_cell_with_one_neighbour_dies() {
        let mut board = board_with(6, 6, &[(2, 2), (3, 2)]);
        board.step();
        assert_eq!(board.get(2, 2), CellState::Dead);
        assert_eq!(board.get(3, 2), CellState::Dead);
    }

    #[test]
    fn test_live_cell_with_four_neighbours_dies() {
        // Centre (2,2) has four live neighbours.
        let mut board = board_with(7, 7, &[(2, 2), (1, 1), (3, 1), (1, 3), (3, 3)]);
        board.step();
        assert_eq!(board.get(2, 2), CellState::Dead);
    }

    #[test]
    fn test_live_cell_with_two_or_three_neighbours_survives() {
        // Block: every cell has exactly three neighbours.
        let mut block = board_with(6, 6, &[(2, 2), (3, 2), (2, 3), (3, 3)]);
        let before = block.clone();
        block.step();
        assert_eq!(block.cells(), before.cells());

        // Middle of a horizontal line has two neighbours.
        let mut line = board_with(7, 7, &[(2, 3), (3, 3), (4, 3)]);
        line.step();
        assert_eq!(line.get(3, 3), CellState::Alive);
    }

    #[test]
    fn test_step_is_double_buffered() {
        // In-place updating would let the first births feed later cells.
        let mut board = board_with(8, 8, &[(1, 1), (2, 1), (3, 1)]);
        board.step();
        let expected = board_with(8, 8, &[(2, 0), (2, 1), (2, 2)]);
        assert_eq!(board.cells(), expected.cells());
    }

    #[test]
    fn test_blinker_has_period_two() {
        let start = board_with(10, 10, &[(4, 5), (5, 5), (6, 5)]);
        let mut board = start.clone();
        board.step();
        assert_ne!(board.cells(), start.cells());
        board.step();
        assert_eq!(board.cells(), start.cells());
        assert_eq!(board.generation(), 2);
    }

    #[test]
    fn test_all_dead_is_fixed_point() {
        let mut board = Board::new(10, 10).unwrap();
        board.step();
        assert_eq!(board.live_count(), 0);
    }

    #[test]
    fn test_neighbours_wrap_across_edges() {
        // Vertical blinker straddling the top/bottom seam.
        let mut board = board_with(5, 5, &[(2, 4), (2, 0), (2, 1)]);
        board.step();
        let expected = board_with(5, 5, &[(1, 0), (2, 0), (3, 0)]);
        assert_eq!(board.cells(), expected.cells());
    }

    #[test]
    fn test_clear_keeps_generation() {
        let mut board = board_with(4, 4, &[(0, 0)]);
        board.set_generation(7);
        board.clear();
        assert_eq!(board.live_count(), 0);
        assert_eq!(board.generation(), 7);
    }

    #[test]
    fn test_copy_from_dimension_mismatch() {
        let mut a = Board::new(4, 4).unwrap();
        let b = Board::new(4, 5).unwrap();
        let err = a.copy_from(&b).unwrap_err();
        assert!(err.to_string().contains("dimensions differ"));
    }

    #[test]
    fn test_from_cells_length_checked() {
        assert!(Board::from_cells(2, 2, vec![CellState::Dead; 3]).is_err());
        let board = Board::from_cells(2, 1, vec![CellState::Alive, CellState::Dead]).unwrap();
        assert_eq!(board.get(0, 0), CellState::Alive);
    }

    #[test]
    fn test_randomize_is_deterministic() {
        let mut a = Board::new(16, 16).unwrap();
        let mut b = Board::new(16, 16).unwrap();
        a.randomize(42);
        b.randomize(42);
        assert_eq!(a, b);
        assert!(a.live_count() > 0 && a.live_count() < 256);
    }
}
