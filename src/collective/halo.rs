//! Halo extraction and application.
//!
//! A worker with area `w × h` keeps a `(w + 2) × (h + 2)` local board:
//! its area in the middle and a one-cell border copied from its toroidal
//! neighbours. Local `(1, 1)` is global `(start_x, start_y)`.
//!
//! After the first bulk block only the border travels, as four strips in
//! this order: top row and bottom row (`w + 2` cells each, corners
//! included), then left and right column (`h + 2` cells each).

use crate::board::{Board, CellState};
use crate::error::{LifeError, Result};
use crate::partition::Area;

/// The four border strips of one worker's local board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strips {
    pub top: Vec<CellState>,
    pub bottom: Vec<CellState>,
    pub left: Vec<CellState>,
    pub right: Vec<CellState>,
}

impl Strips {
    /// Read the border for `area` out of the global board.
    pub fn extract(board: &Board, area: &Area) -> Self {
        let x0 = i64::from(area.start_x) - 1;
        let y0 = i64::from(area.start_y) - 1;
        let x1 = i64::from(area.end_x);
        let y1 = i64::from(area.end_y);

        Self {
            top: (x0..=x1).map(|x| board.get(x, y0)).collect(),
            bottom: (x0..=x1).map(|x| board.get(x, y1)).collect(),
            left: (y0..=y1).map(|y| board.get(x0, y)).collect(),
            right: (y0..=y1).map(|y| board.get(x1, y)).collect(),
        }
    }

    /// Strips in wire order.
    pub fn in_order(&self) -> [&[CellState]; 4] {
        [&self.top, &self.bottom, &self.left, &self.right]
    }

    /// Write the border into a local board.
    ///
    /// # Errors
    ///
    /// `Protocol` if a strip does not match the local board's size.
    pub fn apply(&self, local: &mut Board) -> Result<()> {
        let width = local.width();
        let height = local.height();
        check_len("top", &self.top, width)?;
        check_len("bottom", &self.bottom, width)?;
        check_len("left", &self.left, height)?;
        check_len("right", &self.right, height)?;

        for x in 0..width {
            local.set_raw(x, 0, self.top[x as usize]);
            local.set_raw(x, height - 1, self.bottom[x as usize]);
        }
        for y in 0..height {
            local.set_raw(0, y, self.left[y as usize]);
            local.set_raw(width - 1, y, self.right[y as usize]);
        }
        Ok(())
    }
}

fn check_len(name: &str, strip: &[CellState], expected: u32) -> Result<()> {
    if strip.len() != expected as usize {
        return Err(LifeError::Protocol(format!(
            "{} strip has {} cells, expected {}",
            name,
            strip.len(),
            expected
        )));
    }
    Ok(())
}

/// The whole halo-inclusive block for `area`, row-major.
pub fn halo_block(board: &Board, area: &Area) -> Vec<CellState> {
    let x0 = i64::from(area.start_x) - 1;
    let y0 = i64::from(area.start_y) - 1;
    let mut cells = Vec::with_capacity((area.width() as usize + 2) * (area.height() as usize + 2));
    for y in y0..=i64::from(area.end_y) {
        for x in x0..=i64::from(area.end_x) {
            cells.push(board.get(x, y));
        }
    }
    cells
}

/// Build a local board from a halo-inclusive block.
pub fn local_board(area: &Area, block: Vec<CellState>) -> Result<Board> {
    Board::from_cells(area.width() + 2, area.height() + 2, block)
}

/// Interior cells of a local board (the border stripped), row-major.
pub fn interior(local: &Board) -> Vec<CellState> {
    let mut cells = Vec::with_capacity(
        (local.width().saturating_sub(2) * local.height().saturating_sub(2)) as usize,
    );
    for y in 1..local.height().saturating_sub(1) {
        for x in 1..local.width().saturating_sub(1) {
            cells.push(local.get_raw(x, y));
        }
    }
    cells
}

/// Write a worker's interior cells into the global board.
///
/// # Errors
///
/// `Protocol` if the cell count does not match the area.
pub fn merge_interior(board: &mut Board, area: &Area, cells: &[CellState]) -> Result<()> {
    let width = area.width() as usize;
    if cells.len() != width * area.height() as usize {
        return Err(LifeError::Protocol(format!(
            "Interior of {:?} needs {} cells, got {}",
            area,
            width * area.height() as usize,
            cells.len()
        )));
    }
    for (i, &state) in cells.iter().enumerate() {
        let x = area.start_x + (i % width) as u32;
        let y = area.start_y + (i / width) as u32;
        board.set_raw(x, y, state);
    }
    Ok(())
}
