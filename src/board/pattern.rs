//! Plaintext run-length pattern import/export.
//!
//! ```text
//! # comment
//! x = 5, y = 3
//! 5b$
//! b3ob$
//! 5b!
//! ```
//!
//! `<count>o` is a run of live cells, `<count>b` a run of dead cells (count
//! defaults to 1), `$` ends a row (short rows are padded dead), `!` ends the
//! pattern. A count before `$` skips that many rows.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{LifeError, Result};

use super::cell::CellState;
use super::grid::Board;

/// Parse a pattern into a board sized by its header.
///
/// # Errors
///
/// Returns `Pattern` with the offending line for a missing or malformed header,
/// unknown tokens, or cells outside the declared size. No partial board is
/// returned.
pub fn parse(source: &str) -> Result<Board> {
    let mut board: Option<Board> = None;
    let mut x: u32 = 0;
    let mut y: u32 = 0;

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let board = match board.as_mut() {
            Some(b) => b,
            None => {
                let (width, height) = parse_header(line, line_no)?;
                board = Some(Board::new(width, height).map_err(|e| pattern_err(line_no, e))?);
                continue;
            }
        };

        let mut count: Option<u32> = None;
        for ch in line.chars() {
            match ch {
                '0'..='9' => {
                    let digit = ch as u32 - '0' as u32;
                    let next = count
                        .unwrap_or(0)
                        .checked_mul(10)
                        .and_then(|c| c.checked_add(digit))
                        .ok_or_else(|| pattern_err(line_no, "run length overflows"))?;
                    count = Some(next);
                }
                'o' | 'b' => {
                    let run = count.take().unwrap_or(1);
                    let state = CellState::from_alive(ch == 'o');
                    if y >= board.height() || x as u64 + run as u64 > board.width() as u64 {
                        return Err(pattern_err(
                            line_no,
                            format!(
                                "run of {} at ({}, {}) exceeds the declared {}x{} board",
                                run,
                                x,
                                y,
                                board.width(),
                                board.height()
                            ),
                        ));
                    }
                    for _ in 0..run {
                        board.set_raw(x, y, state);
                        x += 1;
                    }
                }
                '$' => {
                    // Cells past the end of a short row are already dead.
                    y = y.saturating_add(count.take().unwrap_or(1));
                    x = 0;
                }
                '!' => return Ok(board.clone()),
                c if c.is_whitespace() => {}
                other => {
                    return Err(pattern_err(line_no, format!("unexpected token '{}'", other)));
                }
            }
        }
    }

    board.ok_or_else(|| pattern_err(0, "missing 'x = <width>, y = <height>' header"))
}

/// Read and parse a pattern file.
pub fn import(path: impl AsRef<Path>) -> Result<Board> {
    let source = std::fs::read_to_string(path)?;
    parse(&source)
}

/// Render a board in run-length form, one line per row.
pub fn render(board: &Board) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "x = {}, y = {}", board.width(), board.height());

    for y in 0..board.height() {
        let mut x = 0;
        while x < board.width() {
            let state = board.get_raw(x, y);
            let mut run = 1;
            while x + run < board.width() && board.get_raw(x + run, y) == state {
                run += 1;
            }
            let token = if state.is_alive() { 'o' } else { 'b' };
            if run > 1 {
                let _ = write!(out, "{}{}", run, token);
            } else {
                out.push(token);
            }
            x += run;
        }
        out.push('$');
        out.push('\n');
    }

    out
}

/// Write a board to a pattern file, replacing any existing file.
pub fn export(board: &Board, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, render(board))?;
    Ok(())
}

fn parse_header(line: &str, line_no: usize) -> Result<(u32, u32)> {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    let mut width = None;
    let mut height = None;

    for token in compact.split(',') {
        if let Some(value) = token.strip_prefix("x=") {
            width = Some(parse_dimension(value, "x", line_no)?);
        } else if let Some(value) = token.strip_prefix("y=") {
            height = Some(parse_dimension(value, "y", line_no)?);
        }
    }

    match (width, height) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(pattern_err(
            line_no,
            "header must look like 'x = <width>, y = <height>'",
        )),
    }
}

fn parse_dimension(value: &str, name: &str, line_no: usize) -> Result<u32> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| pattern_err(line_no, format!("'{}' is not a valid {} size", value, name)))?;
    if parsed == 0 {
        return Err(pattern_err(line_no, format!("{} size must be positive", name)));
    }
    Ok(parsed)
}

fn pattern_err(line: usize, reason: impl ToString) -> LifeError {
    LifeError::Pattern {
        line,
        reason: reason.to_string(),
    }
}
