//! Row partitioning.
//!
//! Splits `total_rows` into `worker_count` contiguous, ordered, non-overlapping
//! bands. When the rows do not divide evenly, a [`RemainderPolicy`] says who
//! gets the leftovers:
//!
//! - `LastAbsorbs`: 100 rows / 7 workers = six bands of 14, one band of 16
//! - `EarliestFirst`: 100 rows / 7 workers = 15, 15, then five bands of 14
//!
//! # Example
//!
//! ```
//! use lifewire::partition::{partition, RemainderPolicy};
//!
//! let last = partition(100, 7, 6, RemainderPolicy::LastAbsorbs).unwrap();
//! assert_eq!((last.start, last.end), (84, 100));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LifeError, Result};

/// Who absorbs the rows left over by integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemainderPolicy {
    /// The last worker (`worker_count - 1`) takes all leftover rows.
    #[default]
    LastAbsorbs,
    /// The first `remainder` workers take one extra row each.
    EarliestFirst,
}

/// Half-open row range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    /// First row (inclusive).
    pub start: u32,
    /// One past the last row.
    pub end: u32,
}

impl RowRange {
    /// Number of rows in the range.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the range is empty (never true for a valid partition).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Lift the rows to a full-width area.
    #[inline]
    pub fn area(&self, width: u32) -> Area {
        Area {
            start_x: 0,
            start_y: self.start,
            end_x: width,
            end_y: self.end,
        }
    }
}

/// Half-open rectangle owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    /// Left column (inclusive).
    pub start_x: u32,
    /// Top row (inclusive).
    pub start_y: u32,
    /// One past the right column.
    pub end_x: u32,
    /// One past the bottom row.
    pub end_y: u32,
}

impl Area {
    /// Columns in the area.
    #[inline]
    pub fn width(&self) -> u32 {
        self.end_x.saturating_sub(self.start_x)
    }

    /// Rows in the area.
    #[inline]
    pub fn height(&self) -> u32 {
        self.end_y.saturating_sub(self.start_y)
    }
}

/// Compute the rows assigned to `worker_index`.
///
/// # Errors
///
/// Returns `Config` if `worker_count` is zero, exceeds `total_rows` (some
/// worker would get no rows), or `worker_index` is out of range.
pub fn partition(
    total_rows: u32,
    worker_count: u32,
    worker_index: u32,
    policy: RemainderPolicy,
) -> Result<RowRange> {
    validate_worker_count(total_rows, worker_count)?;
    if worker_index >= worker_count {
        return Err(LifeError::Config(format!(
            "Worker index {} out of range for {} workers",
            worker_index, worker_count
        )));
    }

    let rows_per_worker = total_rows / worker_count;
    let remainder = total_rows % worker_count;

    let (start, rows) = match policy {
        RemainderPolicy::LastAbsorbs => {
            let extra = if worker_index == worker_count - 1 {
                remainder
            } else {
                0
            };
            (worker_index * rows_per_worker, rows_per_worker + extra)
        }
        RemainderPolicy::EarliestFirst => {
            let extra = u32::from(worker_index < remainder);
            (
                worker_index * rows_per_worker + worker_index.min(remainder),
                rows_per_worker + extra,
            )
        }
    };

    Ok(RowRange {
        start,
        end: start + rows,
    })
}

/// Partition every worker at once, in index order.
pub fn partition_all(
    total_rows: u32,
    worker_count: u32,
    policy: RemainderPolicy,
) -> Result<Vec<RowRange>> {
    (0..worker_count)
        .map(|index| partition(total_rows, worker_count, index, policy))
        .collect()
}

/// Check that `worker_count` workers can each own at least one of `total_rows` rows.
pub fn validate_worker_count(total_rows: u32, worker_count: u32) -> Result<()> {
    if worker_count == 0 {
        return Err(LifeError::Config("Worker count must be at least 1".to_string()));
    }
    if worker_count > total_rows {
        return Err(LifeError::Config(format!(
            "Too many workers: {} workers for {} rows, maximum is {}",
            worker_count, total_rows, total_rows
        )));
    }
    Ok(())
}
