//! Per-generation timing.
//!
//! ```
//! use lifewire::profile::Stopwatch;
//!
//! let mut stopwatch = Stopwatch::new();
//! stopwatch.start();
//! stopwatch.lap();
//! assert_eq!(stopwatch.laps().len(), 1);
//! ```

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use crate::error::Result;

/// Records one duration (whole milliseconds) per lap.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<Instant>,
    laps: Vec<u64>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the current lap.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Record milliseconds since `start()` or the previous lap, and begin the
    /// next lap. A lap on a stopwatch that was never started records 0.
    pub fn lap(&mut self) -> u64 {
        let now = Instant::now();
        let millis = self
            .started
            .map(|started| now.duration_since(started).as_millis() as u64)
            .unwrap_or(0);
        self.laps.push(millis);
        self.started = Some(now);
        millis
    }

    /// Recorded laps, in order.
    pub fn laps(&self) -> &[u64] {
        &self.laps
    }

    /// Sum of all laps.
    pub fn total_millis(&self) -> u64 {
        self.laps.iter().sum()
    }

    /// Render `index,millis` lines.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for (index, millis) in self.laps.iter().enumerate() {
            let _ = writeln!(out, "{},{}", index, millis);
        }
        out
    }

    /// Write `index,millis` lines, truncating the file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }
}
