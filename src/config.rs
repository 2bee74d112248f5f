//! Simulation configuration.
//!
//! Built once from the command line and validated before any socket is
//! opened. A generated board is not allocated until its size has passed
//! [`SimulationConfig::validate`].

use crate::board::MAX_CELLS;
use crate::error::{LifeError, Result};
use crate::partition::{validate_worker_count, RemainderPolicy};
use crate::server::ServerConfig;

/// Default board width and height.
pub const DEFAULT_SIZE: u32 = 100;

/// What to simulate and how to split it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub width: u32,
    pub height: u32,
    pub steps: u64,
    pub workers: usize,
    pub remainder: RemainderPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            steps: 1,
            workers: 1,
            remainder: RemainderPolicy::LastAbsorbs,
        }
    }
}

impl SimulationConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }

    /// Check every invariant the run depends on.
    ///
    /// # Errors
    ///
    /// `Config` for a zero dimension, a board over [`MAX_CELLS`] cells, zero
    /// steps, or a worker count outside `1..=height`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LifeError::Config(format!(
                "Board dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        let cells = u64::from(self.width) * u64::from(self.height);
        if cells > MAX_CELLS {
            return Err(LifeError::Config(format!(
                "A {}x{} board has {} cells, more than the maximum of {}",
                self.width, self.height, cells, MAX_CELLS
            )));
        }
        if self.steps == 0 {
            return Err(LifeError::Config("Step count must be at least 1".to_string()));
        }
        let workers = u32::try_from(self.workers).map_err(|_| {
            LifeError::Config(format!("Worker count {} is not representable", self.workers))
        })?;
        validate_worker_count(self.height, workers)
    }

    /// Coordinator settings for the request/reply protocol.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_workers(self.workers)
            .with_steps(self.steps)
            .with_remainder(self.remainder)
    }
}
