//! Collective variant - broadcast, send/recv and barrier between ranks.
//!
//! Rank 0 is the [`CollectiveCoordinator`]; ranks `1..=workers` are
//! [`CollectiveWorker`]s. Payloads carry no header: the [`Tag`] says what a
//! packet is.
//!
//! ```text
//! coordinator                         worker
//! broadcast(steps)          ───────►  budget
//! send Extents, Halo(block) ───────►  local board
//! loop:                               loop:
//!                                       step()
//!   barrier                 ◄──────►    barrier
//!   recv Result             ◄───────    send interior
//!   swap read/write
//!   barrier                 ◄──────►    barrier
//!   send Halo × 4 strips    ───────►    apply strips
//! ```
//!
//! # Example
//!
//! ```
//! use lifewire::board::Board;
//! use lifewire::partition::RemainderPolicy;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut board = Board::new(12, 12).unwrap();
//! board.randomize(7);
//! let mut expected = board.clone();
//! expected.step();
//!
//! let result = lifewire::collective::run(board, 3, 1, RemainderPolicy::LastAbsorbs)
//!     .await
//!     .unwrap();
//! assert_eq!(result.cells(), expected.cells());
//! # }
//! ```

mod communicator;
mod coordinator;
mod halo;
mod worker;

pub use communicator::{
    world, world_with_capacity, Communicator, Tag, DEFAULT_INBOX_CAPACITY, ROOT,
};
pub use coordinator::CollectiveCoordinator;
pub use halo::{halo_block, interior, local_board, merge_interior, Strips};
pub use worker::CollectiveWorker;

use crate::board::Board;
use crate::error::{LifeError, Result};
use crate::partition::{validate_worker_count, RemainderPolicy};
use crate::profile::Stopwatch;

/// Run a whole simulation in this process and return the final board.
pub async fn run(
    board: Board,
    workers: usize,
    total_steps: u64,
    policy: RemainderPolicy,
) -> Result<Board> {
    run_profiled(board, workers, total_steps, policy)
        .await
        .map(|(board, _)| board)
}

/// Like [`run`], also returning one stopwatch lap per generation.
///
/// The coordinator runs on the calling task, each worker on its own tokio
/// task.
pub async fn run_profiled(
    board: Board,
    workers: usize,
    total_steps: u64,
    policy: RemainderPolicy,
) -> Result<(Board, Stopwatch)> {
    let worker_count = u32::try_from(workers)
        .map_err(|_| LifeError::Config(format!("Worker count {} is not representable", workers)))?;
    validate_worker_count(board.height(), worker_count)?;

    let mut ranks = world(workers + 1).into_iter();
    let root = ranks
        .next()
        .ok_or_else(|| LifeError::Config("Empty world".to_string()))?;
    let mut coordinator = CollectiveCoordinator::new(root, board, total_steps, policy)?;

    let mut tasks = Vec::with_capacity(workers);
    for comm in ranks {
        let mut worker = CollectiveWorker::new(comm)?;
        tasks.push(tokio::spawn(async move { worker.run().await }));
    }

    if let Err(e) = coordinator.run().await {
        for task in &tasks {
            task.abort();
        }
        return Err(e);
    }

    for task in tasks {
        match task.await {
            Ok(result) => result?,
            Err(e) => return Err(LifeError::Protocol(format!("Worker task failed: {}", e))),
        }
    }

    let stopwatch = coordinator.stopwatch().clone();
    Ok((coordinator.into_board(), stopwatch))
}
