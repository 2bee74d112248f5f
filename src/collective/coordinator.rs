//! Collective coordinator (rank 0).

use super::communicator::{Communicator, Tag, ROOT};
use super::halo::{halo_block, merge_interior, Strips};
use crate::board::Board;
use crate::codec::CellCodec;
use crate::error::{LifeError, Result};
use crate::partition::{partition_all, Area, RemainderPolicy};
use crate::profile::Stopwatch;

/// Owns the global boards and drives the generation loop.
pub struct CollectiveCoordinator {
    comm: Communicator,
    read: Board,
    write: Board,
    /// Area of rank `i + 1`.
    areas: Vec<Area>,
    total_steps: u64,
    generation: u64,
    stopwatch: Stopwatch,
}

impl CollectiveCoordinator {
    /// Partition `board` over every other rank of `comm`'s world.
    ///
    /// # Errors
    ///
    /// `Config` if `comm` is not rank 0, the world has no worker ranks, or
    /// there are more workers than rows.
    pub fn new(
        comm: Communicator,
        board: Board,
        total_steps: u64,
        policy: RemainderPolicy,
    ) -> Result<Self> {
        if comm.rank() != ROOT {
            return Err(LifeError::Config(format!(
                "Coordinator must be rank {}, got {}",
                ROOT,
                comm.rank()
            )));
        }
        let workers = u32::try_from(comm.size().saturating_sub(1))
            .map_err(|_| LifeError::Config("Too many ranks".to_string()))?;
        let areas = partition_all(board.height(), workers, policy)?
            .into_iter()
            .map(|rows| rows.area(board.width()))
            .collect();

        let mut write = Board::new(board.width(), board.height())?;
        write.set_generation(board.generation());

        Ok(Self {
            comm,
            read: board,
            write,
            areas,
            total_steps,
            generation: 0,
            stopwatch: Stopwatch::new(),
        })
    }

    pub fn board(&self) -> &Board {
        &self.read
    }

    pub fn into_board(self) -> Board {
        self.read
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Areas by worker rank (index 0 is rank 1).
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Distribute the initial state and run every generation.
    pub async fn run(&mut self) -> Result<()> {
        self.comm
            .broadcast(ROOT, CellCodec::encode_u64(self.total_steps))
            .await?;

        for (index, area) in self.areas.iter().enumerate() {
            let rank = index + 1;
            self.comm
                .send(rank, Tag::Extents, CellCodec::encode_extents(area))
                .await?;
            let block = halo_block(&self.read, area);
            self.comm
                .send(rank, Tag::Halo, CellCodec::encode_cells(&block))
                .await?;
        }
        tracing::info!(
            workers = self.areas.len(),
            steps = self.total_steps,
            "initial blocks sent"
        );

        self.stopwatch.start();
        while self.generation < self.total_steps {
            self.run_one_generation().await?;
        }
        Ok(())
    }

    async fn run_one_generation(&mut self) -> Result<()> {
        // Workers have stepped.
        self.comm.barrier().await?;

        for (index, area) in self.areas.iter().enumerate() {
            let payload = self.comm.recv(index + 1, Tag::Result).await?;
            let cells = CellCodec::decode_cells(&payload)?;
            merge_interior(&mut self.write, area, &cells)?;
        }

        self.read.copy_from(&self.write)?;
        self.write.clear();
        self.generation += 1;
        self.read.set_generation(self.read.generation() + 1);
        self.write.set_generation(self.read.generation());

        // Everybody has sent; strips now come from the new generation.
        self.comm.barrier().await?;

        for (index, area) in self.areas.iter().enumerate() {
            let strips = Strips::extract(&self.read, area);
            for strip in strips.in_order() {
                self.comm
                    .send(index + 1, Tag::Halo, CellCodec::encode_cells(strip))
                    .await?;
            }
        }

        let millis = self.stopwatch.lap();
        tracing::info!(
            generation = self.generation,
            total = self.total_steps,
            millis,
            "generation complete"
        );
        Ok(())
    }
}
