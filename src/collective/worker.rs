//! Collective worker (rank ≥ 1).

use bytes::Bytes;

use super::communicator::{Communicator, Tag, ROOT};
use super::halo::{interior, local_board, Strips};
use crate::board::{Board, CellState};
use crate::codec::CellCodec;
use crate::error::{LifeError, Result};
use crate::partition::Area;

/// Steps one band and trades borders with rank 0.
pub struct CollectiveWorker {
    comm: Communicator,
    area: Option<Area>,
    local: Option<Board>,
    total_steps: u64,
    generation: u64,
}

impl CollectiveWorker {
    pub fn new(comm: Communicator) -> Result<Self> {
        if comm.rank() == ROOT {
            return Err(LifeError::Config(format!(
                "Rank {} is the coordinator",
                ROOT
            )));
        }
        Ok(Self {
            comm,
            area: None,
            local: None,
            total_steps: 0,
            generation: 0,
        })
    }

    /// Area received from the coordinator, once known.
    pub fn area(&self) -> Option<Area> {
        self.area
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Receive the initial state and run every generation.
    pub async fn run(&mut self) -> Result<()> {
        let budget = self.comm.broadcast(ROOT, Bytes::new()).await?;
        self.total_steps = CellCodec::decode_u64(&budget)?;

        let extents = self.comm.recv(ROOT, Tag::Extents).await?;
        let area = CellCodec::decode_extents(&extents)?;
        let block = self.comm.recv(ROOT, Tag::Halo).await?;
        let mut local = local_board(&area, CellCodec::decode_cells(&block)?)?;
        self.area = Some(area);

        tracing::debug!(
            rank = self.comm.rank(),
            start_y = area.start_y,
            end_y = area.end_y,
            steps = self.total_steps,
            "worker ready"
        );

        while self.generation < self.total_steps {
            self.run_one_generation(&mut local).await?;
        }
        self.local = Some(local);
        Ok(())
    }

    async fn run_one_generation(&mut self, local: &mut Board) -> Result<()> {
        local.step();
        self.comm.barrier().await?;

        self.comm
            .send(ROOT, Tag::Result, CellCodec::encode_cells(&interior(local)))
            .await?;
        self.comm.barrier().await?;

        let strips = Strips {
            top: self.recv_strip().await?,
            bottom: self.recv_strip().await?,
            left: self.recv_strip().await?,
            right: self.recv_strip().await?,
        };
        strips.apply(local)?;

        self.generation += 1;
        Ok(())
    }

    async fn recv_strip(&mut self) -> Result<Vec<CellState>> {
        let payload = self.comm.recv(ROOT, Tag::Halo).await?;
        CellCodec::decode_cells(&payload)
    }

    /// Local board (area plus border) after the last generation.
    pub fn local_board(&self) -> Option<&Board> {
        self.local.as_ref()
    }
}
