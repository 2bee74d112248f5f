//! In-process message passing between ranks.
//!
//! Every rank has one bounded inbox. Senders address a rank; receivers ask
//! for a `(source, tag)` pair and packets that arrive before they are asked
//! for wait in a stash, so two ranks never have to agree on interleaving.

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{LifeError, Result};

/// Default inbox capacity, in packets.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Rank of the coordinator.
pub const ROOT: usize = 0;

/// Packet channel tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Worker extents (coordinator to worker).
    Extents = 1,
    /// Halo-inclusive block or halo strips (coordinator to worker).
    Halo = 2,
    /// Interior cells (worker to coordinator).
    Result = 3,
    Broadcast = 4,
    BarrierArrive = 5,
    BarrierProceed = 6,
}

struct Packet {
    source: usize,
    tag: Tag,
    payload: Bytes,
}

/// One rank's handle on the world.
pub struct Communicator {
    rank: usize,
    size: usize,
    inbox: mpsc::Receiver<Packet>,
    /// Senders to every other rank; `None` at our own index so our inbox
    /// closes once everybody else is gone.
    peers: Vec<Option<mpsc::Sender<Packet>>>,
    stash: VecDeque<Packet>,
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("stashed", &self.stash.len())
            .finish()
    }
}

/// Create `size` connected communicators, indexed by rank.
pub fn world(size: usize) -> Vec<Communicator> {
    world_with_capacity(size, DEFAULT_INBOX_CAPACITY)
}

/// Create a world with a custom inbox capacity.
pub fn world_with_capacity(size: usize, capacity: usize) -> Vec<Communicator> {
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..size).map(|_| mpsc::channel(capacity.max(1))).unzip();

    receivers
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| Communicator {
            rank,
            size,
            inbox,
            peers: senders
                .iter()
                .enumerate()
                .map(|(r, tx)| (r != rank).then(|| tx.clone()))
                .collect(),
            stash: VecDeque::new(),
        })
        .collect()
}

impl Communicator {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the world.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Send a payload to `dest`.
    ///
    /// # Errors
    ///
    /// `Protocol` for a bad rank (including our own), `ConnectionClosed` if
    /// `dest` has dropped its communicator.
    pub async fn send(&self, dest: usize, tag: Tag, payload: Bytes) -> Result<()> {
        let tx = self
            .peers
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                LifeError::Protocol(format!("Rank {} cannot send to rank {}", self.rank, dest))
            })?;
        tx.send(Packet {
            source: self.rank,
            tag,
            payload,
        })
        .await
        .map_err(|_| LifeError::ConnectionClosed)
    }

    /// Receive the next payload from `source` with `tag`.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if every other rank is gone before it arrives.
    pub async fn recv(&mut self, source: usize, tag: Tag) -> Result<Bytes> {
        if let Some(index) = self
            .stash
            .iter()
            .position(|p| p.source == source && p.tag == tag)
        {
            if let Some(packet) = self.stash.remove(index) {
                return Ok(packet.payload);
            }
        }

        loop {
            let packet = self.inbox.recv().await.ok_or(LifeError::ConnectionClosed)?;
            if packet.source == source && packet.tag == tag {
                return Ok(packet.payload);
            }
            self.stash.push_back(packet);
        }
    }

    /// Broadcast from `root`. The root passes its payload and gets it back;
    /// everybody else passes anything (ignored) and gets the root's.
    pub async fn broadcast(&mut self, root: usize, payload: Bytes) -> Result<Bytes> {
        if self.rank == root {
            for dest in (0..self.size).filter(|&r| r != root) {
                self.send(dest, Tag::Broadcast, payload.clone()).await?;
            }
            Ok(payload)
        } else {
            self.recv(root, Tag::Broadcast).await
        }
    }

    /// Block until every rank has called `barrier`.
    ///
    /// Rank 0 collects an arrive token from every other rank, then sends each
    /// of them a proceed token.
    pub async fn barrier(&mut self) -> Result<()> {
        if self.size <= 1 {
            return Ok(());
        }
        if self.rank == ROOT {
            for source in 1..self.size {
                self.recv(source, Tag::BarrierArrive).await?;
            }
            for dest in 1..self.size {
                self.send(dest, Tag::BarrierProceed, Bytes::new()).await?;
            }
        } else {
            self.send(ROOT, Tag::BarrierArrive, Bytes::new()).await?;
            self.recv(ROOT, Tag::BarrierProceed).await?;
        }
        Ok(())
    }
}
