//! Request/reply coordinator.
//!
//! [`BoardServer`] owns the two full boards: `read` is generation N and is
//! only ever read by workers, `write` collects generation N+1. The state
//! machine lives in [`BoardServer::handle`], which does no I/O; [`BoardServer::serve`]
//! just pumps an endpoint through it one message at a time, so the boards
//! are never touched concurrently.
//!
//! The barrier: every worker reports the generation it finished. Once all
//! `required_workers` have reported the current one, `write` is copied into
//! `read`, `write` is cleared, the generation advances, and each worker gets a
//! "continue" reply carrying the sequence of its own barrier request.

use crate::board::{Board, CellState};
use crate::error::{LifeError, Result};
use crate::partition::{partition, validate_worker_count, Area, RemainderPolicy};
use crate::profile::Stopwatch;
use crate::protocol::{
    Assignment, BarrierAck, BarrierDone, CellRef, CellValue, Envelope, Message, MessageKind,
    MessageMode, SetAck,
};
use crate::transport::{EndpointEvent, PeerId, ServerEndpoint};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Workers that must register before the first barrier can complete.
    pub required_workers: usize,
    /// Generations to run.
    pub total_steps: u64,
    /// How leftover rows are distributed.
    pub remainder: RemainderPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            required_workers: 1,
            total_steps: 1,
            remainder: RemainderPolicy::LastAbsorbs,
        }
    }
}

impl ServerConfig {
    pub fn with_workers(mut self, required_workers: usize) -> Self {
        self.required_workers = required_workers;
        self
    }

    pub fn with_steps(mut self, total_steps: u64) -> Self {
        self.total_steps = total_steps;
        self
    }

    pub fn with_remainder(mut self, remainder: RemainderPolicy) -> Self {
        self.remainder = remainder;
        self
    }
}

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    /// Dense id in join order.
    pub id: u32,
    /// Connection it registered from.
    pub peer: PeerId,
    pub area: Area,
    /// Sequence of the worker's latest registration or barrier request.
    pub last_sequence: u32,
    /// `None` until the first barrier report.
    pub completed_generation: Option<u64>,
}

/// Where the coordinator is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRegistrations,
    Running { generation: u64 },
    Done,
}

/// One reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub peer: PeerId,
    pub envelope: Envelope,
}

impl Outbound {
    fn new(peer: PeerId, sequence: u32, message: Message) -> Self {
        Self {
            peer,
            envelope: Envelope::new(sequence, message),
        }
    }
}

/// Request/reply coordinator state.
pub struct BoardServer {
    read: Board,
    write: Board,
    required_workers: u32,
    total_steps: u64,
    remainder: RemainderPolicy,
    workers: Vec<WorkerDescriptor>,
    generation: u64,
    stopwatch: Stopwatch,
}

impl BoardServer {
    /// Create a coordinator around the initial board.
    ///
    /// # Errors
    ///
    /// `Config` when no workers are required, more workers are required than
    /// the board has rows (or than fit in a `u32`), or no steps are requested.
    pub fn new(read: Board, config: ServerConfig) -> Result<Self> {
        let required_workers = u32::try_from(config.required_workers).map_err(|_| {
            LifeError::Config(format!(
                "Worker count {} is not representable",
                config.required_workers
            ))
        })?;
        validate_worker_count(read.height(), required_workers)?;
        if config.total_steps == 0 {
            return Err(LifeError::Config("Step count must be at least 1".to_string()));
        }

        let mut write = Board::new(read.width(), read.height())?;
        write.set_generation(read.generation());

        Ok(Self {
            read,
            write,
            required_workers,
            total_steps: config.total_steps,
            remainder: config.remainder,
            workers: Vec::new(),
            generation: 0,
            stopwatch: Stopwatch::new(),
        })
    }

    /// Authoritative board (generation N).
    pub fn board(&self) -> &Board {
        &self.read
    }

    /// Board being assembled (generation N+1).
    pub fn pending_board(&self) -> &Board {
        &self.write
    }

    /// Consume the server, keeping the authoritative board.
    pub fn into_board(self) -> Board {
        self.read
    }

    /// Generations completed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn workers(&self) -> &[WorkerDescriptor] {
        &self.workers
    }

    /// One lap per completed generation.
    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn phase(&self) -> Phase {
        if self.generation >= self.total_steps {
            Phase::Done
        } else if self.workers.len() < self.required_workers as usize {
            Phase::AwaitingRegistrations
        } else {
            Phase::Running {
                generation: self.generation,
            }
        }
    }

    /// Check if the step budget is used up.
    pub fn is_done(&self) -> bool {
        self.phase() == Phase::Done
    }

    /// Apply one inbound envelope and return the replies it causes.
    pub fn handle(&mut self, peer: PeerId, envelope: Envelope) -> Vec<Outbound> {
        let sequence = envelope.sequence;
        if envelope.message.mode() != MessageMode::Request {
            tracing::warn!(
                %peer,
                sequence,
                kind = ?envelope.message.kind(),
                "ignoring non-request message"
            );
            return Vec::new();
        }

        match envelope.message {
            Message::RegisterRequest => vec![self.register(peer, sequence)],
            Message::CellGetRequest(CellRef { x, y }) => {
                let state = self.read.get(x, y);
                vec![Outbound::new(
                    peer,
                    sequence,
                    Message::CellGetReply(CellValue { x, y, state }),
                )]
            }
            Message::CellSetRequest(CellValue { x, y, state }) => {
                if state == CellState::Invalid {
                    tracing::warn!(%peer, x, y, "refusing to store an invalid cell");
                    return vec![Outbound::new(
                        peer,
                        sequence,
                        Message::Rejected {
                            kind: MessageKind::CellSet,
                            reason: format!("invalid cell state at ({}, {})", x, y),
                        },
                    )];
                }
                self.write.set(x, y, state);
                vec![Outbound::new(
                    peer,
                    sequence,
                    Message::CellSetReply(SetAck { confirmed: true }),
                )]
            }
            Message::BarrierRequest(done) => self.barrier(peer, sequence, done),
            // Requests only past the mode check.
            _ => Vec::new(),
        }
    }

    fn register(&mut self, peer: PeerId, sequence: u32) -> Outbound {
        if self.workers.len() >= self.required_workers as usize {
            tracing::warn!(
                %peer,
                required = self.required_workers,
                "rejecting registration, every worker slot is taken"
            );
            return Outbound::new(
                peer,
                sequence,
                Message::Rejected {
                    kind: MessageKind::Registration,
                    reason: format!("all {} worker slots are taken", self.required_workers),
                },
            );
        }

        let id = self.workers.len() as u32;
        let area = match partition(self.read.height(), self.required_workers, id, self.remainder) {
            Ok(rows) => rows.area(self.read.width()),
            Err(e) => {
                return Outbound::new(
                    peer,
                    sequence,
                    Message::Rejected {
                        kind: MessageKind::Registration,
                        reason: e.to_string(),
                    },
                )
            }
        };

        self.workers.push(WorkerDescriptor {
            id,
            peer,
            area,
            last_sequence: sequence,
            completed_generation: None,
        });
        tracing::info!(
            worker_id = id,
            %peer,
            start_y = area.start_y,
            end_y = area.end_y,
            "worker registered"
        );

        Outbound::new(
            peer,
            sequence,
            Message::RegisterReply(Assignment::new(id, area, self.total_steps)),
        )
    }

    fn barrier(&mut self, peer: PeerId, sequence: u32, done: BarrierDone) -> Vec<Outbound> {
        let worker = match self.workers.get_mut(done.worker_id as usize) {
            Some(worker) if worker.peer == peer => worker,
            Some(worker) => {
                tracing::warn!(
                    worker_id = done.worker_id,
                    %peer,
                    registered_peer = %worker.peer,
                    "dropping barrier report from the wrong connection"
                );
                return Vec::new();
            }
            None => {
                tracing::warn!(
                    worker_id = done.worker_id,
                    %peer,
                    "dropping barrier report from unregistered worker"
                );
                return Vec::new();
            }
        };

        worker.last_sequence = sequence;
        worker.completed_generation = Some(
            worker
                .completed_generation
                .map_or(done.finished_generation, |g| g.max(done.finished_generation)),
        );
        tracing::debug!(
            worker_id = done.worker_id,
            finished = done.finished_generation,
            "barrier report"
        );

        if !self.barrier_complete() {
            return Vec::new();
        }

        self.advance();
        self.workers
            .iter()
            .map(|w| {
                Outbound::new(
                    w.peer,
                    w.last_sequence,
                    Message::BarrierReply(BarrierAck {
                        worker_id: w.id,
                        continue_next: true,
                    }),
                )
            })
            .collect()
    }

    fn barrier_complete(&self) -> bool {
        self.workers.len() >= self.required_workers as usize
            && self.workers.iter().all(|w| {
                w.completed_generation
                    .is_some_and(|finished| finished >= self.generation)
            })
    }

    fn advance(&mut self) {
        if let Err(e) = self.read.copy_from(&self.write) {
            // Both boards are created with the same size.
            tracing::error!(error = %e, "board swap failed");
        }
        self.write.clear();
        self.generation += 1;
        self.read.set_generation(self.read.generation() + 1);
        self.write.set_generation(self.read.generation());
        let millis = self.stopwatch.lap();
        tracing::info!(
            generation = self.generation,
            total = self.total_steps,
            millis,
            "generation complete"
        );
    }

    /// React to a connection going away.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` while the run is unfinished and either the peer
    /// belonged to a registered worker (its rows can no longer be computed)
    /// or no connection is left at all.
    pub fn disconnected(&self, peer: PeerId, remaining_connections: usize) -> Result<()> {
        if self.is_done() {
            return Ok(());
        }
        if let Some(worker) = self.workers.iter().find(|w| w.peer == peer) {
            tracing::error!(
                worker_id = worker.id,
                %peer,
                generation = self.generation,
                "worker left before the run finished"
            );
            return Err(LifeError::ConnectionClosed);
        }
        if remaining_connections == 0 {
            tracing::error!(
                %peer,
                generation = self.generation,
                "last connection closed before the run finished"
            );
            return Err(LifeError::ConnectionClosed);
        }
        tracing::debug!(%peer, "unregistered connection closed");
        Ok(())
    }

    /// Serve until the step budget is used up.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if a registered worker or every connection goes
    /// away first.
    pub async fn serve(&mut self, mut endpoint: ServerEndpoint) -> Result<()> {
        tracing::info!(
            width = self.read.width(),
            height = self.read.height(),
            workers = self.required_workers,
            steps = self.total_steps,
            "coordinator serving"
        );
        self.stopwatch.start();

        while !self.is_done() {
            let event = match endpoint.next_event().await {
                Some(event) => event,
                None => {
                    tracing::error!(
                        generation = self.generation,
                        "all workers left before the run finished"
                    );
                    return Err(LifeError::ConnectionClosed);
                }
            };

            match event {
                EndpointEvent::Message { peer, envelope } => {
                    for outbound in self.handle(peer, envelope) {
                        if let Err(e) = endpoint.send(outbound.peer, &outbound.envelope).await {
                            tracing::warn!(peer = %outbound.peer, error = %e, "reply not delivered");
                        }
                    }
                }
                EndpointEvent::Disconnected { peer } => {
                    self.disconnected(peer, endpoint.connection_count())?;
                }
            }
        }

        endpoint.shutdown().await;
        tracing::info!(generation = self.generation, "coordinator done");
        Ok(())
    }
}
