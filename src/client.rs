//! Request/reply worker.
//!
//! A [`LifeClient`] owns one band of rows. Each generation it:
//! 1. pulls its band plus one halo row above and below, cell by cell
//! 2. steps the local copy
//! 3. pushes the interior rows back
//! 4. reports the finished generation and waits for "continue"
//!
//! # Example
//!
//! ```no_run
//! use lifewire::client::LifeClient;
//! use lifewire::transport::{connect, RetryPolicy, TransportKind};
//!
//! # async fn run() -> lifewire::error::Result<()> {
//! let connection = connect(TransportKind::Tcp, "127.0.0.1:7654", RetryPolicy::default()).await?;
//! let mut client = LifeClient::new(connection);
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::board::{Board, CellState};
use crate::error::{LifeError, Result};
use crate::protocol::{
    Assignment, BarrierAck, BarrierDone, CellRef, CellValue, Message, SetAck,
};
use crate::transport::Connection;

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unregistered,
    Computing { generation: u64 },
    AwaitingBarrier { generation: u64 },
    Done,
}

/// Request/reply worker.
pub struct LifeClient {
    connection: Connection,
    assignment: Option<Assignment>,
    local: Option<Board>,
    generation: u64,
    state: WorkerState,
}

impl LifeClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            assignment: None,
            local: None,
            generation: 0,
            state: WorkerState::Unregistered,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Assignment received at registration.
    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    /// Generations finished by this worker.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Register with the coordinator.
    ///
    /// # Errors
    ///
    /// `Rejected` if every worker slot is taken, `ConnectionClosed` if the
    /// coordinator hangs up first.
    pub async fn start(&mut self) -> Result<Assignment> {
        let reply = self.connection.request(Message::RegisterRequest).await?;
        let assignment = match expect_reply(reply.message)? {
            Message::RegisterReply(assignment) => assignment,
            other => return Err(unexpected("registration", &other)),
        };

        let area = assignment.area();
        if area.width() == 0 || area.height() == 0 {
            return Err(LifeError::Protocol(format!(
                "Empty assignment {:?}",
                area
            )));
        }
        self.local = Some(Board::new(area.width(), area.height() + 2)?);
        self.assignment = Some(assignment);
        self.generation = 0;
        self.state = if assignment.total_steps == 0 {
            WorkerState::Done
        } else {
            WorkerState::Computing { generation: 0 }
        };

        tracing::info!(
            worker_id = assignment.worker_id,
            start_y = assignment.start_y,
            end_y = assignment.end_y,
            total_steps = assignment.total_steps,
            "registered"
        );
        Ok(assignment)
    }

    /// Compute one generation and pass the barrier.
    pub async fn run_one_generation(&mut self) -> Result<()> {
        let assignment = self
            .assignment
            .ok_or_else(|| LifeError::Protocol("Worker is not registered".to_string()))?;
        if self.generation >= assignment.total_steps {
            return Err(LifeError::Protocol(format!(
                "Step budget of {} generations already used",
                assignment.total_steps
            )));
        }
        let mut local = self
            .local
            .take()
            .ok_or_else(|| LifeError::Protocol("Worker has no local board".to_string()))?;

        let result = self.compute_and_sync(&assignment, &mut local).await;
        self.local = Some(local);
        result
    }

    async fn compute_and_sync(&mut self, assignment: &Assignment, local: &mut Board) -> Result<()> {
        let origin_x = i64::from(assignment.start_x);
        // Local row 0 is the halo row above the band.
        let origin_y = i64::from(assignment.start_y) - 1;

        for y in 0..local.height() {
            for x in 0..local.width() {
                let target = CellRef {
                    x: origin_x + i64::from(x),
                    y: origin_y + i64::from(y),
                };
                let reply = self.connection.request(Message::CellGetRequest(target)).await?;
                let state = match expect_reply(reply.message)? {
                    Message::CellGetReply(CellValue { state, .. }) => state,
                    other => return Err(unexpected("cell get", &other)),
                };
                if state == CellState::Invalid {
                    tracing::warn!(x = target.x, y = target.y, "coordinator returned an invalid cell");
                }
                local.set_raw(x, y, state);
            }
        }

        local.step();

        for y in 1..local.height() - 1 {
            for x in 0..local.width() {
                let value = CellValue {
                    x: origin_x + i64::from(x),
                    y: origin_y + i64::from(y),
                    state: local.get_raw(x, y),
                };
                let reply = self.connection.request(Message::CellSetRequest(value)).await?;
                match expect_reply(reply.message)? {
                    Message::CellSetReply(SetAck { confirmed: true }) => {}
                    other => return Err(unexpected("cell set", &other)),
                }
            }
        }

        self.state = WorkerState::AwaitingBarrier {
            generation: self.generation,
        };
        let done = BarrierDone {
            worker_id: assignment.worker_id,
            finished_generation: self.generation,
        };
        let reply = self.connection.request(Message::BarrierRequest(done)).await?;
        match expect_reply(reply.message)? {
            Message::BarrierReply(BarrierAck {
                worker_id,
                continue_next: true,
            }) if worker_id == assignment.worker_id => {}
            other => return Err(unexpected("barrier", &other)),
        }

        self.generation += 1;
        tracing::debug!(
            worker_id = assignment.worker_id,
            generation = self.generation,
            "generation finished"
        );
        self.state = if self.generation >= assignment.total_steps {
            WorkerState::Done
        } else {
            WorkerState::Computing {
                generation: self.generation,
            }
        };
        Ok(())
    }

    /// Register if needed, then run until the step budget is used up.
    pub async fn run(&mut self) -> Result<()> {
        if self.assignment.is_none() {
            self.start().await?;
        }
        while self.state != WorkerState::Done {
            self.run_one_generation().await?;
        }
        tracing::info!(generation = self.generation, "worker done");
        Ok(())
    }
}

fn expect_reply(message: Message) -> Result<Message> {
    match message {
        Message::Rejected { reason, .. } => Err(LifeError::Rejected(reason)),
        other => Ok(other),
    }
}

fn unexpected(context: &str, message: &Message) -> LifeError {
    LifeError::Protocol(format!("Unexpected {} reply: {:?}", context, message))
}
