//! # lifewire
//!
//! Conway's Game of Life on a toroidal board, split into horizontal bands
//! owned by separate workers that stay in lock-step behind a global barrier.
//!
//! Two protocol families solve the same coordination problem:
//!
//! - **Request/reply** ([`server`], [`client`]): workers pull halo-inclusive
//!   cells one at a time over a framed socket protocol, push their interior
//!   back, and wait for the coordinator's "continue" after each generation.
//! - **Collective** ([`collective`]): the coordinator ships each worker its
//!   extents and a bulk block once, then only thin halo strips, with two
//!   barrier rendezvous per generation.
//!
//! ## Example
//!
//! ```no_run
//! use lifewire::board::Board;
//! use lifewire::server::{BoardServer, ServerConfig};
//! use lifewire::transport::{listen, TransportKind};
//!
//! # async fn run() -> lifewire::error::Result<()> {
//! let mut board = Board::new(100, 100)?;
//! board.randomize(42);
//!
//! let endpoint = listen(TransportKind::Tcp, "127.0.0.1:7654").await?;
//! let mut server = BoardServer::new(board, ServerConfig::default().with_workers(4).with_steps(10))?;
//! server.serve(endpoint).await?;
//! println!("{} cells alive", server.board().live_count());
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod client;
pub mod codec;
pub mod collective;
pub mod config;
pub mod error;
pub mod partition;
pub mod profile;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod writer;

pub use board::{Board, CellState};
pub use client::LifeClient;
pub use config::SimulationConfig;
pub use error::{LifeError, Result};
pub use server::{BoardServer, ServerConfig};
