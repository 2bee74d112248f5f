use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use lifewire::board::{pattern, Board};
use lifewire::config::{SimulationConfig, DEFAULT_SIZE};
use lifewire::partition::RemainderPolicy;
use lifewire::profile::Stopwatch;
use lifewire::server::BoardServer;
use lifewire::transport::{self, RetryPolicy};
use lifewire::LifeClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Step the board in this process with no workers
    Local {
        #[command(flatten)]
        board: BoardArgs,
    },
    /// Run the request/reply coordinator
    Server {
        #[command(flatten)]
        board: BoardArgs,

        /// Workers that must register before the run starts
        #[arg(long, default_value_t = 1)]
        clients: usize,

        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Who absorbs leftover rows
        #[arg(long, value_enum, default_value_t = Remainder::Last)]
        remainder: Remainder,
    },
    /// Run one request/reply worker
    Client {
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Connection attempts before giving up
        #[arg(long, default_value_t = 60)]
        retries: u32,

        /// Delay between connection attempts in milliseconds
        #[arg(long, default_value_t = 1000)]
        backoff_ms: u64,
    },
    /// Run coordinator and workers in this process over the collective protocol
    Collective {
        #[command(flatten)]
        board: BoardArgs,

        /// Worker count
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Who absorbs leftover rows
        #[arg(long, value_enum, default_value_t = Remainder::Last)]
        remainder: Remainder,
    },
}

#[derive(Args)]
struct BoardArgs {
    /// Board width (ignored with --input)
    #[arg(long, default_value_t = DEFAULT_SIZE)]
    width: u32,

    /// Board height (ignored with --input)
    #[arg(long, default_value_t = DEFAULT_SIZE)]
    height: u32,

    /// Pattern file to start from instead of a random fill
    #[arg(long)]
    input: Option<PathBuf>,

    /// Seed for the random fill
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Where to write the final board
    #[arg(long)]
    output: Option<PathBuf>,

    /// Generations to run
    #[arg(long, default_value_t = 1)]
    steps: u64,

    /// Where to write per-generation timings as CSV
    #[arg(long)]
    profile: Option<PathBuf>,
}

#[derive(Args)]
struct EndpointArgs {
    #[arg(long, value_enum, default_value_t = Transport::Tcp)]
    transport: Transport,

    /// Socket address or path; defaults per transport
    #[arg(long)]
    address: Option<String>,
}

impl EndpointArgs {
    fn kind(&self) -> transport::TransportKind {
        match self.transport {
            Transport::Tcp => transport::TransportKind::Tcp,
            Transport::Unix => transport::TransportKind::Unix,
        }
    }

    fn address(&self) -> String {
        self.address
            .clone()
            .unwrap_or_else(|| self.kind().default_address().to_string())
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Tcp,
    Unix,
}

#[derive(Clone, Copy, ValueEnum)]
enum Remainder {
    /// The last worker takes every leftover row
    Last,
    /// The first workers take one leftover row each
    Earliest,
}

impl From<Remainder> for RemainderPolicy {
    fn from(value: Remainder) -> Self {
        match value {
            Remainder::Last => RemainderPolicy::LastAbsorbs,
            Remainder::Earliest => RemainderPolicy::EarliestFirst,
        }
    }
}

impl BoardArgs {
    /// Validate the run, then load or generate the initial board.
    ///
    /// A generated board is only allocated once its size has been validated;
    /// an imported one is validated against the size its header declares.
    fn prepare(&self, workers: usize, remainder: RemainderPolicy) -> Result<(Board, SimulationConfig)> {
        let config = SimulationConfig::default()
            .with_steps(self.steps)
            .with_workers(workers)
            .with_remainder(remainder);

        let (board, config) = match &self.input {
            Some(path) => {
                let board = pattern::import(path)
                    .with_context(|| format!("failed to import {}", path.display()))?;
                let config = config.with_size(board.width(), board.height());
                config.validate()?;
                (board, config)
            }
            None => {
                let config = config.with_size(self.width, self.height);
                config.validate()?;
                let mut board = Board::new(config.width, config.height)?;
                board.randomize(self.seed);
                (board, config)
            }
        };

        tracing::info!(
            width = config.width,
            height = config.height,
            live = board.live_count(),
            "initial board ready"
        );
        Ok((board, config))
    }

    fn finish(&self, board: &Board, stopwatch: Option<&Stopwatch>) -> Result<()> {
        tracing::info!(
            generation = board.generation(),
            live = board.live_count(),
            "final board"
        );
        if let Some(path) = &self.output {
            pattern::export(board, path)
                .with_context(|| format!("failed to export {}", path.display()))?;
        }
        if let (Some(path), Some(stopwatch)) = (&self.profile, stopwatch) {
            write_profile(stopwatch, path)?;
        }
        Ok(())
    }
}

fn write_profile(stopwatch: &Stopwatch, path: &Path) -> Result<()> {
    stopwatch
        .write_csv(path)
        .with_context(|| format!("failed to write profile {}", path.display()))?;
    tracing::info!(
        laps = stopwatch.laps().len(),
        total_ms = stopwatch.total_millis(),
        path = %path.display(),
        "profile written"
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Local { board: args } => {
            let (mut board, config) = args.prepare(1, RemainderPolicy::default())?;
            let mut stopwatch = Stopwatch::new();
            stopwatch.start();
            for _ in 0..config.steps {
                board.step();
                stopwatch.lap();
            }
            args.finish(&board, Some(&stopwatch))
        }
        Command::Server {
            board: args,
            clients,
            endpoint,
            remainder,
        } => {
            let (board, config) = args.prepare(clients, remainder.into())?;
            let mut server = BoardServer::new(board, config.server_config())?;

            let address = endpoint.address();
            let listener = transport::listen(endpoint.kind(), &address)
                .await
                .with_context(|| format!("failed to listen on {}", address))?;
            tracing::info!(address = %address, clients, "waiting for workers");

            server.serve(listener).await?;
            args.finish(server.board(), Some(server.stopwatch()))
        }
        Command::Client {
            endpoint,
            retries,
            backoff_ms,
        } => {
            let retry = RetryPolicy::default()
                .with_attempts(retries)
                .with_backoff(Duration::from_millis(backoff_ms));
            let address = endpoint.address();
            let connection = transport::connect(endpoint.kind(), &address, retry)
                .await
                .with_context(|| format!("failed to connect to {}", address))?;

            let mut client = LifeClient::new(connection);
            client.run().await?;
            Ok(())
        }
        Command::Collective {
            board: args,
            workers,
            remainder,
        } => {
            let (board, config) = args.prepare(workers, remainder.into())?;
            let (board, stopwatch) =
                lifewire::collective::run_profiled(board, config.workers, config.steps, config.remainder)
                    .await?;
            args.finish(&board, Some(&stopwatch))
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
