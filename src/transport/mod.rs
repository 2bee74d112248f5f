//! Transport module - request/reply plumbing over byte streams.
//!
//! - [`ServerEndpoint`] - coordinator side: one inbox of decoded envelopes from
//!   every connection, one writer task per connection
//! - [`Connection`] - worker side: sequential request/reply over one stream
//! - TCP and Unix domain socket listeners/connectors
//!
//! Anything that is `AsyncRead + AsyncWrite` can be attached, which is how the
//! tests run whole simulations over `tokio::io::duplex`.

mod connection;
mod endpoint;
mod tcp;
#[cfg(unix)]
mod unix;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{LifeError, Result};

pub use connection::Connection;
pub use endpoint::{Acceptor, EndpointEvent, ServerEndpoint};
pub use tcp::{connect_tcp, listen_tcp};
#[cfg(unix)]
pub use unix::{connect_unix, listen_unix, UnixSocketListener};

/// Default TCP address.
pub const DEFAULT_TCP_ADDRESS: &str = "127.0.0.1:7654";

/// Default Unix socket path.
pub const DEFAULT_UNIX_PATH: &str = "/tmp/lifewire.sock";

/// Byte stream usable as a connection.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Which socket family to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Tcp,
    Unix,
}

impl TransportKind {
    /// Default address for this transport.
    pub fn default_address(self) -> &'static str {
        match self {
            TransportKind::Tcp => DEFAULT_TCP_ADDRESS,
            TransportKind::Unix => DEFAULT_UNIX_PATH,
        }
    }
}

/// Server-assigned connection id. Not the worker id: a connection only gets
/// a worker id once it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Bounded wait-and-retry for a coordinator that is not listening yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts, including the first.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `connect` until it succeeds, fails with a non-retryable error, or
    /// attempts run out.
    pub async fn run<T, F, Fut>(&self, mut connect: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match connect().await {
                Ok(value) => return Ok(value),
                Err(e) if is_not_listening(&e) && attempt < attempts => {
                    tracing::info!(
                        attempt,
                        attempts,
                        error = %e,
                        "coordinator not reachable yet, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(LifeError::Io(e)),
            }
        }
    }
}

/// A coordinator that has not started yet looks like one of these.
fn is_not_listening(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound
    )
}

/// Connect to a coordinator with the given transport.
pub async fn connect(kind: TransportKind, address: &str, retry: RetryPolicy) -> Result<Connection> {
    match kind {
        TransportKind::Tcp => connect_tcp(address, retry).await,
        #[cfg(unix)]
        TransportKind::Unix => connect_unix(address, retry).await,
        #[cfg(not(unix))]
        TransportKind::Unix => Err(LifeError::Config(
            "Unix domain sockets are not available on this platform".to_string(),
        )),
    }
}

/// Bind a listener and feed accepted connections into a new endpoint.
pub async fn listen(kind: TransportKind, address: &str) -> Result<ServerEndpoint> {
    let (mut endpoint, acceptor) = ServerEndpoint::new();
    let accept_task = match kind {
        TransportKind::Tcp => listen_tcp(address, acceptor).await?,
        #[cfg(unix)]
        TransportKind::Unix => listen_unix(address, acceptor).await?,
        #[cfg(not(unix))]
        TransportKind::Unix => {
            return Err(LifeError::Config(
                "Unix domain sockets are not available on this platform".to_string(),
            ))
        }
    };
    endpoint.set_accept_task(accept_task);
    Ok(endpoint)
}
