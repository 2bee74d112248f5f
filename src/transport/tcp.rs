//! TCP listener and connector.

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::{Acceptor, Connection, RetryPolicy};
use crate::error::Result;

/// Bind `address` and attach every accepted connection to `acceptor`.
///
/// Binding happens before this returns, so a worker started right after
/// will not see `ConnectionRefused`.
pub async fn listen_tcp(address: &str, acceptor: Acceptor) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening on tcp");
    Ok(tokio::spawn(accept_loop(listener, acceptor)))
}

async fn accept_loop(listener: TcpListener, acceptor: Acceptor) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%remote, error = %e, "set_nodelay failed");
                }
                match acceptor.attach(stream).await {
                    Ok(peer) => tracing::info!(%peer, %remote, "worker connected"),
                    Err(_) => return,
                }
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
}

/// Connect to a coordinator over TCP, retrying while it is not listening.
pub async fn connect_tcp(address: &str, retry: RetryPolicy) -> Result<Connection> {
    let stream = retry.run(|| TcpStream::connect(address)).await?;
    stream.set_nodelay(true)?;
    tracing::info!(%address, "connected to coordinator");
    Ok(Connection::new(stream))
}
