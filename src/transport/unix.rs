//! Unix domain socket listener and connector.
//!
//! The socket file is removed before binding (a coordinator killed mid-run
//! leaves one behind) and again when the listener is dropped.

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use super::{Acceptor, Connection, RetryPolicy};
use crate::error::Result;

/// Unix domain socket listener that owns its socket file.
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixSocketListener {
    /// Bind to a socket path, replacing a stale socket file.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Bind `path` and attach every accepted connection to `acceptor`.
pub async fn listen_unix(path: &str, acceptor: Acceptor) -> Result<JoinHandle<()>> {
    let listener = UnixSocketListener::bind(path)?;
    tracing::info!(path = %listener.path().display(), "listening on unix socket");
    Ok(tokio::spawn(accept_loop(listener, acceptor)))
}

async fn accept_loop(listener: UnixSocketListener, acceptor: Acceptor) {
    loop {
        match listener.accept().await {
            Ok(stream) => match acceptor.attach(stream).await {
                Ok(peer) => tracing::info!(%peer, "worker connected"),
                Err(_) => return,
            },
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
}

/// Connect over a Unix socket, retrying while the socket file is missing
/// or nobody is listening on it.
pub async fn connect_unix(path: &str, retry: RetryPolicy) -> Result<Connection> {
    let stream = retry.run(|| UnixStream::connect(path)).await?;
    tracing::info!(%path, "connected to coordinator");
    Ok(Connection::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Envelope, Message};
    use crate::transport::ServerEndpoint;

    fn temp_socket_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("lifewire-{}-{}.sock", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_file() {
        let path = temp_socket_path("stale");
        std::fs::write(&path, b"left over").unwrap();

        let listener = UnixSocketListener::bind(&path).unwrap();
        assert!(Path::new(&path).exists());

        drop(listener);
        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn test_unix_roundtrip() {
        let path = temp_socket_path("roundtrip");
        let (mut endpoint, acceptor) = ServerEndpoint::new();
        endpoint.set_accept_task(listen_unix(&path, acceptor).await.unwrap());

        let mut connection = connect_unix(&path, RetryPolicy::none()).await.unwrap();
        connection
            .send(&Envelope::new(3, Message::RegisterRequest))
            .await
            .unwrap();

        let (_, envelope) = endpoint.recv().await.unwrap();
        assert_eq!(envelope.sequence, 3);
    }

    #[tokio::test]
    async fn test_connect_missing_socket_without_retry() {
        let path = temp_socket_path("missing");
        assert!(connect_unix(&path, RetryPolicy::none()).await.is_err());
    }
}
