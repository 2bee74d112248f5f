//! End-to-end runs of both protocol families.
//!
//! Request/reply runs attach `tokio::io::duplex` streams straight to a
//! `ServerEndpoint`, so every byte still goes through framing, MsgPack and the
//! writer tasks. Results are always compared against stepping the same board
//! in a single process.

use lifewire::board::{pattern, Board, CellState};
use lifewire::client::WorkerState;
use lifewire::partition::RemainderPolicy;
use lifewire::server::{BoardServer, ServerConfig};
use lifewire::transport::{Connection, ServerEndpoint};
use lifewire::{LifeClient, LifeError};
use tokio::io::duplex;

fn stepped(board: &Board, steps: u64) -> Board {
    let mut expected = board.clone();
    for _ in 0..steps {
        expected.step();
    }
    expected
}

fn random_board(width: u32, height: u32, seed: u64) -> Board {
    let mut board = Board::new(width, height).unwrap();
    board.randomize(seed);
    board
}

/// Run a whole request/reply simulation over in-memory streams.
async fn run_request_reply(
    board: Board,
    workers: usize,
    steps: u64,
    policy: RemainderPolicy,
) -> BoardServer {
    let (endpoint, acceptor) = ServerEndpoint::new();
    let mut clients = Vec::new();
    for _ in 0..workers {
        let (worker_side, server_side) = duplex(64 * 1024);
        acceptor.attach(server_side).await.unwrap();
        clients.push(tokio::spawn(async move {
            let mut client = LifeClient::new(Connection::new(worker_side));
            client.run().await.map(|_| client.generation())
        }));
    }
    drop(acceptor);

    let config = ServerConfig::default()
        .with_workers(workers)
        .with_steps(steps)
        .with_remainder(policy);
    let mut server = BoardServer::new(board, config).unwrap();
    server.serve(endpoint).await.unwrap();

    for client in clients {
        assert_eq!(client.await.unwrap().unwrap(), steps);
    }
    server
}

#[tokio::test]
async fn test_single_worker_matches_local() {
    let board = random_board(12, 10, 5);
    let expected = stepped(&board, 3);

    let server = run_request_reply(board, 1, 3, RemainderPolicy::LastAbsorbs).await;
    assert_eq!(server.board().cells(), expected.cells());
    assert_eq!(server.generation(), 3);
    assert_eq!(server.stopwatch().laps().len(), 3);
}

#[tokio::test]
async fn test_three_workers_match_local() {
    let board = random_board(11, 10, 99);
    let expected = stepped(&board, 4);

    for policy in [RemainderPolicy::LastAbsorbs, RemainderPolicy::EarliestFirst] {
        let server = run_request_reply(board.clone(), 3, 4, policy).await;
        assert_eq!(server.board().cells(), expected.cells(), "{:?}", policy);
        assert!(server
            .workers()
            .iter()
            .all(|w| w.completed_generation == Some(3)));
    }
}

#[tokio::test]
async fn test_all_dead_board_stays_dead() {
    let board = Board::new(10, 10).unwrap();
    let server = run_request_reply(board, 1, 1, RemainderPolicy::LastAbsorbs).await;
    assert_eq!(server.board().live_count(), 0);
    assert!(server.is_done());
}

#[tokio::test]
async fn test_blinker_has_period_two() {
    let board = pattern::parse("x = 5, y = 5\n5b$\n2bo2b$\n2bo2b$\n2bo2b$\n5b!\n").unwrap();

    let server = run_request_reply(board.clone(), 2, 1, RemainderPolicy::LastAbsorbs).await;
    let flipped = server.into_board();
    assert!(flipped.get(1, 2).is_alive());
    assert!(flipped.get(2, 2).is_alive());
    assert!(flipped.get(3, 2).is_alive());
    assert!(!flipped.get(2, 1).is_alive());
    assert_eq!(flipped.live_count(), 3);

    let server = run_request_reply(board.clone(), 2, 2, RemainderPolicy::LastAbsorbs).await;
    assert_eq!(server.board().cells(), board.cells());
}

#[tokio::test]
async fn test_glider_wraps_across_workers() {
    let mut board = Board::new(8, 8).unwrap();
    for (x, y) in [(6, 5), (7, 6), (5, 7), (6, 7), (7, 7)] {
        board.set(x, y, CellState::Alive);
    }
    let expected = stepped(&board, 6);

    let server = run_request_reply(board, 4, 6, RemainderPolicy::LastAbsorbs).await;
    assert_eq!(server.board().cells(), expected.cells());
    assert_eq!(server.board().live_count(), 5);
}

#[tokio::test]
async fn test_excess_worker_is_rejected() {
    let (endpoint, acceptor) = ServerEndpoint::new();
    let (first_side, server_side) = duplex(64 * 1024);
    acceptor.attach(server_side).await.unwrap();
    let (extra_side, server_side) = duplex(64 * 1024);
    acceptor.attach(server_side).await.unwrap();
    drop(acceptor);

    let board = random_board(6, 6, 3);
    let expected = stepped(&board, 2);
    let config = ServerConfig::default().with_workers(1).with_steps(2);
    let mut server = BoardServer::new(board, config).unwrap();
    let serving = tokio::spawn(async move { server.serve(endpoint).await.map(|_| server) });

    let mut first = LifeClient::new(Connection::new(first_side));
    let assignment = first.start().await.unwrap();
    assert_eq!(assignment.worker_id, 0);

    let mut extra = LifeClient::new(Connection::new(extra_side));
    assert!(matches!(extra.start().await, Err(LifeError::Rejected(_))));
    assert_eq!(extra.state(), WorkerState::Unregistered);

    first.run().await.unwrap();
    assert_eq!(first.state(), WorkerState::Done);

    let server = serving.await.unwrap().unwrap();
    assert_eq!(server.workers().len(), 1);
    assert_eq!(server.board().cells(), expected.cells());
}

#[tokio::test]
async fn test_server_fails_when_workers_leave() {
    let (endpoint, acceptor) = ServerEndpoint::new();
    let (worker_side, server_side) = duplex(1024);
    acceptor.attach(server_side).await.unwrap();
    drop(acceptor);
    drop(worker_side);

    let config = ServerConfig::default().with_workers(1).with_steps(1);
    let mut server = BoardServer::new(Board::new(4, 4).unwrap(), config).unwrap();
    assert!(matches!(
        server.serve(endpoint).await,
        Err(LifeError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_collective_matches_request_reply() {
    let board = random_board(14, 9, 21);

    let server = run_request_reply(board.clone(), 3, 3, RemainderPolicy::EarliestFirst).await;
    let collective = lifewire::collective::run(board, 3, 3, RemainderPolicy::EarliestFirst)
        .await
        .unwrap();

    assert_eq!(collective.cells(), server.board().cells());
    assert_eq!(collective.generation(), 3);
}

#[tokio::test]
async fn test_collective_pattern_roundtrip() {
    let board = pattern::parse("#N glider\nx = 9, y = 7\nbo$2bo$3o!\n").unwrap();
    let expected = stepped(&board, 8);

    let result = lifewire::collective::run(board, 7, 8, RemainderPolicy::LastAbsorbs)
        .await
        .unwrap();
    assert_eq!(result.cells(), expected.cells());

    let reparsed = pattern::parse(&pattern::render(&result)).unwrap();
    assert_eq!(reparsed.cells(), result.cells());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unix_socket_run() {
    use lifewire::transport::{connect, listen, RetryPolicy, TransportKind};

    let path = socket_path("run");

    let board = random_board(8, 6, 17);
    let expected = stepped(&board, 2);

    let endpoint = listen(TransportKind::Unix, &path).await.unwrap();
    let config = ServerConfig::default().with_workers(2).with_steps(2);
    let mut server = BoardServer::new(board, config).unwrap();
    let serving = tokio::spawn(async move { server.serve(endpoint).await.map(|_| server) });

    let mut workers = Vec::new();
    for _ in 0..2 {
        let connection = connect(TransportKind::Unix, &path, RetryPolicy::none())
            .await
            .unwrap();
        workers.push(tokio::spawn(async move {
            LifeClient::new(connection).run().await
        }));
    }
    for worker in workers {
        worker.await.unwrap().unwrap();
    }

    let server = serving.await.unwrap().unwrap();
    assert_eq!(server.board().cells(), expected.cells());
}

#[cfg(unix)]
fn socket_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("lifewire-it-{}-{}.sock", name, std::process::id()))
        .to_string_lossy()
        .into_owned()
}

#[cfg(unix)]
#[tokio::test]
async fn test_serve_fails_when_registered_worker_leaves_listener() {
    use lifewire::transport::{connect, listen, RetryPolicy, TransportKind};
    use std::time::Duration;

    let path = socket_path("worker-left");
    let endpoint = listen(TransportKind::Unix, &path).await.unwrap();
    let config = ServerConfig::default().with_workers(2).with_steps(3);
    let mut server = BoardServer::new(random_board(6, 6, 8), config).unwrap();
    let serving = tokio::spawn(async move { server.serve(endpoint).await });

    let connection = connect(TransportKind::Unix, &path, RetryPolicy::none())
        .await
        .unwrap();
    let mut worker = LifeClient::new(connection);
    worker.start().await.unwrap();
    drop(worker);

    let result = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("serve kept waiting after its worker left")
        .unwrap();
    assert!(matches!(result, Err(LifeError::ConnectionClosed)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_serve_fails_when_last_connection_leaves_listener() {
    use lifewire::transport::{connect, listen, RetryPolicy, TransportKind};
    use std::time::Duration;

    let path = socket_path("last-left");
    let endpoint = listen(TransportKind::Unix, &path).await.unwrap();
    let config = ServerConfig::default().with_workers(1).with_steps(1);
    let mut server = BoardServer::new(Board::new(4, 4).unwrap(), config).unwrap();
    let serving = tokio::spawn(async move { server.serve(endpoint).await });

    let connection = connect(TransportKind::Unix, &path, RetryPolicy::none())
        .await
        .unwrap();
    drop(connection);

    let result = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("serve kept waiting after every connection closed")
        .unwrap();
    assert!(matches!(result, Err(LifeError::ConnectionClosed)));
}
