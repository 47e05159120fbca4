use std::sync::Arc;
use std::time::Duration;

use framecat::{
    AppError, AppResult, Establisher, NetworkConfig, ProtocolConfig, Role, Session,
    SessionCounters, SessionEnd, ShutdownCoordinator, ShutdownState,
};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time;

const WAIT: Duration = Duration::from_secs(5);

fn loopback() -> NetworkConfig {
    NetworkConfig {
        bind_ip: "127.0.0.1".to_string(),
        port: 0,
        listen_backlog: 1,
        accept_poll_interval_ms: 100,
    }
}

/// One side of the relay with in-memory stdio.
struct Endpoint {
    counters: Arc<SessionCounters>,
    coordinator: ShutdownCoordinator,
    input_tx: DuplexStream,
    output_rx: DuplexStream,
    diagnostics_rx: DuplexStream,
    task: JoinHandle<SessionEnd>,
}

fn start_session(stream: TcpStream, coordinator: ShutdownCoordinator) -> Endpoint {
    let counters = Arc::new(SessionCounters::new());
    let session = Session::new(
        Arc::clone(&counters),
        coordinator.clone(),
        &ProtocolConfig::default(),
    );
    let (input_tx, input) = duplex(4096);
    let (output, output_rx) = duplex(4096);
    let (diagnostics, diagnostics_rx) = duplex(4096);
    let (reader, writer) = stream.into_split();

    let task = tokio::spawn(async move {
        session
            .run(reader, writer, input, output, diagnostics)
            .await
    });
    Endpoint {
        counters,
        coordinator,
        input_tx,
        output_rx,
        diagnostics_rx,
        task,
    }
}

async fn connected_pair(establisher: &Establisher) -> AppResult<(TcpStream, TcpStream, u16)> {
    let listener = establisher.listen(0).await?;
    let port = listener.local_addr()?.port();
    let accept_shutdown = ShutdownCoordinator::new();
    let accepting = tokio::spawn(async move { listener.accept_one(&accept_shutdown).await });

    let role = Role::Client {
        host: "127.0.0.1".to_string(),
        port,
    };
    let client = establisher
        .establish(&role, &ShutdownCoordinator::new())
        .await?
        .expect("client connected");
    let server = accepting.await.unwrap()?.expect("server accepted");
    Ok((server, client, port))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ping_pong_then_client_hangs_up() -> AppResult<()> {
    let establisher = Establisher::new(loopback());
    let (server_stream, client_stream, _) = connected_pair(&establisher).await?;

    let mut server = start_session(server_stream, ShutdownCoordinator::new());
    let mut client = start_session(client_stream, ShutdownCoordinator::new());

    client.input_tx.write_all(b"ping").await?;
    let mut relayed = [0u8; 4];
    time::timeout(WAIT, server.output_rx.read_exact(&mut relayed))
        .await
        .expect("ping not relayed")?;
    assert_eq!(&relayed, b"ping");

    server.input_tx.write_all(b"pong").await?;
    time::timeout(WAIT, client.output_rx.read_exact(&mut relayed))
        .await
        .expect("pong not relayed")?;
    assert_eq!(&relayed, b"pong");

    // the client runs out of input and closes the connection; the server is
    // still waiting on its own input and must be woken by the peer loss
    drop(client.input_tx);
    let client_end = time::timeout(WAIT, client.task).await.unwrap().unwrap();
    assert_eq!(client_end, SessionEnd::InputExhausted);

    let server_end = time::timeout(WAIT, server.task).await.unwrap().unwrap();
    assert_eq!(server_end, SessionEnd::PeerLost);
    assert_eq!(server.coordinator.state(), ShutdownState::PeerLost);

    assert_eq!(server.counters.bytes_received(), 4);
    assert_eq!(server.counters.bytes_sent(), 4);
    assert_eq!(client.counters.bytes_received(), 4);
    assert_eq!(client.counters.bytes_sent(), 4);

    // losing the peer prints nothing
    let mut diagnostics = String::new();
    server
        .diagnostics_rx
        .read_to_string(&mut diagnostics)
        .await?;
    assert!(diagnostics.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_operator_stop_ends_both_sides() -> AppResult<()> {
    let establisher = Establisher::new(loopback());
    let (server_stream, client_stream, _) = connected_pair(&establisher).await?;

    let server = start_session(server_stream, ShutdownCoordinator::new());
    let client = start_session(client_stream, ShutdownCoordinator::new());

    server.coordinator.request_stop();
    let server_end = time::timeout(WAIT, server.task).await.unwrap().unwrap();
    assert_eq!(server_end, SessionEnd::StopRequested);

    let client_end = time::timeout(WAIT, client.task).await.unwrap().unwrap();
    assert_eq!(client_end, SessionEnd::PeerLost);
    Ok(())
}

#[tokio::test]
async fn test_only_the_first_connection_is_accepted() -> AppResult<()> {
    let establisher = Establisher::new(loopback());
    let (_server, _client, port) = connected_pair(&establisher).await?;

    let second = establisher.connect("127.0.0.1", port).await;
    assert!(matches!(second, Err(AppError::Connect(_))));
    Ok(())
}
