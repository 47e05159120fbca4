use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::time;
use tracing::{debug, info, trace};

use crate::service::{NetworkConfig, ShutdownCoordinator, ShutdownState};
use crate::{AppError, AppResult};

/// Which end of the connection this process is. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Server { port: u16 },
    Client { host: String, port: u16 },
}

fn new_socket(addr: &SocketAddr) -> AppResult<TcpSocket> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    };
    socket.map_err(|e| AppError::EndpointCreation(e.to_string()))
}

/// Every address `host` resolves to, in resolver order. Never empty.
async fn resolve_all(host: &str, port: u16) -> AppResult<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| AppError::AddressResolution(format!("{}:{}: {}", host, port, e)))?
        .collect();
    if addrs.is_empty() {
        return Err(AppError::AddressResolution(format!(
            "{}:{}: no address",
            host, port
        )));
    }
    Ok(addrs)
}

async fn resolve(host: &str, port: u16) -> AppResult<SocketAddr> {
    let addrs = resolve_all(host, port).await?;
    Ok(addrs[0])
}

/// Tries each address in turn and keeps the first connection that succeeds.
/// The error of the last attempt is returned when none does.
async fn connect_first(addrs: &[SocketAddr]) -> AppResult<TcpStream> {
    let mut last_error = AppError::Connect("no address to connect to".to_string());
    for addr in addrs {
        let socket = new_socket(addr)?;
        match socket.connect(*addr).await {
            Ok(stream) => {
                info!("connected to {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                debug!("could not connect to {}: {}", addr, e);
                last_error = AppError::Connect(format!("{}: {}", addr, e));
            }
        }
    }
    Err(last_error)
}

/// Produces the single connection a process works with.
#[derive(Debug, Clone)]
pub struct Establisher {
    network: NetworkConfig,
}

impl Establisher {
    pub fn new(network: NetworkConfig) -> Self {
        Establisher { network }
    }

    /// Listens and accepts (server) or connects (client).
    ///
    /// `Ok(None)` means a stop was requested before any peer connected.
    pub async fn establish(
        &self,
        role: &Role,
        shutdown: &ShutdownCoordinator,
    ) -> AppResult<Option<TcpStream>> {
        match role {
            Role::Server { port } => self.listen(*port).await?.accept_one(shutdown).await,
            Role::Client { host, port } => self.connect(host, *port).await.map(Some),
        }
    }

    /// Resolves the local bind address, binds and starts listening.
    pub async fn listen(&self, port: u16) -> AppResult<PendingListener> {
        let addr = resolve(&self.network.bind_ip, port).await?;
        let socket = new_socket(&addr)?;
        socket
            .bind(addr)
            .map_err(|e| AppError::Bind(format!("{}: {}", addr, e)))?;
        let listener = socket
            .listen(self.network.listen_backlog)
            .map_err(|e| AppError::Listen(format!("{}: {}", addr, e)))?;
        info!("listening on {}", addr);
        Ok(PendingListener {
            listener,
            poll_interval: Duration::from_millis(self.network.accept_poll_interval_ms),
        })
    }

    /// Resolves the remote host and connects to the first address that
    /// accepts. Each address is tried once.
    pub async fn connect(&self, host: &str, port: u16) -> AppResult<TcpStream> {
        let addrs = resolve_all(host, port).await?;
        connect_first(&addrs).await
    }
}

/// A listening endpoint waiting for its one peer.
#[derive(Debug)]
pub struct PendingListener {
    listener: TcpListener,
    poll_interval: Duration,
}

impl PendingListener {
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the first connection, re-checking the stop condition every
    /// poll interval.
    ///
    /// The listener is closed once a peer is accepted, so later connection
    /// attempts are refused by the operating system.
    pub async fn accept_one(self, shutdown: &ShutdownCoordinator) -> AppResult<Option<TcpStream>> {
        loop {
            if shutdown.state() != ShutdownState::Running {
                debug!("stop requested before any peer connected");
                return Ok(None);
            }
            match time::timeout(self.poll_interval, self.listener.accept()).await {
                Ok(Ok((socket, peer))) => {
                    info!("accepted connection from {}", peer);
                    return Ok(Some(socket));
                }
                Ok(Err(err)) => return Err(AppError::Accept(err.to_string())),
                Err(_) => trace!("no connection within {:?}", self.poll_interval),
            }
        }
    }
}
