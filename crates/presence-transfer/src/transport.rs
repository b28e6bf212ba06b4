//! UDP broadcast transport for mesh observations
//!
//! Provides a thin wrapper around tokio's UdpSocket with:
//! - Broadcast-capable sockets with configurable buffer sizes
//! - Best-effort send of one observation per datagram
//! - A receive loop that can be cancelled while blocked in `recv_from`

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use presence_fusion::{AccessPoint, Device};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::wire::{self, MAX_DATAGRAM_LEN, MIN_DATAGRAM_LEN};

/// Well-known mesh port.
pub const DEFAULT_MESH_PORT: u16 = 7779;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address the receive loop binds to
    pub bind: SocketAddr,
    /// Destination for outgoing broadcasts
    pub broadcast: SocketAddr,
    /// Send buffer size in bytes
    pub sndbuf: usize,
    /// Receive buffer size in bytes
    pub rcvbuf: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::for_port(DEFAULT_MESH_PORT)
    }
}

impl TransportConfig {
    /// Listen on all interfaces and broadcast to the local segment on `port`.
    pub fn for_port(port: u16) -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            broadcast: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port),
            sndbuf: 256 * 1024,
            rcvbuf: 256 * 1024,
        }
    }
}

/// Longest pause between retries after repeated receive errors.
const MAX_RECV_BACKOFF: Duration = Duration::from_millis(640);

/// Pause before the next `recv_from` after `failures` consecutive errors.
fn recv_backoff(failures: u32) -> Duration {
    Duration::from_millis(10)
        .saturating_mul(1 << failures.min(6))
        .min(MAX_RECV_BACKOFF)
}

/// Handler for decoded observations, called on the receive task.
pub type Handler = Box<dyn Fn(AccessPoint, Device) + Send + Sync>;

/// Create a broadcast-capable UDP socket bound to `addr`.
fn bind_socket(addr: SocketAddr, sndbuf: usize, rcvbuf: usize) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    // Set buffer sizes before binding
    socket.set_send_buffer_size(sndbuf)?;
    socket.set_recv_buffer_size(rcvbuf)?;

    // Several mesh processes may share one host during testing
    socket.set_reuse_address(true)?;
    if addr.is_ipv4() {
        socket.set_broadcast(true)?;
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Mesh transport: broadcasts local observations and listens for peers'.
pub struct MeshTransport {
    config: TransportConfig,
    /// Ephemeral socket for outgoing broadcasts, created on first send.
    send_socket: OnceCell<Arc<UdpSocket>>,
}

impl MeshTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            send_socket: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn send_socket(&self) -> Result<Arc<UdpSocket>> {
        let socket = self
            .send_socket
            .get_or_try_init(|| async {
                let ip = match self.config.broadcast {
                    SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                };
                let addr = SocketAddr::new(ip, 0);
                bind_socket(addr, self.config.sndbuf, self.config.rcvbuf)
                    .map(Arc::new)
                    .map_err(|source| Error::Bind { addr, source })
            })
            .await?;
        Ok(Arc::clone(socket))
    }

    /// Broadcast one observation to every node on the segment.
    ///
    /// Best effort: a short write is logged and reported through the
    /// returned byte count, never retried.
    pub async fn broadcast(&self, access_point: &AccessPoint, device: &Device) -> Result<usize> {
        let payload = wire::encode(access_point, device)?;
        let socket = self.send_socket().await?;

        let sent = socket.send_to(&payload, self.config.broadcast).await?;
        if sent < payload.len() {
            warn!(
                "Incomplete message sent to {} - {} of {} bytes",
                self.config.broadcast,
                sent,
                payload.len()
            );
        } else {
            debug!("Broadcast {} '{}' ({} bytes)", device.mac, device.name, sent);
        }
        Ok(sent)
    }

    /// Bind the receive socket and spawn the receive loop.
    ///
    /// Every call gets a fresh cancellation token, so a stopped transport can
    /// be started again. Bind failures are returned to the caller.
    ///
    /// The loop runs as a dedicated tokio task rather than an OS thread, and
    /// `handler` is called inline on it for each message in arrival order.
    /// Handlers may take short blocking locks but must not block for long,
    /// since that stalls a runtime worker.
    pub async fn start<F>(&self, handler: F) -> Result<MeshListener>
    where
        F: Fn(AccessPoint, Device) + Send + Sync + 'static,
    {
        let addr = self.config.bind;
        let socket = bind_socket(addr, self.config.sndbuf, self.config.rcvbuf)
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(receive_loop(socket, Box::new(handler), cancel.clone()));

        info!("Starting mesh listener on {}", local_addr);

        Ok(MeshListener {
            cancel,
            task: Some(task),
            local_addr,
        })
    }
}

/// Receive datagrams until cancelled.
async fn receive_loop(socket: UdpSocket, handler: Handler, cancel: CancellationToken) {
    let mut buf = [0u8; MAX_DATAGRAM_LEN];
    let mut failures = 0u32;

    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => result,
        };

        let (len, src) = match received {
            Ok(r) => {
                failures = 0;
                r
            }
            Err(e) => {
                let pause = recv_backoff(failures);
                failures = failures.saturating_add(1);
                warn!("Mesh recv error ({} in a row), retrying in {:?}: {}", failures, pause, e);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => continue,
                }
            }
        };

        if len < MIN_DATAGRAM_LEN {
            debug!("Received {} bytes from {} < {}, not a device message", len, src, MIN_DATAGRAM_LEN);
            continue;
        }

        match wire::decode(&buf[..len]) {
            Ok((access_point, device)) => handler(access_point, device),
            Err(e) => warn!("Discarding datagram from {} ({} bytes): {}", src, len, e),
        }
    }

    info!("Mesh listener finished");
}

/// Handle to a running receive loop.
///
/// Dropping the handle cancels the loop.
pub struct MeshListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl MeshListener {
    /// Signal the receive loop to exit. Safe to call repeatedly.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping mesh listener on {}", self.local_addr);
        }
        self.cancel.cancel();
    }

    /// Token that stops this listener, for use from other threads.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the receive loop has exited and released its socket.
    pub fn is_stopped(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Address the receive socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop();
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| Error::Join(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for MeshListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
