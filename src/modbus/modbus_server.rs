// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-slave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server lifecycle
//!
//! [`ModbusSlaveServer`] owns the shared register store and the TCP listener.
//! It moves between two states:
//!
//! - **Stopped**: no listener; the store can still be configured
//! - **Running**: a listener accepts clients, each served by a
//!   [`ModbusRequestHandler`] bound to the same store
//!
//! At most `max_clients` connections are served at the same time. Stopping
//! the server closes the listener and ends every open client connection.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rust_modbus_slave::modbus::{ModbusSlaveServer, Point, RegisterStore, ValueType};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let server = ModbusSlaveServer::new(RegisterStore::shared());
//! server
//!     .store()
//!     .set_point(Point::new("temperature", 0, 2, ValueType::Float32))?;
//! let addr = server.start(5020).await?;
//! println!("Serving on {addr}");
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

use std::future::{self, Future};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_modbus::server::tcp::Server;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::error::{Result, SimulatorError};
use super::handler::ModbusRequestHandler;
use super::store::SharedRegisterStore;

/// Maximum number of concurrent client connections
pub const DEFAULT_MAX_CLIENTS: usize = 10;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Client socket that reports end-of-stream once the server is stopped.
///
/// The per-connection task of tokio-modbus exits on end-of-stream, which
/// drops the socket and the handler with its connection permit.
struct ClientStream {
    inner: TcpStream,
    shutdown: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ClientStream {
    fn new(inner: TcpStream, token: &CancellationToken) -> Self {
        Self {
            inner,
            shutdown: Box::pin(token.clone().cancelled_owned()),
        }
    }
}

impl AsyncRead for ClientStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.shutdown.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Build the service for a new client, or refuse it when every slot is taken
fn accept_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    store: &SharedRegisterStore,
    permits: &Arc<Semaphore>,
    shutdown: &CancellationToken,
) -> io::Result<Option<(ModbusRequestHandler, ClientStream)>> {
    let Ok(permit) = Arc::clone(permits).try_acquire_owned() else {
        warn!(
            "Rejecting modbus client {}: connection limit reached",
            peer_addr
        );
        return Ok(None);
    };
    debug!("Accepted modbus client {}", peer_addr);
    let handler = ModbusRequestHandler::with_permit(Arc::clone(store), permit);
    Ok(Some((handler, ClientStream::new(stream, shutdown))))
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Simulated Modbus TCP slave
pub struct ModbusSlaveServer {
    store: SharedRegisterStore,
    max_clients: usize,
    running: Mutex<Option<RunningServer>>,
}

impl ModbusSlaveServer {
    /// Create a stopped server around `store`
    pub fn new(store: SharedRegisterStore) -> Self {
        Self::with_max_clients(store, DEFAULT_MAX_CLIENTS)
    }

    pub fn with_max_clients(store: SharedRegisterStore, max_clients: usize) -> Self {
        Self {
            store,
            max_clients: max_clients.max(1),
            running: Mutex::new(None),
        }
    }

    /// The register store served by this server
    pub fn store(&self) -> &SharedRegisterStore {
        &self.store
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Start serving on `port` across all interfaces
    pub async fn start(&self, port: u16) -> Result<SocketAddr> {
        self.start_on(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
    }

    /// Start serving on an explicit socket address.
    ///
    /// Port 0 lets the OS pick a port; the bound address is returned.
    ///
    /// ### Errors
    ///
    /// * `AlreadyRunning` if a listener is active
    /// * `Io` if the listener cannot be bound
    pub async fn start_on(&self, socket_addr: SocketAddr) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        clear_finished(&mut running);
        if running.is_some() {
            warn!("Modbus server start requested while already running");
            return Err(SimulatorError::AlreadyRunning);
        }

        info!("Starting modbus server on {}", socket_addr);
        let listener = TcpListener::bind(socket_addr).await.map_err(|e| {
            error!("Failed to bind modbus server on {}: {}", socket_addr, e);
            SimulatorError::Io(e)
        })?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(self.max_clients));
        let store = Arc::clone(&self.store);
        let client_shutdown = shutdown.clone();

        let task = tokio::spawn(async move {
            let server = Server::new(listener);

            let on_connected = move |stream: TcpStream, peer_addr: SocketAddr| {
                future::ready(accept_client(
                    stream,
                    peer_addr,
                    &store,
                    &permits,
                    &client_shutdown,
                ))
            };

            let on_process_error = |err| {
                error!("Modbus server error: {err}");
            };

            if let Err(e) = server.serve(&on_connected, on_process_error).await {
                error!("Modbus server error: {}", e);
            }
        });

        *running = Some(RunningServer {
            local_addr,
            shutdown,
            task,
        });
        info!("Modbus server started on {}", local_addr);
        Ok(local_addr)
    }

    /// Stop the server and close every client connection.
    ///
    /// Does nothing if the server is not running.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            debug!("Modbus server stop requested while not running");
            return;
        };

        info!("Shutting down Modbus server on {}...", server.local_addr);
        server.shutdown.cancel();
        server.task.abort();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, server.task).await {
            Ok(_) => info!("Modbus server shut down successfully"),
            Err(_) => {
                warn!("Modbus server shutdown timed out, forcing termination");
            }
        }
    }

    /// Whether a listener is active.
    ///
    /// A serve task that ended on its own counts as stopped.
    pub async fn is_running(&self) -> bool {
        let mut running = self.running.lock().await;
        clear_finished(&mut running);
        running.is_some()
    }

    /// Address of the active listener
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut running = self.running.lock().await;
        clear_finished(&mut running);
        running.as_ref().map(|s| s.local_addr)
    }
}

/// Drop the state of a serve task that has already returned
fn clear_finished(running: &mut Option<RunningServer>) {
    if running.as_ref().is_some_and(|s| s.task.is_finished()) {
        if let Some(server) = running.take() {
            warn!(
                "Modbus server on {} is no longer serving, clearing its state",
                server.local_addr
            );
            server.shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::store::RegisterStore;

    fn localhost() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let server = ModbusSlaveServer::new(RegisterStore::shared());
        let addr = server.start_on(localhost()).await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.is_running().await);
        assert!(matches!(
            server.start_on(localhost()).await,
            Err(SimulatorError::AlreadyRunning)
        ));
        server.stop().await;
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let server = ModbusSlaveServer::new(RegisterStore::shared());
        server.stop().await;
        server.start_on(localhost()).await.unwrap();
        server.stop().await;
        server.stop().await;
        assert_eq!(server.local_addr().await, None);
    }

    #[tokio::test]
    async fn test_bind_failure_is_io_error() {
        let taken = TcpListener::bind(localhost()).await.unwrap();
        let addr = taken.local_addr().unwrap();
        let server = ModbusSlaveServer::new(RegisterStore::shared());
        assert!(matches!(
            server.start_on(addr).await,
            Err(SimulatorError::Io(_))
        ));
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let server = ModbusSlaveServer::with_max_clients(RegisterStore::shared(), 0);
        assert_eq!(server.max_clients(), 1);
        server.start_on(localhost()).await.unwrap();
        server.stop().await;
        assert!(server.start_on(localhost()).await.is_ok());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_finished_serve_task_is_not_running() {
        let server = ModbusSlaveServer::new(RegisterStore::shared());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(async {});
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        *server.running.lock().await = Some(RunningServer {
            local_addr: localhost(),
            shutdown: shutdown.clone(),
            task,
        });

        assert!(!server.is_running().await);
        assert_eq!(server.local_addr().await, None);
        assert!(shutdown.is_cancelled());

        let addr = server.start_on(localhost()).await.unwrap();
        assert_eq!(server.local_addr().await, Some(addr));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_start_replaces_finished_serve_task() {
        let server = ModbusSlaveServer::new(RegisterStore::shared());
        let task = tokio::spawn(async {});
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        *server.running.lock().await = Some(RunningServer {
            local_addr: localhost(),
            shutdown: CancellationToken::new(),
            task,
        });

        assert!(server.start_on(localhost()).await.is_ok());
        assert!(server.is_running().await);
        server.stop().await;
    }
}
