//! TCP Server
//!
//! Binds the listener, spawns the worker pool, and runs the accept loop.
//!
//! ## Shutdown
//! The listener is non-blocking so the loop can poll the shared shutdown
//! flag (raised by the signal handler in the binary). Once raised, the loop
//! stops accepting and the pool is shut down cooperatively.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CineError, Result};
use crate::worker::WorkerPool;

/// TCP server for CineVault.
pub struct Server {
    config: Config,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Validate the config and bind the listener.
    ///
    /// Binding up front (rather than inside [`run`](Server::run)) lets
    /// callers learn the bound address before serving — port 0 picks a free
    /// port.
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).map_err(|err| {
            CineError::Network(format!("failed to bind port {}: {err}", config.port))
        })?;
        listener.set_nonblocking(true)?;
        Ok(Server {
            config,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The flag that stops the accept loop; hand a clone to the signal
    /// handler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The bound listener address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Serve until the shutdown flag is raised. Blocking.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!(addr = ?self.local_addr(), "server listening");
        let mut pool = WorkerPool::start(&self.config)?;
        self.accept_loop(&mut pool);
        pool.shutdown();
        tracing::info!("server stopped");
        Ok(())
    }

    fn accept_loop(&self, pool: &mut WorkerPool) {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted connection");
                    let timeout = Some(self.config.client_timeout);
                    if let Err(err) = stream
                        .set_read_timeout(timeout)
                        .and_then(|()| stream.set_write_timeout(timeout))
                    {
                        tracing::warn!(%addr, error = %err, "failed to set client timeouts");
                    }
                    if !pool.add_work(stream, self.config.max_enqueue_retries, &self.shutdown) {
                        tracing::warn!(%addr, "no worker available, connection dropped");
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    // nothing pending; nap briefly and re-check shutdown
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => {
                    if !self.shutdown.load(Ordering::Relaxed) {
                        tracing::error!(error = %err, "accept failed");
                    }
                }
            }
        }
    }
}
