// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener, accept thread and hand-off of connections to the worker pool.

use super::connection::{serve_connection, ConnectionContext, IdleWatch};
use super::registry::HandlerRegistry;
use super::watchdog::Watchdog;
use crate::config::HttpServerConfig;
use crate::rt::WorkerPool;
use std::io::BufWriter;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct Shared {
    config: HttpServerConfig,
    registry: Arc<HandlerRegistry>,
    pool: WorkerPool,
    watchdog: Watchdog,
    shutdown: AtomicBool,
    accepted: AtomicU64,
    requests: AtomicU64,
}

/// Persistent HTTP server. Stops (closing live connections) on drop.
pub struct HttpServer {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl HttpServer {
    /// Bind, start the watchdog and the accept thread. Connections run on
    /// `pool`; shutting the pool down is left to its owner.
    pub fn start(
        config: HttpServerConfig,
        registry: Arc<HandlerRegistry>,
        pool: WorkerPool,
    ) -> crate::Result<Self> {
        config.validate()?;
        let listener = create_tcp_listener(config.socket_addr(), config.listen_backlog)?;
        let local_addr = listener.local_addr()?;
        let watchdog = Watchdog::start(config.request_timeout)?;

        let shared = Arc::new(Shared {
            config,
            registry,
            pool,
            watchdog,
            shutdown: AtomicBool::new(false),
            accepted: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let accept_thread = thread::Builder::new()
            .name("dpws-http-accept".into())
            .spawn(move || accept_loop(&listener, &thread_shared))?;

        log::info!("[http] listening on {}", local_addr);
        Ok(Self {
            shared,
            local_addr,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.shared.registry
    }

    /// Connections accepted so far.
    pub fn connections_accepted(&self) -> u64 {
        self.shared.accepted.load(Ordering::Relaxed)
    }

    /// Requests answered so far (counted when their connection ends).
    pub fn requests_served(&self) -> u64 {
        self.shared.requests.load(Ordering::Relaxed)
    }

    /// Stop accepting and close every live connection.
    pub fn stop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                log::error!("[http] accept thread panicked");
            }
            self.shared.watchdog.stop();
            log::info!("[http] stopped {}", self.local_addr);
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("local_addr", &self.local_addr)
            .field("accepted", &self.connections_accepted())
            .finish_non_exhaustive()
    }
}

fn create_tcp_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let listener: TcpListener = socket.into();
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn accept_loop(listener: &TcpListener, shared: &Arc<Shared>) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_nodelay(true);
                shared.accepted.fetch_add(1, Ordering::Relaxed);

                let conn_shared = Arc::clone(shared);
                if let Err(e) = shared
                    .pool
                    .submit(move || handle_connection(stream, peer, &conn_shared))
                {
                    log::warn!("[http] dropping connection from {}: {}", peer, e);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                log::debug!("[http] accept error: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn handle_connection(stream: TcpStream, peer: SocketAddr, shared: &Shared) {
    if shared.shutdown.load(Ordering::Acquire) {
        return;
    }
    log::debug!("[http] connection from {}", peer);

    let (reader, writer) = match (stream.try_clone(), stream.try_clone()) {
        (Ok(reader), Ok(writer)) => (reader, writer),
        (Err(e), _) | (_, Err(e)) => {
            log::warn!("[http] {}: cannot clone stream: {}", peer, e);
            return;
        }
    };
    let ctx = ConnectionContext {
        registry: &shared.registry,
        config: &shared.config,
        peer: Some(peer),
    };
    let watch = match shared.watchdog.watch(&stream) {
        Ok(watch) => Some(watch),
        Err(e) => {
            log::warn!("[http] {}: serving without idle watchdog: {}", peer, e);
            None
        }
    };
    let idle: &dyn IdleWatch = match &watch {
        Some(watch) => watch,
        None => &(),
    };

    let served = serve_connection(reader, BufWriter::new(writer), &ctx, idle);
    let _ = stream.shutdown(Shutdown::Both);
    shared.requests.fetch_add(served, Ordering::Relaxed);
    log::debug!("[http] {} closed after {} requests", peer, served);
}
