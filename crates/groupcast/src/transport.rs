// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast transport: one UDP socket plus the transform pipeline.
//!
//! Owns the socket exclusively and runs every outbound and inbound datagram
//! through the registered transform chains:
//!
//! ```text
//! send:    Payload -> outbound chain -> send_to(group:port)
//! receive: recv_from() -> inbound chain -> handler(payload, source)
//! ```
//!
//! A dedicated receive thread blocks on the socket (with a short timeout so
//! shutdown stays responsive) and dispatches through the inbound chain. A
//! stage failure drops the datagram and reports the error to the handler;
//! a partially decoded payload is never delivered upward.

use crate::config::Config;
use crate::error::{Error, Result, TransformError};
use crate::payload::Payload;
use crate::pipeline::{Pipeline, Transform};
use parking_lot::{Mutex, RwLock};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Maximum UDP datagram payload we accept (IPv4 limit minus headers).
const MAX_DATAGRAM_LEN: usize = 65_507;

/// Receive timeout so the rx thread can observe the shutdown flag.
const RX_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Backoff after an unexpected socket error (avoids a hot error loop).
const RX_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Outcome of inbound dispatch, delivered to the transport handler.
#[derive(Debug)]
pub enum RxEvent {
    /// The inbound chain succeeded; the decoded payload and sender address.
    Payload(Payload, SocketAddr),
    /// An inbound stage failed; the datagram was dropped.
    Error(TransformError, SocketAddr),
}

/// Callback invoked on the receive thread for every inbound datagram.
pub type RxHandler = Arc<dyn Fn(RxEvent) + Send + Sync>;

/// Socket state held while bound.
struct Bound {
    socket: Arc<UdpSocket>,
    /// Resolved port (differs from the configured port when `0` was requested).
    port: u16,
    running: Arc<AtomicBool>,
    rx_handle: Option<JoinHandle<()>>,
}

/// Multicast transport owning one UDP socket and the transform pipeline.
pub struct Transport {
    group: Ipv4Addr,
    bind_addr: Ipv4Addr,
    port: u16,
    ttl: u32,
    loopback: bool,
    pipeline: Arc<RwLock<Pipeline>>,
    bound: Mutex<Option<Bound>>,
}

impl Transport {
    /// Create an unbound transport from the multicast-relevant config fields.
    pub fn new(config: &Config) -> Self {
        Self {
            group: config.group,
            bind_addr: config.bind_addr,
            port: config.port,
            ttl: config.ttl,
            loopback: config.loopback,
            pipeline: Arc::new(RwLock::new(Pipeline::new())),
            bound: Mutex::new(None),
        }
    }

    /// Register a transform.
    ///
    /// Appends to the outbound chain and prepends to the inbound chain; see
    /// [`Pipeline::register`] for the validation rules.
    pub fn register_transform(&self, transform: Transform) -> Result<()> {
        self.pipeline.write().register(transform)
    }

    /// Bind the socket, join the multicast group, and start receiving.
    ///
    /// On success the resolved port is returned (meaningful when an ephemeral
    /// port was requested). On failure no partial configuration remains: the
    /// socket is dropped and the transport stays unbound.
    ///
    /// # Errors
    ///
    /// `Error::Bind` on socket setup or group join failure, and when the
    /// transport is already bound.
    pub fn bind(&self, handler: RxHandler) -> Result<u16> {
        let mut bound = self.bound.lock();
        if bound.is_some() {
            return Err(Error::Bind("transport already bound".to_string()));
        }

        let socket = self
            .open_socket()
            .map_err(|err| Error::Bind(err.to_string()))?;
        let port = socket
            .local_addr()
            .map_err(|err| Error::Bind(err.to_string()))?
            .port();

        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));
        let rx_handle = {
            let socket = Arc::clone(&socket);
            let running = Arc::clone(&running);
            let pipeline = Arc::clone(&self.pipeline);
            thread::Builder::new()
                .name("groupcast-rx".to_string())
                .spawn(move || rx_loop(&socket, &pipeline, &handler, &running))
                .map_err(|err| Error::Bind(err.to_string()))?
        };

        log::info!(
            "[transport] bound {}:{} group={} ttl={} loopback={}",
            self.bind_addr,
            port,
            self.group,
            self.ttl,
            self.loopback
        );

        *bound = Some(Bound {
            socket,
            port,
            running,
            rx_handle: Some(rx_handle),
        });
        Ok(port)
    }

    /// Create and configure the multicast socket.
    fn open_socket(&self) -> io::Result<UdpSocket> {
        // SO_REUSEADDR so several nodes on one host can share the group port.
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddr::from((self.bind_addr, self.port));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        socket.set_multicast_ttl_v4(self.ttl)?;
        socket.set_multicast_loop_v4(self.loopback)?;
        socket.join_multicast_v4(&self.group, &self.bind_addr)?;
        socket.set_read_timeout(Some(RX_POLL_INTERVAL))?;
        Ok(socket)
    }

    /// Run the outbound chain and write the result to the multicast group.
    ///
    /// Ordering guarantee: transform-then-write. A stage failure
    /// short-circuits before any socket access and is returned as
    /// `Error::Transform`; a socket failure after a successful chain is
    /// `Error::Write`. A structured value left at the chain tail is
    /// JSON-encoded for the wire. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `Error::NotUp` when the transport is not bound.
    pub fn send(&self, payload: Payload) -> Result<usize> {
        let wired = self
            .pipeline
            .read()
            .run_outbound(payload)
            .map_err(Error::Transform)?;
        // A structured value reaching the socket tail is written as JSON.
        let bytes = match wired {
            Payload::Bytes(bytes) => bytes,
            Payload::Value(value) => serde_json::to_vec(&value).map_err(|err| {
                Error::Transform(TransformError::Serialization(err.to_string()))
            })?,
        };

        let bound = self.bound.lock();
        let Some(bound) = bound.as_ref() else {
            return Err(Error::NotUp);
        };
        let dest = SocketAddr::from((self.group, bound.port));
        let sent = bound
            .socket
            .send_to(&bytes, dest)
            .map_err(|err| Error::Write(err.to_string()))?;
        log::debug!("[transport] sent {} bytes to {}", sent, dest);
        Ok(sent)
    }

    /// Stop the receive thread, leave the group, and release the socket.
    ///
    /// Safe to call when not bound (no-op).
    pub fn close(&self) {
        let mut bound = self.bound.lock();
        if let Some(mut state) = bound.take() {
            state.running.store(false, Ordering::Relaxed);
            if let Some(handle) = state.rx_handle.take() {
                let _ = handle.join();
            }
            let _ = state.socket.leave_multicast_v4(&self.group, &self.bind_addr);
            log::info!("[transport] closed (left group {})", self.group);
        }
    }

    /// Resolved local port while bound.
    pub fn local_port(&self) -> Option<u16> {
        self.bound.lock().as_ref().map(|state| state.port)
    }

    /// Configured multicast group.
    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    /// True while the socket is bound.
    pub fn is_bound(&self) -> bool {
        self.bound.lock().is_some()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receive loop: recv, run the inbound chain, dispatch to the handler.
fn rx_loop(
    socket: &UdpSocket,
    pipeline: &RwLock<Pipeline>,
    handler: &RxHandler,
    running: &AtomicBool,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                let inbound = pipeline
                    .read()
                    .run_inbound(Payload::Bytes(buf[..len].to_vec()), source);
                match inbound {
                    Ok(payload) => handler(RxEvent::Payload(payload, source)),
                    Err(err) => {
                        log::debug!(
                            "[transport] dropped {}-byte datagram from {}: {}",
                            len,
                            source,
                            err
                        );
                        handler(RxEvent::Error(err, source));
                    }
                }
            }
            Err(err)
                if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                // Receive timeout; re-check the shutdown flag.
            }
            Err(err) => {
                if running.load(Ordering::Relaxed) {
                    log::warn!("[transport] recv error: {}", err);
                    thread::sleep(RX_ERROR_BACKOFF);
                }
            }
        }
    }
}
