// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The node: ties transport, registry, and heartbeat timer together.
//!
//! Lifecycle:
//!
//! ```text
//! up()   -> bind socket, start rx dispatch, start heartbeat thread
//! send() -> wrap value in an envelope, run the outbound chain, write
//! down() -> stop heartbeat, announce departure, close socket, forget peers
//! ```
//!
//! The heartbeat thread does double duty: it broadcasts our own presence
//! (when exposed) and scans the registry for silent peers. Eviction runs on
//! every tick even for a non-exposed node, so timeouts fire without any
//! inbound traffic.

use crate::config::{generate_node_id, Config};
use crate::envelope::Envelope;
use crate::error::{Error, Result, TransformError};
use crate::events::Event;
use crate::payload::Payload;
use crate::pipeline::Transform;
use crate::registry::{PeerRecord, PeerRegistry};
use crate::transport::{RxEvent, RxHandler, Transport};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sleep granularity of the heartbeat thread; bounds shutdown latency.
const TICK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Running heartbeat thread, joined on stop.
struct Heartbeat {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A discovery node: announces itself and tracks its peers.
///
/// # Example
///
/// ```no_run
/// use groupcast::{Config, Event, Node};
/// use serde_json::json;
///
/// # fn main() -> groupcast::Result<()> {
/// let node = Node::new(Config::new().node_id("sensor-12"))?;
/// node.up()?;
/// node.send(json!({"reading": 21.5}))?;
/// for event in node.events().iter() {
///     if let Event::Up(peer) = event {
///         println!("discovered {}", peer.id);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Node {
    id: String,
    config: Config,
    transport: Arc<Transport>,
    registry: Arc<Mutex<PeerRegistry>>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    /// Present exactly while the node is up.
    heartbeat: Mutex<Option<Heartbeat>>,
}

impl Node {
    /// Create a node from a validated configuration.
    ///
    /// # Errors
    ///
    /// `Error::Config` when [`Config::validate`] rejects the configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let id = config
            .node_id
            .clone()
            .unwrap_or_else(generate_node_id);
        let transport = Arc::new(Transport::new(&config));
        let (events_tx, events_rx) = channel::unbounded();
        Ok(Self {
            registry: Arc::new(Mutex::new(PeerRegistry::new(id.clone()))),
            id,
            config,
            transport,
            events_tx,
            events_rx,
            heartbeat: Mutex::new(None),
        })
    }

    /// This node's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register a transform on the wire pipeline.
    ///
    /// Must happen before [`Node::up`]; the chains apply to every envelope
    /// from then on. See [`crate::pipeline::Pipeline::register`].
    pub fn register_transform(&self, transform: Transform) -> Result<()> {
        if self.heartbeat.lock().is_some() {
            return Err(Error::Config(
                "transforms must be registered before up()".to_string(),
            ));
        }
        self.transport.register_transform(transform)
    }

    /// Receiver side of the event stream. Cheap to clone, shared cursor.
    pub fn events(&self) -> Receiver<Event> {
        self.events_rx.clone()
    }

    /// Snapshot of the currently known peers.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.registry.lock().snapshot()
    }

    /// True while the node is up.
    pub fn is_up(&self) -> bool {
        self.heartbeat.lock().is_some()
    }

    /// Resolved UDP port while up.
    pub fn local_port(&self) -> Option<u16> {
        self.transport.local_port()
    }

    /// Join the group and start announcing.
    ///
    /// Binds the socket, starts inbound dispatch, and spawns the heartbeat
    /// thread. The first heartbeat goes out immediately.
    ///
    /// # Errors
    ///
    /// `Error::AlreadyUp` when called twice without [`Node::down`];
    /// `Error::Bind` when the socket cannot be set up.
    pub fn up(&self) -> Result<()> {
        let mut heartbeat = self.heartbeat.lock();
        if heartbeat.is_some() {
            return Err(Error::AlreadyUp);
        }

        let port = self.transport.bind(self.rx_handler())?;
        log::info!(
            "[node] {} up on {}:{}",
            self.id,
            self.transport.group(),
            port
        );

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = Arc::clone(&running);
            let transport = Arc::clone(&self.transport);
            let registry = Arc::clone(&self.registry);
            let events_tx = self.events_tx.clone();
            let id = self.id.clone();
            let meta = self.config.meta.clone();
            let expose = self.config.expose;
            let interval = self.config.heartbeat_interval;
            let timeout = self.config.timeout;
            thread::Builder::new()
                .name("groupcast-heartbeat".to_string())
                .spawn(move || {
                    heartbeat_loop(
                        &transport, &registry, &events_tx, &running, &id, meta.as_ref(), expose,
                        interval, timeout,
                    );
                })
                .map_err(|err| {
                    self.transport.close();
                    Error::Bind(err.to_string())
                })?
        };

        *heartbeat = Some(Heartbeat {
            running,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Leave the group.
    ///
    /// Stops the heartbeat, announces departure with a final `suicide`
    /// envelope (best effort), closes the socket, and forgets all peers.
    /// Remote nodes that miss the departure envelope still time us out.
    ///
    /// # Errors
    ///
    /// `Error::NotUp` when the node is not up.
    pub fn down(&self) -> Result<()> {
        let mut guard = self.heartbeat.lock();
        let Some(mut heartbeat) = guard.take() else {
            return Err(Error::NotUp);
        };
        heartbeat.stop();

        match Envelope::departure(&self.id).into_payload() {
            Ok(payload) => {
                if let Err(err) = self.transport.send(payload) {
                    log::warn!("[node] {} departure announce failed: {}", self.id, err);
                }
            }
            Err(err) => log::warn!("[node] {} departure encode failed: {}", self.id, err),
        }

        self.transport.close();
        self.registry.lock().clear();
        log::info!("[node] {} down", self.id);
        Ok(())
    }

    /// Broadcast an application message to the group.
    ///
    /// The value rides in a regular envelope, so it also refreshes our
    /// liveness on every receiver.
    ///
    /// # Errors
    ///
    /// `Error::NotUp` when the node is not up; `Error::Transform` when a
    /// stage rejects the envelope; `Error::Write` on socket failure.
    pub fn send(&self, value: Value) -> Result<()> {
        if self.heartbeat.lock().is_none() {
            return Err(Error::NotUp);
        }
        let payload = Envelope::message(&self.id, value).into_payload()?;
        self.transport.send(payload)?;
        Ok(())
    }

    /// Build the inbound dispatch closure run on the rx thread.
    fn rx_handler(&self) -> RxHandler {
        let registry = Arc::clone(&self.registry);
        let events_tx = self.events_tx.clone();
        Arc::new(move |rx_event| match rx_event {
            RxEvent::Payload(payload, source) => match decode_envelope(payload) {
                Ok(envelope) => {
                    let events = registry.lock().observe(envelope, source, Instant::now());
                    for event in events {
                        let _ = events_tx.send(event);
                    }
                }
                Err(err) => {
                    let _ = events_tx.send(Event::Error(Error::Transform(err)));
                }
            },
            RxEvent::Error(err, _source) => {
                let _ = events_tx.send(Event::Error(Error::Transform(err)));
            }
        })
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let _ = self.down();
    }
}

/// Parse a post-pipeline payload as an envelope.
fn decode_envelope(payload: Payload) -> std::result::Result<Envelope, TransformError> {
    match payload {
        Payload::Value(value) => serde_json::from_value(value)
            .map_err(|err| TransformError::Serialization(err.to_string())),
        Payload::Bytes(bytes) => serde_json::from_slice(&bytes)
            .map_err(|err| TransformError::Serialization(err.to_string())),
    }
}

/// Heartbeat timer body: announce (when exposed) and evict, every interval.
#[allow(clippy::too_many_arguments)]
fn heartbeat_loop(
    transport: &Transport,
    registry: &Mutex<PeerRegistry>,
    events_tx: &Sender<Event>,
    running: &AtomicBool,
    id: &str,
    meta: Option<&Value>,
    expose: bool,
    interval: Duration,
    timeout: Duration,
) {
    log::debug!(
        "[heartbeat] {} started (interval={:?} timeout={:?} expose={})",
        id,
        interval,
        timeout,
        expose
    );
    let mut next_beat = Instant::now();
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= next_beat {
            if expose {
                match Envelope::heartbeat(id, meta.cloned()).into_payload() {
                    Ok(payload) => {
                        if let Err(err) = transport.send(payload) {
                            log::warn!("[heartbeat] {} send failed: {}", id, err);
                            let _ = events_tx.send(Event::Error(err));
                        }
                    }
                    Err(err) => log::warn!("[heartbeat] {} encode failed: {}", id, err),
                }
            }
            let downs = registry.lock().evict_expired(timeout, now);
            for event in downs {
                let _ = events_tx.send(event);
            }
            next_beat = now + interval;
        }
        // Short sleeps keep stop() responsive.
        thread::sleep(TICK_POLL_INTERVAL.min(interval));
    }
    log::debug!("[heartbeat] {} stopped", id);
}
