// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer registry: liveness bookkeeping over received envelopes.
//!
//! Pure state machine, no I/O. The node feeds every decoded envelope through
//! [`PeerRegistry::observe`] and drives [`PeerRegistry::evict_expired`] from
//! its heartbeat timer; both return the resulting [`Event`]s for the caller
//! to publish. Time is passed in explicitly so the transitions are testable
//! with synthetic clocks.

use crate::envelope::Envelope;
use crate::events::Event;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// What the registry knows about one remote peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// The peer's self-assigned id.
    pub id: String,
    /// Source address of the most recent envelope.
    pub addr: SocketAddr,
    /// The peer's announced metadata, if any.
    pub meta: Option<Value>,
    /// When the first envelope from this peer arrived.
    pub first_seen: Instant,
    /// When the most recent envelope arrived.
    pub last_seen: Instant,
}

impl PeerRecord {
    /// Time since the last envelope, zero if `now` precedes it.
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Tracks known peers keyed by id.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    local_id: String,
    peers: HashMap<String, PeerRecord>,
}

impl PeerRegistry {
    /// Create a registry that suppresses envelopes carrying `local_id`.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            peers: HashMap::new(),
        }
    }

    /// Fold one received envelope into the registry.
    ///
    /// Returns the events the envelope caused, in order:
    /// - first envelope from an id: `Event::Up`
    /// - `suicide` flag: the peer is removed and `Event::Down` is emitted
    /// - a `message` field: `Event::Message` carrying the sender's record
    ///
    /// Envelopes with an empty id or our own id are discarded (loopback
    /// suppression). Every accepted envelope refreshes `last_seen`; an
    /// envelope carrying `meta` overwrites the stored value.
    pub fn observe(&mut self, envelope: Envelope, source: SocketAddr, now: Instant) -> Vec<Event> {
        if envelope.id.is_empty() || envelope.id == self.local_id {
            return Vec::new();
        }

        let mut events = Vec::new();

        if envelope.suicide {
            if let Some(record) = self.peers.remove(&envelope.id) {
                log::debug!("[registry] peer {} departed (suicide)", record.id);
                events.push(Event::Down(record));
            }
            return events;
        }

        use std::collections::hash_map::Entry;
        let record = match self.peers.entry(envelope.id.clone()) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                record.addr = source;
                // Clock regressions must not move last_seen backwards.
                record.last_seen = record.last_seen.max(now);
                if envelope.meta.is_some() {
                    record.meta = envelope.meta.clone();
                }
                record
            }
            Entry::Vacant(entry) => {
                log::debug!("[registry] peer {} up from {}", envelope.id, source);
                let record = entry.insert(PeerRecord {
                    id: envelope.id.clone(),
                    addr: source,
                    meta: envelope.meta.clone(),
                    first_seen: now,
                    last_seen: now,
                });
                events.push(Event::Up(record.clone()));
                record
            }
        };
        if let Some(message) = envelope.message {
            events.push(Event::Message {
                payload: message,
                peer: record.clone(),
            });
        }
        events
    }

    /// Drop every peer silent for longer than `timeout`, one `Event::Down`
    /// per eviction.
    pub fn evict_expired(&mut self, timeout: Duration, now: Instant) -> Vec<Event> {
        let Some(deadline) = now.checked_sub(timeout) else {
            // Process younger than the timeout: nothing can have expired.
            return Vec::new();
        };
        let expired: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, record)| record.last_seen < deadline)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.peers.remove(&id))
            .map(|record| {
                log::debug!(
                    "[registry] peer {} down (silent {:?})",
                    record.id,
                    record.silence(now)
                );
                Event::Down(record)
            })
            .collect()
    }

    /// Snapshot of every known peer.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.values().cloned().collect()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True when no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Forget every peer without emitting events (local shutdown).
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}
