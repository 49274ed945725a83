// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node event stream.

use crate::error::Error;
use crate::registry::PeerRecord;
use serde_json::Value;

/// What a node reports to its subscribers.
///
/// Events are delivered over an unbounded channel, in the order the node
/// observed them. `Up` always precedes any `Message` from the same peer.
#[derive(Debug)]
pub enum Event {
    /// A new peer was discovered.
    Up(PeerRecord),
    /// A peer departed, either announced (`suicide`) or by timeout.
    Down(PeerRecord),
    /// A peer sent an application message.
    Message {
        /// The decoded message body.
        payload: Value,
        /// The sender, as known at delivery time.
        peer: PeerRecord,
    },
    /// A non-fatal receive-path failure (bad datagram, failed stage).
    Error(Error),
}

impl Event {
    /// The peer record this event concerns, when it concerns one.
    pub fn peer(&self) -> Option<&PeerRecord> {
        match self {
            Event::Up(record) | Event::Down(record) => Some(record),
            Event::Message { peer, .. } => Some(peer),
            Event::Error(_) => None,
        }
    }
}
