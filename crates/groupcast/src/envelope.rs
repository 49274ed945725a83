// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire envelope exchanged between peers after pipeline decode.

use crate::error::{Result, TransformError};
use crate::payload::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical message unit exchanged between peers.
///
/// An envelope with neither `message` nor `suicide` set is a pure heartbeat
/// carrying only `id` and (optionally) `meta`. Optional fields are omitted
/// from the wire encoding when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender node id. Envelopes without an id are discarded silently.
    #[serde(default)]
    pub id: String,

    /// Opaque application data attached to the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    /// Application payload, absent on pure heartbeats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,

    /// Graceful-departure signal: the sender is leaving the group.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suicide: bool,
}

impl Envelope {
    /// Pure heartbeat envelope: id plus optional meta, no payload.
    pub fn heartbeat(id: &str, meta: Option<Value>) -> Self {
        Self {
            id: id.to_string(),
            meta,
            message: None,
            suicide: false,
        }
    }

    /// Application message envelope.
    pub fn message(id: &str, message: Value) -> Self {
        Self {
            id: id.to_string(),
            meta: None,
            message: Some(message),
            suicide: false,
        }
    }

    /// Graceful-departure envelope, broadcast best-effort during shutdown.
    pub fn departure(id: &str) -> Self {
        Self {
            id: id.to_string(),
            meta: None,
            message: None,
            suicide: true,
        }
    }

    /// True when the envelope carries neither a message nor a departure flag.
    pub fn is_heartbeat(&self) -> bool {
        self.message.is_none() && !self.suicide
    }

    /// Convert into a structured pipeline payload for sending.
    pub fn into_payload(self) -> Result<Payload> {
        let value = serde_json::to_value(&self)
            .map_err(|err| TransformError::Serialization(err.to_string()))?;
        Ok(Payload::Value(value))
    }
}
