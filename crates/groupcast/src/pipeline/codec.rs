// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured serialization transform: JSON values to and from wire bytes.
//!
//! Outbound serializes a structured payload to JSON bytes and passes raw
//! bytes through unchanged. Inbound attempts a JSON decode and, on failure,
//! passes the raw bytes through rather than failing: an undecodable datagram
//! is treated as opaque bytes, not an error.

use crate::error::TransformError;
use crate::payload::Payload;
use crate::pipeline::Transform;

/// Build the JSON serialization transform.
///
/// Register it before the integrity and cipher transforms so values are
/// serialized before they are digested or encrypted (and decoded last on
/// receive).
///
/// # Example
///
/// ```
/// use groupcast::codec;
///
/// let transform = codec();
/// assert_eq!(transform.name(), "codec");
/// ```
pub fn codec() -> Transform {
    Transform::new("codec")
        .outbound(|payload| match payload {
            Payload::Bytes(bytes) => Ok(Payload::Bytes(bytes)),
            Payload::Value(value) => serde_json::to_vec(&value)
                .map(Payload::Bytes)
                .map_err(|err| TransformError::Serialization(err.to_string())),
        })
        .inbound(|payload, _source| match payload {
            Payload::Bytes(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => Ok(Payload::Value(value)),
                // Decode failure signals "treat as opaque bytes".
                Err(_) => Ok(Payload::Bytes(bytes)),
            },
            value @ Payload::Value(_) => Ok(value),
        })
}
