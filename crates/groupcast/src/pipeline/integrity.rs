// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Keyed integrity transform: HMAC-SHA256 digest appended to the payload.
//!
//! # Wire Format
//!
//! ```text
//! +------------------+------------------+
//! | payload          | HMAC-SHA256 tag  |
//! | N bytes          | 32 bytes         |
//! +------------------+------------------+
//! ```
//!
//! Outbound appends the keyed digest of the payload; inbound recomputes it
//! over everything before the trailing tag and strips it. A mismatched or
//! truncated tag fails with `TransformError::Integrity` and the datagram is
//! dropped before any envelope interpretation.

use crate::error::TransformError;
use crate::payload::Payload;
use crate::pipeline::{require_bytes, Transform};
use ring::hmac;

/// Length in bytes of the appended digest (HMAC-SHA256 output size).
pub const TAG_LEN: usize = 32;

/// Build the integrity transform keyed by `secret`.
///
/// There is no default secret: both sides must be configured with the same
/// explicit value.
///
/// # Example
///
/// ```
/// use groupcast::{integrity, Payload};
///
/// let transform = integrity(b"shared secret");
/// assert_eq!(transform.name(), "integrity");
/// ```
pub fn integrity(secret: &[u8]) -> Transform {
    let sign_key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let verify_key = hmac::Key::new(hmac::HMAC_SHA256, secret);

    Transform::new("integrity")
        .outbound(move |payload| {
            let mut bytes = require_bytes(payload, "integrity")?;
            let tag = hmac::sign(&sign_key, &bytes);
            bytes.extend_from_slice(tag.as_ref());
            Ok(Payload::Bytes(bytes))
        })
        .inbound(move |payload, _source| {
            let bytes = require_bytes(payload, "integrity")?;
            if bytes.len() < TAG_LEN {
                return Err(TransformError::Integrity(format!(
                    "payload shorter than digest ({} < {} bytes)",
                    bytes.len(),
                    TAG_LEN
                )));
            }
            let (body, tag) = bytes.split_at(bytes.len() - TAG_LEN);
            hmac::verify(&verify_key, body, tag)
                .map_err(|_| TransformError::Integrity("digest mismatch".to_string()))?;
            Ok(Payload::Bytes(body.to_vec()))
        })
}
