// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Symmetric cipher transform: AES-256-GCM with a random per-datagram nonce.
//!
//! # Wire Format
//!
//! ```text
//! +-------------------+------------------------+
//! | nonce             | ciphertext + auth tag  |
//! | 12 bytes          | N + 16 bytes           |
//! +-------------------+------------------------+
//! ```
//!
//! Outbound encrypts the full payload and prefixes the nonce; inbound
//! decrypts and authenticates, failing with `TransformError::Crypto` on
//! short or unauthentic ciphertext. Key material is zeroized on drop.

use crate::error::TransformError;
use crate::payload::Payload;
use crate::pipeline::{require_bytes, Transform};
use ring::aead::{
    Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM,
    NONCE_LEN,
};
use ring::error::Unspecified;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use zeroize::Zeroize;

/// Required key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Key material wrapper that wipes itself on drop.
struct KeyMaterial {
    bytes: [u8; KEY_LEN],
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Single-use nonce sequence for one seal/open operation.
struct OneShotNonce {
    nonce: Option<[u8; NONCE_LEN]>,
}

impl OneShotNonce {
    fn new(nonce: [u8; NONCE_LEN]) -> Self {
        Self { nonce: Some(nonce) }
    }
}

impl NonceSequence for OneShotNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, Unspecified> {
        self.nonce
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(Unspecified)
    }
}

/// Build the symmetric cipher transform for a 256-bit key.
///
/// Both sides must be configured with the same explicit key; there is no
/// built-in default.
///
/// # Example
///
/// ```
/// use groupcast::cipher;
///
/// let transform = cipher([7u8; 32]);
/// assert_eq!(transform.name(), "cipher");
/// ```
pub fn cipher(key: [u8; KEY_LEN]) -> Transform {
    let material = Arc::new(KeyMaterial { bytes: key });
    let seal_material = Arc::clone(&material);
    let open_material = material;

    Transform::new("cipher")
        .outbound(move |payload| {
            let plaintext = require_bytes(payload, "cipher")?;

            let mut nonce = [0u8; NONCE_LEN];
            SystemRandom::new()
                .fill(&mut nonce)
                .map_err(|_| TransformError::Crypto("nonce generation failed".to_string()))?;

            let unbound = UnboundKey::new(&AES_256_GCM, &seal_material.bytes)
                .map_err(|_| TransformError::Crypto("failed to create cipher key".to_string()))?;
            let mut sealing = SealingKey::new(unbound, OneShotNonce::new(nonce));

            let mut in_out = plaintext;
            sealing
                .seal_in_place_append_tag(Aad::empty(), &mut in_out)
                .map_err(|_| TransformError::Crypto("encryption failed".to_string()))?;

            let mut wire = Vec::with_capacity(NONCE_LEN + in_out.len());
            wire.extend_from_slice(&nonce);
            wire.extend_from_slice(&in_out);
            Ok(Payload::Bytes(wire))
        })
        .inbound(move |payload, _source| {
            let bytes = require_bytes(payload, "cipher")?;
            if bytes.len() < NONCE_LEN + TAG_LEN {
                return Err(TransformError::Crypto(format!(
                    "ciphertext too short ({} < {} bytes)",
                    bytes.len(),
                    NONCE_LEN + TAG_LEN
                )));
            }

            let mut nonce = [0u8; NONCE_LEN];
            nonce.copy_from_slice(&bytes[..NONCE_LEN]);

            let unbound = UnboundKey::new(&AES_256_GCM, &open_material.bytes)
                .map_err(|_| TransformError::Crypto("failed to create cipher key".to_string()))?;
            let mut opening = OpeningKey::new(unbound, OneShotNonce::new(nonce));

            let mut in_out = bytes[NONCE_LEN..].to_vec();
            let plaintext = opening
                .open_in_place(Aad::empty(), &mut in_out)
                .map_err(|_| TransformError::Crypto("authentication failed".to_string()))?;
            Ok(Payload::Bytes(plaintext.to_vec()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use serde_json::json;
    use std::net::SocketAddr;

    const KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];

    fn source() -> SocketAddr {
        "127.0.0.1:0".parse().expect("test address")
    }

    fn pipeline_with(key: [u8; KEY_LEN]) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.register(cipher(key)).expect("register cipher");
        pipeline
    }

    #[test]
    fn test_round_trip() {
        let pipeline = pipeline_with(KEY);
        let wire = pipeline
            .run_outbound(Payload::Bytes(b"confidential".to_vec()))
            .expect("encrypt");
        let wire_bytes = wire.as_bytes().expect("bytes");
        assert_eq!(wire_bytes.len(), b"confidential".len() + NONCE_LEN + TAG_LEN);
        assert_ne!(&wire_bytes[NONCE_LEN..NONCE_LEN + 4], b"conf");

        let back = pipeline.run_inbound(wire, source()).expect("decrypt");
        assert_eq!(back.as_bytes(), Some(&b"confidential"[..]));
    }

    #[test]
    fn test_nonces_are_unique_per_send() {
        let pipeline = pipeline_with(KEY);
        let a = pipeline
            .run_outbound(Payload::Bytes(b"same input".to_vec()))
            .expect("encrypt a")
            .into_bytes()
            .expect("bytes");
        let b = pipeline
            .run_outbound(Payload::Bytes(b"same input".to_vec()))
            .expect("encrypt b")
            .into_bytes()
            .expect("bytes");
        assert_ne!(a, b, "identical plaintexts must not produce identical wire bytes");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let pipeline = pipeline_with(KEY);
        let mut wire = pipeline
            .run_outbound(Payload::Bytes(b"confidential".to_vec()))
            .expect("encrypt")
            .into_bytes()
            .expect("bytes");
        wire[NONCE_LEN] ^= 0x01;
        let err = pipeline
            .run_inbound(Payload::Bytes(wire), source())
            .expect_err("tamper must fail");
        assert!(matches!(err, TransformError::Crypto(_)));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let pipeline = pipeline_with(KEY);
        let err = pipeline
            .run_inbound(Payload::Bytes(vec![0u8; NONCE_LEN + TAG_LEN - 1]), source())
            .expect_err("short ciphertext must fail");
        assert!(matches!(err, TransformError::Crypto(_)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sender = pipeline_with(KEY);
        let receiver = pipeline_with([0x17; KEY_LEN]);
        let wire = sender
            .run_outbound(Payload::Bytes(b"confidential".to_vec()))
            .expect("encrypt");
        let err = receiver
            .run_inbound(wire, source())
            .expect_err("wrong key must fail");
        assert!(matches!(err, TransformError::Crypto(_)));
    }

    #[test]
    fn test_structured_payload_rejected() {
        let pipeline = pipeline_with(KEY);
        let err = pipeline
            .run_outbound(Payload::Value(json!({"id": "a"})))
            .expect_err("structured payload must fail");
        assert!(matches!(err, TransformError::Serialization(_)));
    }
}
