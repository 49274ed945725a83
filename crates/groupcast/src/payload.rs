// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Payload representation flowing through the transform pipeline.

use serde_json::Value;

/// A value travelling through the transform pipeline.
///
/// The socket only ever reads and writes [`Payload::Bytes`]; the structured
/// variant exists so the serialization transform has a real boundary to
/// convert across. On send, the envelope enters the chain as a `Value`; a
/// `Value` still present at the socket tail is JSON-encoded. On receive, the
/// datagram enters as `Bytes` and leaves as a `Value` once the codec stage
/// has decoded it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw wire bytes.
    Bytes(Vec<u8>),
    /// Structured value not yet serialized (or already decoded).
    Value(Value),
}

impl Payload {
    /// Borrow the raw bytes, if this payload is already serialized.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Value(_) => None,
        }
    }

    /// Consume the payload, returning the raw bytes if serialized.
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Value(_) => None,
        }
    }

    /// True when the payload is raw wire bytes.
    pub fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
