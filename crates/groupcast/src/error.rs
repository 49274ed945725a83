// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for pipeline, transport, and node operations.

use std::fmt;

/// Convenience result alias for groupcast operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by a pipeline transform stage.
///
/// An inbound stage failure is non-fatal: the offending datagram is dropped
/// and surfaced through the node's event channel. An outbound stage failure
/// aborts that send only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Integrity digest missing or mismatched (tampered or truncated payload).
    Integrity(String),
    /// Encryption or decryption failed (malformed or unauthentic ciphertext).
    Crypto(String),
    /// Payload could not be serialized to or parsed from wire bytes.
    Serialization(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrity(msg) => write!(f, "Integrity check failed: {}", msg),
            Self::Crypto(msg) => write!(f, "Cryptographic error: {}", msg),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for TransformError {}

/// Errors returned by groupcast operations.
///
/// All failures are local and recoverable: nothing in this crate is fatal to
/// the process, and a failed operation leaves the component in its prior
/// state.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration or transform registration (empty name, duplicate
    /// name, transform with neither direction, timeout not exceeding the
    /// heartbeat interval, non-multicast group address).
    Config(String),
    /// Socket bind or multicast group setup failed.
    Bind(String),
    /// Socket write failed after the outbound chain succeeded.
    Write(String),
    /// A pipeline transform stage failed.
    Transform(TransformError),
    /// `up()` called while the node is already active.
    AlreadyUp,
    /// `down()` or `send()` called while the node is not active.
    NotUp,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Bind(msg) => write!(f, "Bind failed: {}", msg),
            Self::Write(msg) => write!(f, "Send failed: {}", msg),
            Self::Transform(err) => write!(f, "Transform failed: {}", err),
            Self::AlreadyUp => write!(f, "Node is already up"),
            Self::NotUp => write!(f, "Node is not up"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transform(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransformError> for Error {
    fn from(err: TransformError) -> Self {
        Self::Transform(err)
    }
}
