// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered transform pipeline applied to every outbound and inbound datagram.
//!
//! Transforms run in registration order on send and in reverse registration
//! order on receive, so the last wrap applied on the wire is the first one
//! undone:
//!
//! ```text
//! send:    codec -> integrity -> cipher -> socket
//! receive: socket -> cipher -> integrity -> codec
//! ```
//!
//! The first stage failure short-circuits the remaining stages; a partially
//! transformed payload is never forwarded.

pub mod cipher;
pub mod codec;
pub mod integrity;

use crate::error::{Error, Result, TransformError};
use crate::payload::Payload;
use std::net::SocketAddr;

/// Outbound stage function: wraps a payload for the wire.
pub type OutboundFn =
    Box<dyn Fn(Payload) -> std::result::Result<Payload, TransformError> + Send + Sync>;

/// Inbound stage function: undoes one wrap, given the sender address.
pub type InboundFn = Box<
    dyn Fn(Payload, SocketAddr) -> std::result::Result<Payload, TransformError> + Send + Sync,
>;

/// A named, independently pluggable encode/decode stage.
///
/// At least one direction must be provided before the transform can be
/// registered. Stage functions must be pure with respect to pipeline state:
/// they may hold key material bound at construction, but must not depend on
/// call order beyond the payload they are given.
///
/// # Example
///
/// ```
/// use groupcast::{Payload, Transform};
///
/// let upper = Transform::new("upper").outbound(|payload| {
///     let bytes = payload.into_bytes().unwrap_or_default();
///     Ok(Payload::Bytes(bytes.to_ascii_uppercase()))
/// });
/// assert_eq!(upper.name(), "upper");
/// ```
pub struct Transform {
    name: String,
    outbound: Option<OutboundFn>,
    inbound: Option<InboundFn>,
}

impl Transform {
    /// Create an empty transform with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outbound: None,
            inbound: None,
        }
    }

    /// Attach the outbound (send-side) stage function.
    #[must_use]
    pub fn outbound<F>(mut self, func: F) -> Self
    where
        F: Fn(Payload) -> std::result::Result<Payload, TransformError> + Send + Sync + 'static,
    {
        self.outbound = Some(Box::new(func));
        self
    }

    /// Attach the inbound (receive-side) stage function.
    #[must_use]
    pub fn inbound<F>(mut self, func: F) -> Self
    where
        F: Fn(Payload, SocketAddr) -> std::result::Result<Payload, TransformError>
            + Send
            + Sync
            + 'static,
    {
        self.inbound = Some(Box::new(func));
        self
    }

    /// Transform name, unique per transport instance.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("outbound", &self.outbound.is_some())
            .field("inbound", &self.inbound.is_some())
            .finish()
    }
}

/// Two explicit ordered stage lists derived from registration order.
///
/// The outbound list is built by appending, the inbound list by prepending,
/// which encodes the symmetric-wrapping invariant directly in the data
/// structure.
#[derive(Default)]
pub struct Pipeline {
    /// Registered names in registration order (uniqueness check).
    names: Vec<String>,
    /// Outbound stages, registration order.
    tx: Vec<(String, OutboundFn)>,
    /// Inbound stages, reverse registration order.
    rx: Vec<(String, InboundFn)>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the name is empty, the name is already
    /// registered, or the transform declares neither direction. On error the
    /// stage lists are left untouched.
    pub fn register(&mut self, transform: Transform) -> Result<()> {
        if transform.name.is_empty() {
            return Err(Error::Config("transform name not set".to_string()));
        }
        if self.names.iter().any(|name| *name == transform.name) {
            return Err(Error::Config(format!(
                "transform '{}' already registered",
                transform.name
            )));
        }
        if transform.outbound.is_none() && transform.inbound.is_none() {
            return Err(Error::Config(format!(
                "transform '{}' declares neither outbound nor inbound",
                transform.name
            )));
        }

        log::debug!(
            "[pipeline] registered transform '{}' (outbound={}, inbound={})",
            transform.name,
            transform.outbound.is_some(),
            transform.inbound.is_some()
        );

        self.names.push(transform.name.clone());
        if let Some(func) = transform.outbound {
            self.tx.push((transform.name.clone(), func));
        }
        if let Some(func) = transform.inbound {
            self.rx.insert(0, (transform.name, func));
        }
        Ok(())
    }

    /// Run the outbound chain over a payload.
    ///
    /// The first stage failure short-circuits the remaining stages and is
    /// returned to the caller; no partially transformed payload escapes.
    pub fn run_outbound(
        &self,
        payload: Payload,
    ) -> std::result::Result<Payload, TransformError> {
        let mut current = payload;
        for (name, stage) in &self.tx {
            current = stage(current).map_err(|err| {
                log::debug!("[pipeline] outbound stage '{}' failed: {}", name, err);
                err
            })?;
        }
        Ok(current)
    }

    /// Run the inbound chain over a received datagram.
    pub fn run_inbound(
        &self,
        payload: Payload,
        source: SocketAddr,
    ) -> std::result::Result<Payload, TransformError> {
        let mut current = payload;
        for (name, stage) in &self.rx {
            current = stage(current, source).map_err(|err| {
                log::debug!(
                    "[pipeline] inbound stage '{}' failed for {}: {}",
                    name,
                    source,
                    err
                );
                err
            })?;
        }
        Ok(current)
    }

    /// Registered transform names, in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True when no transforms are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Require a serialized payload, naming the stage in the error.
///
/// The integrity and cipher stages only operate on wire bytes; a structured
/// value reaching them means the codec stage is missing or misordered.
pub(crate) fn require_bytes(
    payload: Payload,
    stage: &str,
) -> std::result::Result<Vec<u8>, TransformError> {
    payload.into_bytes().ok_or_else(|| {
        TransformError::Serialization(format!(
            "{} transform requires a serialized payload",
            stage
        ))
    })
}
