// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node configuration: defaults, builder-style setters, and validation.

use crate::error::{Error, Result};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Default multicast group joined when none is configured.
pub const DEFAULT_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 42);

/// Default UDP port. Set the port to `0` to request an ephemeral port,
/// resolved after bind.
pub const DEFAULT_PORT: u16 = 10101;

/// Default multicast TTL (hop limit).
pub const DEFAULT_TTL: u32 = 64;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(1000);

/// Default liveness timeout. Must exceed the heartbeat interval; a peer that
/// stays silent for this long is evicted on the next heartbeat tick.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Construction-time configuration for a [`Node`](crate::Node).
///
/// All fields are optional in the sense that [`Config::default`] yields a
/// working configuration; setters follow the builder pattern.
///
/// # Example
///
/// ```
/// use groupcast::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .port(17100)
///     .heartbeat_interval(Duration::from_millis(500))
///     .timeout(Duration::from_millis(1500))
///     .node_id("sensor-12");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Multicast group address. Must be a multicast address.
    pub group: Ipv4Addr,
    /// Local bind address (also the interface used to join the group).
    pub bind_addr: Ipv4Addr,
    /// UDP port; `0` requests an ephemeral port.
    pub port: u16,
    /// Deliver our own multicast datagrams back to us.
    pub loopback: bool,
    /// Multicast TTL (hop limit), 0-255.
    pub ttl: u32,
    /// Node id; generated from timestamp and process id when not set.
    pub node_id: Option<String>,
    /// Period of the heartbeat/eviction timer.
    pub heartbeat_interval: Duration,
    /// Liveness timeout; must exceed `heartbeat_interval`.
    pub timeout: Duration,
    /// Broadcast heartbeats. Eviction scanning runs regardless.
    pub expose: bool,
    /// Opaque application data announced with every heartbeat.
    pub meta: Option<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            bind_addr: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            loopback: true,
            ttl: DEFAULT_TTL,
            node_id: None,
            heartbeat_interval: DEFAULT_HEARTBEAT,
            timeout: DEFAULT_TIMEOUT,
            expose: true,
            meta: None,
        }
    }
}

impl Config {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the multicast group address.
    #[must_use]
    pub fn group(mut self, group: Ipv4Addr) -> Self {
        self.group = group;
        self
    }

    /// Set the local bind address.
    #[must_use]
    pub fn bind_addr(mut self, bind_addr: Ipv4Addr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// Set the UDP port (`0` = ephemeral).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable or disable loopback delivery of our own datagrams.
    #[must_use]
    pub fn loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Set the multicast TTL.
    #[must_use]
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set an explicit node id.
    #[must_use]
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the liveness timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable heartbeat broadcasting.
    #[must_use]
    pub fn expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Attach opaque application data to this node's announcements.
    #[must_use]
    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the group address is not multicast, the
    /// heartbeat interval is zero, the timeout does not exceed the heartbeat
    /// interval, the TTL is out of range, or an explicit node id is empty.
    pub fn validate(&self) -> Result<()> {
        if !self.group.is_multicast() {
            return Err(Error::Config(format!(
                "group address {} is not a multicast address",
                self.group
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::Config(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        if self.timeout <= self.heartbeat_interval {
            return Err(Error::Config(format!(
                "timeout ({:?}) must exceed heartbeat interval ({:?})",
                self.timeout, self.heartbeat_interval
            )));
        }
        if self.ttl > 255 {
            return Err(Error::Config(format!(
                "ttl {} out of range (0-255)",
                self.ttl
            )));
        }
        if let Some(id) = &self.node_id {
            if id.is_empty() {
                return Err(Error::Config("node id must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Generate a node id from the wall clock, the process id, and a
/// process-local counter (distinguishes nodes created in the same instant).
pub(crate) fn generate_node_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    static SEQ: AtomicU32 = AtomicU32::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let stamp = (now.as_nanos() & 0xFFFF_FFFF) as u32 ^ std::process::id();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("node-{:08x}-{:04x}", stamp, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.group, Ipv4Addr::new(224, 0, 0, 42));
        assert_eq!(config.port, 10101);
        assert_eq!(config.ttl, 64);
        assert!(config.loopback);
        assert!(config.expose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = Config::new()
            .group(Ipv4Addr::new(239, 1, 2, 3))
            .port(0)
            .ttl(1)
            .loopback(false)
            .expose(false)
            .node_id("a");
        assert_eq!(config.group, Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(config.port, 0);
        assert_eq!(config.node_id.as_deref(), Some("a"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_multicast_group() {
        let config = Config::new().group(Ipv4Addr::new(192, 168, 1, 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_timeout_not_exceeding_heartbeat() {
        let config = Config::new()
            .heartbeat_interval(Duration::from_millis(1000))
            .timeout(Duration::from_millis(1000));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_heartbeat() {
        let config = Config::new().heartbeat_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_node_id() {
        let config = Config::new().node_id("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_ttl() {
        let config = Config::new().ttl(256);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_node_id();
        let b = generate_node_id();
        assert_ne!(a, b);
        assert!(a.starts_with("node-"));
    }
}
