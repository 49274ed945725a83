// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! groupcast: decentralized peer discovery over UDP multicast.
//!
//! Nodes announce themselves with periodic heartbeats to a multicast group,
//! track each other's liveness, and exchange small JSON messages. There is no
//! coordinator and no registry service; a peer is "up" while its heartbeats
//! keep arriving and "down" when they stop (or when it says goodbye).
//!
//! Every datagram passes through a pluggable transform pipeline on its way
//! to and from the socket, so integrity protection, encryption, and encoding
//! are opt-in and composable:
//!
//! ```text
//! send:    envelope -> codec -> integrity -> cipher -> socket
//! receive: socket   -> cipher -> integrity -> codec -> envelope
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use groupcast::{codec, integrity, Config, Event, Node};
//!
//! # fn main() -> groupcast::Result<()> {
//! let node = Node::new(Config::new().node_id("worker-1"))?;
//! node.register_transform(codec())?;
//! node.register_transform(integrity(b"shared secret"))?;
//! node.up()?;
//!
//! for event in node.events().iter() {
//!     match event {
//!         Event::Up(peer) => println!("up: {}", peer.id),
//!         Event::Down(peer) => println!("down: {}", peer.id),
//!         Event::Message { payload, peer } => println!("{}: {}", peer.id, payload),
//!         Event::Error(err) => eprintln!("rx error: {}", err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod node;
pub mod payload;
pub mod pipeline;
pub mod registry;
pub mod transport;

pub use config::Config;
pub use envelope::Envelope;
pub use error::{Error, Result, TransformError};
pub use events::Event;
pub use node::Node;
pub use payload::Payload;
pub use pipeline::{cipher::cipher, codec::codec, integrity::integrity, Pipeline, Transform};
pub use registry::{PeerRecord, PeerRegistry};
pub use transport::{RxEvent, RxHandler, Transport};
