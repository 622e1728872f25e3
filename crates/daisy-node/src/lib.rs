//! Daisy Node - one device, one actor
//!
//! This crate hosts the protocol state machines inside a single tokio task
//! per device. The transport pushes [`TransportEvent`]s onto one queue, the
//! application pushes commands onto another, and the actor consumes both one
//! item at a time; no lock ever guards protocol state because nothing else
//! can touch it.
//!
//! Applications hold a [`NodeHandle`]: send text into the chain, watch the
//! network size change, subscribe to flooded messages, shut the device down.
//!
//! [`TransportEvent`]: daisy_transport::TransportEvent

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use node::{ChainNode, NodeHandle};
