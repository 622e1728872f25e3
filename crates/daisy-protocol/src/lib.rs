//! Daisy Protocol - chain maintenance and message flooding
//!
//! This crate owns the two state machines a chain device runs on top of its
//! radio:
//!
//! - [`TopologyController`] keeps the device inside exactly one chain. It
//!   decides which discovered peers to approach, which inbound requests to
//!   accept, where an established link lands (slot A before slot B), and it
//!   exchanges reachable sets with both neighbors so every device can count
//!   the whole chain. It also breaks loops: an announced set that contains
//!   the device's own identity means the chain bit its own tail, and the
//!   link it arrived on is dropped.
//!
//! - [`MessageRouter`] floods user text along the chain. A message entering
//!   at any device goes out every link except the one it arrived on, which
//!   on a path topology delivers it exactly once everywhere. A message
//!   coming home to its origin is the data-plane loop signal and drops the
//!   link too.
//!
//! Everything on the wire is an [`Envelope`], a two-variant binary codec.
//!
//! # Driving the machines
//!
//! Both machines are synchronous and single-owner. The hosting actor feeds
//! them transport events one at a time and each handler runs to completion;
//! sends toward the radio are fire-and-forget, and failed sends are logged
//! and survived. Convergence is best-effort, repaired by the next update or
//! disconnect.

pub mod controller;
pub mod envelope;
pub mod error;
pub mod router;

pub use controller::TopologyController;
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use router::{Delivery, FloodStats, MessageRouter};
