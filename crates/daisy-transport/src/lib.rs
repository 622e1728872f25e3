//! Daisy Transport - radio abstraction for chain-forming devices
//!
//! This crate provides:
//! - The [`Transport`] trait the topology layer drives: advertise, discover,
//!   connect, disconnect, and fire-and-forget payload sends
//! - [`TransportEvent`], the callback surface every transport delivers back
//!   through an event queue
//! - [`MemoryRadio`], an in-process transport over a shared [`RadioHub`],
//!   used by tests and simulations as a stand-in for a proximity radio
//!
//! # Design
//!
//! Real proximity radios report everything asynchronously: a connection
//! request may fail long after it was issued, and both ends of a broken link
//! learn about it from the radio rather than from each other. The trait
//! mirrors that shape. Methods return immediately; anything that can fail
//! later arrives as a [`TransportEvent`] on the device's queue, including
//! the [`ConnectError::SimultaneousConflict`] collision that occurs when two
//! devices request each other at the same instant.

pub mod memory;
pub mod transport;
pub mod types;

pub use memory::{MemoryRadio, RadioHub};
pub use transport::Transport;
pub use types::{ConnectError, PayloadId, SendError, TransportEvent};
