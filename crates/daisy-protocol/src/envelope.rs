//! Wire envelope.
//!
//! Every payload between chain neighbors is one of two tagged variants,
//! serialized with bincode. The tag makes the control and data planes
//! impossible to confuse: a reachable-set announcement can never be read as
//! user text, and user text never as an announcement.

use std::collections::BTreeSet;

use daisy_topology::EndpointId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Envelope {
    /// The sender's reachable set for the link this arrives on: every
    /// identity behind the sender, the sender itself excluded. An empty set
    /// means the sender's far side is vacant.
    ControlUpdate(BTreeSet<EndpointId>),

    /// User text, flooded along the chain. `origin` is the identity of the
    /// device where the text entered the network and never changes while
    /// the message travels.
    DataMessage { origin: EndpointId, text: String },
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
