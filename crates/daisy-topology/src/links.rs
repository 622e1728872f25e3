//! The pair of slots a device links through.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::{EndpointId, PeerSlot};

/// Which of the two slots an operation touched.
///
/// Slot A fills before slot B; `ALL` iterates in that assignment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotIndex {
    A,
    B,
}

impl SlotIndex {
    pub const ALL: [SlotIndex; 2] = [SlotIndex::A, SlotIndex::B];

    pub fn other(self) -> Self {
        match self {
            SlotIndex::A => SlotIndex::B,
            SlotIndex::B => SlotIndex::A,
        }
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotIndex::A => f.write_str("A"),
            SlotIndex::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("both peer slots are occupied")]
    AtCapacity,
    #[error("peer {0} already occupies a slot")]
    AlreadyLinked(EndpointId),
}

/// Both link slots of one device.
///
/// All slot mutation funnels through here so the pair invariants hold: a
/// peer occupies at most one slot, slot A fills before slot B, and an
/// assigned slot's reachable set always contains its peer.
#[derive(Debug, Clone, Default)]
pub struct ChainLinks {
    a: PeerSlot,
    b: PeerSlot,
}

impl ChainLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, index: SlotIndex) -> &PeerSlot {
        match index {
            SlotIndex::A => &self.a,
            SlotIndex::B => &self.b,
        }
    }

    fn slot_mut(&mut self, index: SlotIndex) -> &mut PeerSlot {
        match index {
            SlotIndex::A => &mut self.a,
            SlotIndex::B => &mut self.b,
        }
    }

    /// The slot directly linked to `id`, if any.
    pub fn slot_of(&self, id: &EndpointId) -> Option<SlotIndex> {
        SlotIndex::ALL.into_iter().find(|&i| self.slot(i).is_peer(id))
    }

    /// True when `id` is a directly connected peer.
    pub fn is_linked(&self, id: &EndpointId) -> bool {
        self.slot_of(id).is_some()
    }

    /// True when `id` is anywhere in this device's chain: a direct peer or
    /// reachable beyond one. Connecting to such a device would close a loop.
    pub fn contains(&self, id: &EndpointId) -> bool {
        self.a.contains(id) || self.b.contains(id)
    }

    pub fn link_count(&self) -> usize {
        SlotIndex::ALL.iter().filter(|&&i| self.slot(i).is_assigned()).count()
    }

    pub fn is_full(&self) -> bool {
        self.a.is_assigned() && self.b.is_assigned()
    }

    /// Directly connected peers, slot A first.
    pub fn peers(&self) -> impl Iterator<Item = &EndpointId> {
        SlotIndex::ALL.into_iter().filter_map(|i| self.slot(i).peer())
    }

    /// Devices in the whole chain: both branches plus this device.
    pub fn network_size(&self) -> usize {
        self.a.reach_count() + self.b.reach_count() + 1
    }

    /// Occupies the first unassigned slot with `peer`, A before B.
    pub fn assign(&mut self, peer: EndpointId) -> Result<SlotIndex, LinkError> {
        if self.is_linked(&peer) {
            return Err(LinkError::AlreadyLinked(peer));
        }
        let index = SlotIndex::ALL
            .into_iter()
            .find(|&i| !self.slot(i).is_assigned())
            .ok_or(LinkError::AtCapacity)?;
        self.slot_mut(index).assign(peer);
        Ok(index)
    }

    /// Stores an announced reachable set against the slot linked to `from`.
    /// Returns the slot it landed in, or `None` when `from` owns no slot
    /// (a stale announcement from a link that has since dropped).
    pub fn store_reachable(
        &mut self,
        from: &EndpointId,
        ids: BTreeSet<EndpointId>,
    ) -> Option<SlotIndex> {
        let index = self.slot_of(from)?;
        self.slot_mut(index).replace_reachable(ids);
        Some(index)
    }

    /// Clears the slot linked to `id`. Returns the freed slot, or `None`
    /// when `id` was not a direct peer.
    pub fn clear(&mut self, id: &EndpointId) -> Option<SlotIndex> {
        let index = self.slot_of(id)?;
        self.slot_mut(index).clear();
        Some(index)
    }
}
