//! A single peer slot.

use std::collections::BTreeSet;

use crate::EndpointId;

/// One of a device's two link slots.
///
/// Unassigned slots hold no peer and an empty reachable set. An assigned
/// slot's reachable set always includes its own peer, so membership checks
/// cover the direct link as well as everything behind it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSlot {
    peer: Option<EndpointId>,
    reachable: BTreeSet<EndpointId>,
}

impl PeerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_assigned(&self) -> bool {
        self.peer.is_some()
    }

    pub fn peer(&self) -> Option<&EndpointId> {
        self.peer.as_ref()
    }

    /// True when `id` is this slot's directly connected peer.
    pub fn is_peer(&self, id: &EndpointId) -> bool {
        self.peer.as_ref() == Some(id)
    }

    /// True when `id` is reachable through this slot (peer included).
    pub fn contains(&self, id: &EndpointId) -> bool {
        self.reachable.contains(id)
    }

    pub fn reachable(&self) -> &BTreeSet<EndpointId> {
        &self.reachable
    }

    /// Number of devices reachable through this slot.
    pub fn reach_count(&self) -> usize {
        self.reachable.len()
    }

    /// Occupies the slot with a fresh link; the peer is the only device
    /// known to be reachable until its first announcement arrives.
    pub(crate) fn assign(&mut self, peer: EndpointId) {
        self.reachable.clear();
        self.reachable.insert(peer.clone());
        self.peer = Some(peer);
    }

    /// Replaces the reachable set with an announced one. The peer itself is
    /// re-added; announcements describe what lies *beyond* the peer and must
    /// not be able to erase the link they arrived on.
    pub(crate) fn replace_reachable(&mut self, ids: BTreeSet<EndpointId>) {
        debug_assert!(self.peer.is_some());
        self.reachable = ids;
        if let Some(peer) = &self.peer {
            self.reachable.insert(peer.clone());
        }
    }

    pub(crate) fn clear(&mut self) {
        self.peer = None;
        self.reachable.clear();
    }
}
