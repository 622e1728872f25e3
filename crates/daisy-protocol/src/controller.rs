//! Chain topology controller.
//!
//! One controller per device. It owns the two peer slots, drives the radio
//! through an injected [`Transport`] handle, and keeps the device inside
//! exactly one chain:
//!
//! - discovered peers already in the chain are never approached,
//! - inbound requests from peers already in the chain are refused,
//! - established links land in slot A before slot B, and filling the second
//!   slot pauses advertising and discovery,
//! - every change to a slot's reachable set is announced across the other
//!   slot, hop by hop, so the whole chain keeps counting itself,
//! - an announced set containing the device's own identity means the chain
//!   closed into a loop; the link it arrived on is dropped,
//! - a freed slot resumes advertising and discovery, reopening the chain
//!   end for new joins.
//!
//! The controller is synchronous and single-owner: the hosting actor calls
//! exactly one handler per transport event and each runs to completion.
//! Everything it sends is fire-and-forget; failed sends are logged and the
//! next update repairs the divergence.

use std::collections::BTreeSet;
use std::sync::Arc;

use daisy_topology::{ChainLinks, EndpointId, SlotIndex};
use daisy_transport::{ConnectError, Transport, TransportEvent};
use tracing::{debug, info, trace, warn};

use crate::envelope::Envelope;

/// The per-device topology state machine.
pub struct TopologyController {
    identity: EndpointId,
    links: ChainLinks,
    /// True while advertising and discovery are active. Cleared when both
    /// slots fill, set again when one frees up or on `start()`.
    searching: bool,
    transport: Arc<dyn Transport>,
}

impl TopologyController {
    pub fn new(identity: EndpointId, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            links: ChainLinks::new(),
            searching: false,
            transport,
        }
    }

    pub fn identity(&self) -> &EndpointId {
        &self.identity
    }

    pub fn links(&self) -> &ChainLinks {
        &self.links
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Devices in the whole chain, this one included.
    pub fn network_size(&self) -> usize {
        self.links.network_size()
    }

    /// Begin advertising our identity and discovering peers.
    pub fn start(&mut self) {
        info!(identity = %self.identity, "joining the airspace");
        self.resume_search();
    }

    /// Drop all links and go quiet (application shutdown).
    pub fn stop(&mut self) {
        info!(identity = %self.identity, "leaving the airspace");
        self.transport.stop_advertising();
        self.transport.stop_discovery();
        self.searching = false;
        let peers: Vec<EndpointId> = self.links.peers().cloned().collect();
        for peer in peers {
            self.transport.disconnect(&peer);
        }
    }

    /// Dispatch one transport event to its handler.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerFound { peer, name } => self.on_peer_discovered(peer, name),
            TransportEvent::PeerLost { peer } => trace!(%peer, "peer out of range"),
            TransportEvent::ConnectionRequested { peer } => self.on_connection_requested(peer),
            TransportEvent::ConnectionFailed { peer, name, reason } => {
                self.on_connect_failed(peer, name, reason)
            }
            TransportEvent::Connected { peer } => self.on_connection_established(peer),
            TransportEvent::Disconnected { peer } => self.on_disconnected(peer),
            // Payload traffic belongs to the hosting actor, which decodes
            // the envelope and routes control updates back in through
            // `on_reachable_set_received`.
            TransportEvent::PayloadReceived { .. } | TransportEvent::PayloadDelivered { .. } => {}
        }
    }

    /// A nearby advertiser was reported. Approach it unless it is this
    /// device's own advertisement or already somewhere in the chain.
    pub fn on_peer_discovered(&mut self, peer: EndpointId, name: EndpointId) {
        if name == self.identity {
            trace!(%peer, "discovered our own advertisement; ignoring");
            return;
        }
        if self.links.contains(&peer) {
            trace!(%peer, "discovered peer already in the chain; ignoring");
            return;
        }
        debug!(%peer, %name, "requesting connection to discovered peer");
        if let Err(err) = self.transport.request_connection(&self.identity, &peer) {
            debug!(%peer, %err, "connection request not issued");
        }
    }

    /// An outgoing request failed. On a simultaneous-request collision the
    /// lexicographically lower identity retries once; the higher side stays
    /// passive and accepts the retry when it arrives. Every other failure is
    /// dropped and discovery carries on.
    pub fn on_connect_failed(&mut self, peer: EndpointId, name: EndpointId, reason: ConnectError) {
        if reason == ConnectError::SimultaneousConflict && self.identity < name {
            debug!(%peer, %name, "simultaneous requests collided; lower identity retries");
            if let Err(err) = self.transport.request_connection(&self.identity, &peer) {
                warn!(%peer, %err, "tie-break retry not issued");
            }
            return;
        }
        debug!(%peer, %name, %reason, "connection attempt failed");
    }

    /// A remote device asked to connect. Refuse when it is already anywhere
    /// in the chain: linking to it would close a loop. The refusal goes out
    /// as a disconnect, which the requester observes as a rejection.
    pub fn on_connection_requested(&mut self, peer: EndpointId) {
        if self.links.contains(&peer) {
            debug!(%peer, "refusing request from peer already in the chain");
            self.transport.disconnect(&peer);
            return;
        }
        debug!(%peer, "accepting connection request");
        if let Err(err) = self.transport.accept_connection(&peer) {
            debug!(%peer, %err, "accept failed");
        }
    }

    /// A link came up. The cycle guard runs again here because the chain may
    /// have grown to include this peer while the request was in flight; in
    /// that case the link is dropped before any slot is touched. Otherwise
    /// the peer takes the first free slot and both neighborhoods are told.
    pub fn on_connection_established(&mut self, peer: EndpointId) {
        if self.links.contains(&peer) {
            warn!(%peer, "link established to a peer already in the chain; dropping it");
            self.transport.disconnect(&peer);
            return;
        }
        let index = match self.links.assign(peer.clone()) {
            Ok(index) => index,
            Err(err) => {
                // Both slots filled while this request was in flight.
                warn!(%peer, %err, "no slot for established link; dropping it");
                self.transport.disconnect(&peer);
                return;
            }
        };
        info!(%peer, slot = %index, size = self.links.network_size(), "link established");

        // The newcomer learns everything on our far side, an empty set
        // meaning the far side is vacant; the far side learns the newcomer.
        self.send_control(&peer, self.links.slot(index.other()).reachable().clone());
        self.propagate(index);

        if self.links.is_full() && self.searching {
            debug!("both slots full; pausing advertising and discovery");
            self.pause_search();
        }
    }

    /// A neighbor announced the set of identities behind it.
    pub fn on_reachable_set_received(&mut self, from: EndpointId, ids: BTreeSet<EndpointId>) {
        if ids.contains(&self.identity) {
            warn!(%from, "announced set loops back to this device; breaking the link");
            self.transport.disconnect(&from);
            return;
        }
        match self.links.store_reachable(&from, ids) {
            Some(index) => {
                debug!(%from, slot = %index, size = self.links.network_size(), "reachable set updated");
                self.propagate(index);
            }
            None => debug!(%from, "announcement from a non-peer; discarding"),
        }
    }

    /// A link dropped, whether the remote left, the radio failed, or our own
    /// cycle-breaking disconnect echoed back.
    pub fn on_disconnected(&mut self, peer: EndpointId) {
        let Some(index) = self.links.clear(&peer) else {
            trace!(%peer, "disconnect for an unlinked peer; ignoring");
            return;
        };
        info!(%peer, slot = %index, size = self.links.network_size(), "link lost");
        // The empty set shrinks sizes all the way down the surviving branch.
        self.propagate(index);
        if !self.searching {
            debug!("slot freed; resuming advertising and discovery");
            self.resume_search();
        }
    }

    /// The one propagation rule: after any change to slot `changed`, its
    /// current set is sent to the other slot's peer. Skipping this anywhere
    /// leaves remote views permanently stale.
    fn propagate(&self, changed: SlotIndex) {
        if let Some(peer) = self.links.slot(changed.other()).peer() {
            let set = self.links.slot(changed).reachable().clone();
            self.send_control(peer, set);
        }
    }

    fn send_control(&self, peer: &EndpointId, set: BTreeSet<EndpointId>) {
        trace!(%peer, count = set.len(), "sending reachable-set announcement");
        match Envelope::ControlUpdate(set).encode() {
            Ok(bytes) => {
                if let Err(err) = self.transport.send_payload(peer, bytes.into()) {
                    warn!(%peer, %err, "announcement send failed");
                }
            }
            Err(err) => warn!(%peer, %err, "announcement did not encode"),
        }
    }

    fn pause_search(&mut self) {
        self.transport.stop_advertising();
        self.transport.stop_discovery();
        self.searching = false;
    }

    fn resume_search(&mut self) {
        self.transport.start_advertising(&self.identity);
        self.transport.start_discovery();
        self.searching = true;
    }
}

impl std::fmt::Debug for TopologyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyController")
            .field("identity", &self.identity)
            .field("links", &self.links)
            .field("searching", &self.searching)
            .finish_non_exhaustive()
    }
}
