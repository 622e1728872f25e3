//! In-process radio neighborhood.
//!
//! One [`RadioHub`] models the shared airspace of a test or simulation;
//! every device that joins it gets a [`MemoryRadio`] handle plus the event
//! queue its actor consumes. The hub reproduces the behaviors the protocol
//! has to survive on a real proximity radio:
//!
//! - discovery is symmetric and continuous: advertisers are reported to
//!   every discoverer, late starters included
//! - two devices requesting each other at the same time fail *both*
//!   requests with [`ConnectError::SimultaneousConflict`]
//! - both ends of a dropped link observe `Disconnected`, the initiator too
//! - payload delivery is confirmed to the sender with a payload id
//!
//! Within this hub a device's endpoint id is its identity string.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use daisy_topology::EndpointId;
use tokio::sync::mpsc;
use tracing::trace;

use crate::transport::Transport;
use crate::types::{ConnectError, PayloadId, SendError, TransportEvent};

#[derive(Debug)]
struct DeviceState {
    events: mpsc::UnboundedSender<TransportEvent>,
    advertised: Option<EndpointId>,
    discovering: bool,
    links: BTreeSet<EndpointId>,
}

#[derive(Debug, Default)]
struct HubState {
    devices: HashMap<EndpointId, DeviceState>,
    /// Outstanding connection requests, keyed (requester, target).
    pending: BTreeSet<(EndpointId, EndpointId)>,
    next_payload: PayloadId,
}

impl HubState {
    /// Advertised name of `id`, falling back to the id itself.
    fn name_of(&self, id: &EndpointId) -> EndpointId {
        self.devices
            .get(id)
            .and_then(|d| d.advertised.clone())
            .unwrap_or_else(|| id.clone())
    }

    fn push(&self, to: &EndpointId, event: TransportEvent) {
        if let Some(device) = self.devices.get(to) {
            // The receiver may already be gone; departures are normal here.
            let _ = device.events.send(event);
        }
    }
}

/// Shared airspace for a set of [`MemoryRadio`] devices.
#[derive(Debug, Clone, Default)]
pub struct RadioHub {
    inner: Arc<Mutex<HubState>>,
}

impl RadioHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device to the neighborhood. Returns its radio handle and the
    /// queue its events arrive on. Neither advertising nor discovery is
    /// active until the device turns them on.
    pub fn join(&self, id: EndpointId) -> (MemoryRadio, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut hub = self.inner.lock().unwrap();
        hub.devices.insert(
            id.clone(),
            DeviceState {
                events: tx,
                advertised: None,
                discovering: false,
                links: BTreeSet::new(),
            },
        );
        (MemoryRadio { hub: self.inner.clone(), id }, rx)
    }

    /// Removes a device abruptly, as if it walked out of range: link
    /// partners observe `Disconnected`, discoverers observe `PeerLost`,
    /// pending requests involving it evaporate.
    pub fn power_off(&self, id: &EndpointId) {
        let mut hub = self.inner.lock().unwrap();
        let Some(device) = hub.devices.remove(id) else {
            return;
        };
        for peer in &device.links {
            if let Some(p) = hub.devices.get_mut(peer) {
                p.links.remove(id);
            }
            hub.push(peer, TransportEvent::Disconnected { peer: id.clone() });
        }
        if device.advertised.is_some() {
            let discoverers: Vec<EndpointId> = hub
                .devices
                .iter()
                .filter(|(_, d)| d.discovering)
                .map(|(other, _)| other.clone())
                .collect();
            for other in discoverers {
                hub.push(&other, TransportEvent::PeerLost { peer: id.clone() });
            }
        }
        hub.pending.retain(|(a, b)| a != id && b != id);
    }

    /// Current live links as normalized pairs, for topology assertions.
    pub fn link_snapshot(&self) -> Vec<(EndpointId, EndpointId)> {
        let hub = self.inner.lock().unwrap();
        let mut pairs: Vec<(EndpointId, EndpointId)> = Vec::new();
        for (id, device) in &hub.devices {
            for peer in &device.links {
                if id < peer {
                    pairs.push((id.clone(), peer.clone()));
                }
            }
        }
        pairs.sort();
        pairs
    }

    pub fn device_count(&self) -> usize {
        self.inner.lock().unwrap().devices.len()
    }
}

/// One device's handle onto a [`RadioHub`].
#[derive(Debug, Clone)]
pub struct MemoryRadio {
    hub: Arc<Mutex<HubState>>,
    id: EndpointId,
}

impl MemoryRadio {
    pub fn id(&self) -> &EndpointId {
        &self.id
    }
}

impl Transport for MemoryRadio {
    fn start_advertising(&self, name: &EndpointId) {
        let mut hub = self.hub.lock().unwrap();
        if let Some(device) = hub.devices.get_mut(&self.id) {
            device.advertised = Some(name.clone());
        }
        let discoverers: Vec<EndpointId> = hub
            .devices
            .iter()
            .filter(|(other, d)| **other != self.id && d.discovering)
            .map(|(other, _)| other.clone())
            .collect();
        for other in discoverers {
            hub.push(
                &other,
                TransportEvent::PeerFound { peer: self.id.clone(), name: name.clone() },
            );
        }
    }

    fn stop_advertising(&self) {
        let mut hub = self.hub.lock().unwrap();
        let was_advertising = match hub.devices.get_mut(&self.id) {
            Some(device) => device.advertised.take().is_some(),
            None => false,
        };
        if !was_advertising {
            return;
        }
        let discoverers: Vec<EndpointId> = hub
            .devices
            .iter()
            .filter(|(other, d)| **other != self.id && d.discovering)
            .map(|(other, _)| other.clone())
            .collect();
        for other in discoverers {
            hub.push(&other, TransportEvent::PeerLost { peer: self.id.clone() });
        }
    }

    fn start_discovery(&self) {
        let mut hub = self.hub.lock().unwrap();
        if let Some(device) = hub.devices.get_mut(&self.id) {
            device.discovering = true;
        }
        let advertisers: Vec<(EndpointId, EndpointId)> = hub
            .devices
            .iter()
            .filter(|(other, _)| **other != self.id)
            .filter_map(|(other, d)| d.advertised.clone().map(|name| (other.clone(), name)))
            .collect();
        for (peer, name) in advertisers {
            hub.push(&self.id, TransportEvent::PeerFound { peer, name });
        }
    }

    fn stop_discovery(&self) {
        let mut hub = self.hub.lock().unwrap();
        if let Some(device) = hub.devices.get_mut(&self.id) {
            device.discovering = false;
        }
    }

    fn request_connection(&self, name: &EndpointId, peer: &EndpointId) -> Result<(), ConnectError> {
        let mut hub = self.hub.lock().unwrap();
        if *peer == self.id || !hub.devices.contains_key(peer) {
            return Err(ConnectError::UnknownPeer);
        }
        let linked = hub.devices.get(&self.id).is_some_and(|d| d.links.contains(peer));
        if linked || hub.pending.contains(&(self.id.clone(), peer.clone())) {
            return Err(ConnectError::AlreadyPending);
        }

        // Crossed requests: the radio fails both sides and lets the
        // tie-break upstairs decide who tries again.
        if hub.pending.remove(&(peer.clone(), self.id.clone())) {
            trace!(a = %self.id, b = %peer, "crossed connection requests");
            let peer_name = hub.name_of(peer);
            hub.push(
                &self.id,
                TransportEvent::ConnectionFailed {
                    peer: peer.clone(),
                    name: peer_name,
                    reason: ConnectError::SimultaneousConflict,
                },
            );
            hub.push(
                peer,
                TransportEvent::ConnectionFailed {
                    peer: self.id.clone(),
                    name: name.clone(),
                    reason: ConnectError::SimultaneousConflict,
                },
            );
            return Ok(());
        }

        hub.pending.insert((self.id.clone(), peer.clone()));
        hub.push(peer, TransportEvent::ConnectionRequested { peer: self.id.clone() });
        Ok(())
    }

    fn accept_connection(&self, peer: &EndpointId) -> Result<(), ConnectError> {
        let mut hub = self.hub.lock().unwrap();
        if !hub.pending.remove(&(peer.clone(), self.id.clone())) {
            return Err(ConnectError::NoPendingRequest);
        }
        if let Some(device) = hub.devices.get_mut(&self.id) {
            device.links.insert(peer.clone());
        }
        if let Some(device) = hub.devices.get_mut(peer) {
            device.links.insert(self.id.clone());
        }
        hub.push(peer, TransportEvent::Connected { peer: self.id.clone() });
        hub.push(&self.id, TransportEvent::Connected { peer: peer.clone() });
        Ok(())
    }

    fn disconnect(&self, peer: &EndpointId) {
        let mut hub = self.hub.lock().unwrap();

        // Refusing a request that was never accepted.
        if hub.pending.remove(&(peer.clone(), self.id.clone())) {
            let own_name = hub.name_of(&self.id);
            hub.push(
                peer,
                TransportEvent::ConnectionFailed {
                    peer: self.id.clone(),
                    name: own_name,
                    reason: ConnectError::Rejected,
                },
            );
        }
        // Withdrawing our own unanswered request.
        hub.pending.remove(&(self.id.clone(), peer.clone()));

        let linked = match hub.devices.get_mut(&self.id) {
            Some(device) => device.links.remove(peer),
            None => false,
        };
        if linked {
            if let Some(device) = hub.devices.get_mut(peer) {
                device.links.remove(&self.id);
            }
            hub.push(peer, TransportEvent::Disconnected { peer: self.id.clone() });
            hub.push(&self.id, TransportEvent::Disconnected { peer: peer.clone() });
        }
    }

    fn send_payload(&self, peer: &EndpointId, bytes: Bytes) -> Result<PayloadId, SendError> {
        let mut hub = self.hub.lock().unwrap();
        let linked = hub.devices.get(&self.id).is_some_and(|d| d.links.contains(peer));
        if !linked {
            return Err(SendError::NotConnected);
        }
        let payload = hub.next_payload;
        hub.next_payload += 1;
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        hub.push(peer, TransportEvent::PayloadReceived { peer: self.id.clone(), bytes });
        hub.push(&self.id, TransportEvent::PayloadDelivered { payload, timestamp_ms });
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> EndpointId {
        EndpointId::from(name)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Vec<TransportEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn discovery_is_symmetric_and_continuous() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));

        alpha.start_advertising(&id("alpha"));
        alpha.start_discovery();
        // Briar starts later and must still find alpha.
        briar.start_discovery();
        briar.start_advertising(&id("briar"));

        let found = drain(&mut briar_rx);
        assert!(matches!(
            &found[..],
            [TransportEvent::PeerFound { peer, name }] if *peer == id("alpha") && *name == id("alpha")
        ));
        let found = drain(&mut alpha_rx);
        assert!(matches!(
            &found[..],
            [TransportEvent::PeerFound { peer, .. }] if *peer == id("briar")
        ));
    }

    #[tokio::test]
    async fn request_accept_links_both_sides() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));

        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        assert!(matches!(
            briar_rx.try_recv().unwrap(),
            TransportEvent::ConnectionRequested { peer } if peer == id("alpha")
        ));

        briar.accept_connection(&id("alpha")).unwrap();
        assert!(matches!(
            alpha_rx.try_recv().unwrap(),
            TransportEvent::Connected { peer } if peer == id("briar")
        ));
        assert!(matches!(
            briar_rx.try_recv().unwrap(),
            TransportEvent::Connected { peer } if peer == id("alpha")
        ));
        assert_eq!(hub.link_snapshot(), vec![(id("alpha"), id("briar"))]);
    }

    #[tokio::test]
    async fn crossed_requests_fail_both_sides() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));

        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        briar.request_connection(&id("briar"), &id("alpha")).unwrap();

        // Briar's queue: alpha's request, then the collision report.
        let events = drain(&mut briar_rx);
        assert!(matches!(
            events.last(),
            Some(TransportEvent::ConnectionFailed {
                reason: ConnectError::SimultaneousConflict,
                name,
                ..
            }) if *name == id("alpha")
        ));
        let events = drain(&mut alpha_rx);
        assert!(matches!(
            events.last(),
            Some(TransportEvent::ConnectionFailed {
                reason: ConnectError::SimultaneousConflict,
                name,
                ..
            }) if *name == id("briar")
        ));
        // The collision consumed both requests; a fresh one goes through.
        assert!(alpha.request_connection(&id("alpha"), &id("briar")).is_ok());
        assert!(matches!(
            briar_rx.try_recv().unwrap(),
            TransportEvent::ConnectionRequested { .. }
        ));
    }

    #[tokio::test]
    async fn refusal_reports_rejected() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, _briar_rx) = hub.join(id("briar"));

        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        briar.disconnect(&id("alpha"));

        assert!(matches!(
            alpha_rx.try_recv().unwrap(),
            TransportEvent::ConnectionFailed { reason: ConnectError::Rejected, .. }
        ));
        assert!(hub.link_snapshot().is_empty());
    }

    #[tokio::test]
    async fn disconnect_echoes_to_both_ends() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));
        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        briar.accept_connection(&id("alpha")).unwrap();
        drain(&mut alpha_rx);
        drain(&mut briar_rx);

        alpha.disconnect(&id("briar"));
        assert!(matches!(
            alpha_rx.try_recv().unwrap(),
            TransportEvent::Disconnected { peer } if peer == id("briar")
        ));
        assert!(matches!(
            briar_rx.try_recv().unwrap(),
            TransportEvent::Disconnected { peer } if peer == id("alpha")
        ));
        assert!(hub.link_snapshot().is_empty());

        // Idempotent.
        alpha.disconnect(&id("briar"));
        assert!(alpha_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn payloads_deliver_and_confirm() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));
        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        briar.accept_connection(&id("alpha")).unwrap();
        drain(&mut alpha_rx);
        drain(&mut briar_rx);

        let payload = alpha.send_payload(&id("briar"), Bytes::from_static(b"hi")).unwrap();
        assert!(matches!(
            briar_rx.try_recv().unwrap(),
            TransportEvent::PayloadReceived { peer, bytes }
                if peer == id("alpha") && bytes.as_ref() == b"hi"
        ));
        assert!(matches!(
            alpha_rx.try_recv().unwrap(),
            TransportEvent::PayloadDelivered { payload: p, .. } if p == payload
        ));

        // No link, no send.
        let (carob, _carob_rx) = hub.join(id("carob"));
        assert_eq!(
            carob.send_payload(&id("alpha"), Bytes::from_static(b"x")),
            Err(SendError::NotConnected)
        );
    }

    #[tokio::test]
    async fn power_off_severs_links_and_discovery() {
        let hub = RadioHub::new();
        let (alpha, mut alpha_rx) = hub.join(id("alpha"));
        let (briar, mut briar_rx) = hub.join(id("briar"));
        alpha.start_discovery();
        briar.start_advertising(&id("briar"));
        alpha.request_connection(&id("alpha"), &id("briar")).unwrap();
        briar.accept_connection(&id("alpha")).unwrap();
        drain(&mut alpha_rx);
        drain(&mut briar_rx);

        hub.power_off(&id("briar"));
        let events = drain(&mut alpha_rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, TransportEvent::Disconnected { peer } if *peer == id("briar"))));
        assert!(events
            .iter()
            .any(|e| matches!(e, TransportEvent::PeerLost { peer } if *peer == id("briar"))));
        assert_eq!(hub.device_count(), 1);
    }
}
