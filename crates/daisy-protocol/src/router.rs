//! Message flooding along the chain.
//!
//! A [`MessageRouter`] sends user text out every assigned slot except the
//! one a message arrived on. Because the topology is a path, not a general
//! graph, that single exclusion rule delivers each message exactly once to
//! every other device and terminates on its own.
//!
//! The router is also the data-plane cycle detector: a message whose origin
//! is this device came back around a loop the control plane has not broken
//! yet, and the link it arrived on is dropped. Two detectors on two signals,
//! one per plane.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use daisy_topology::{ChainLinks, EndpointId};
use daisy_transport::{PayloadId, Transport};
use tracing::{debug, trace, warn};

use crate::envelope::Envelope;

/// One flooded message, handed to the application for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub origin: EndpointId,
    pub text: String,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin, self.text)
    }
}

/// Flood counters, exposed read-only to the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodStats {
    /// Messages this device entered into the chain.
    pub originated: u64,
    /// Messages passed along on behalf of other devices.
    pub forwarded: u64,
    /// Payloads the transport confirmed delivered to a neighbor's radio.
    pub delivered: u64,
    /// Links dropped because our own message came back around.
    pub loops_broken: u64,
}

/// Floods data messages and keeps delivery-latency bookkeeping.
///
/// The router does not own the slots; the hosting actor lends it the
/// current [`ChainLinks`] on every call, so topology and routing can never
/// disagree about which links exist.
pub struct MessageRouter {
    identity: EndpointId,
    transport: Arc<dyn Transport>,
    /// Send instants keyed by payload id, awaiting delivery confirmations.
    in_flight: HashMap<PayloadId, Instant>,
    stats: FloodStats,
}

impl MessageRouter {
    pub fn new(identity: EndpointId, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            transport,
            in_flight: HashMap::new(),
            stats: FloodStats::default(),
        }
    }

    pub fn stats(&self) -> FloodStats {
        self.stats
    }

    /// Enter user text into the chain. The origin is this device, so the
    /// message goes out both links.
    pub fn send_text(&mut self, links: &ChainLinks, text: String) {
        debug!(len = text.len(), "originating message");
        self.stats.originated += 1;
        let envelope = Envelope::DataMessage {
            origin: self.identity.clone(),
            text,
        };
        self.flood(links, &envelope, None);
    }

    /// A data message arrived from the neighbor `from`.
    ///
    /// Returns the delivery for the application to display, or `None` when
    /// the message was our own coming back around a loop; in that case the
    /// offending link is dropped and nothing is forwarded.
    pub fn on_data_received(
        &mut self,
        links: &ChainLinks,
        from: EndpointId,
        origin: EndpointId,
        text: String,
    ) -> Option<Delivery> {
        if origin == self.identity {
            warn!(%from, "our own message came back around; breaking the link");
            self.stats.loops_broken += 1;
            self.transport.disconnect(&from);
            return None;
        }
        trace!(%from, %origin, "forwarding message");
        self.stats.forwarded += 1;
        let delivery = Delivery {
            origin: origin.clone(),
            text: text.clone(),
        };
        self.flood(links, &Envelope::DataMessage { origin, text }, Some(&from));
        Some(delivery)
    }

    /// Encode once, send to every assigned slot except `exclude`.
    pub fn flood(&mut self, links: &ChainLinks, envelope: &Envelope, exclude: Option<&EndpointId>) {
        let bytes = match envelope.encode() {
            Ok(bytes) => bytes::Bytes::from(bytes),
            Err(err) => {
                warn!(%err, "message did not encode");
                return;
            }
        };
        for peer in links.peers() {
            if Some(peer) == exclude {
                continue;
            }
            match self.transport.send_payload(peer, bytes.clone()) {
                Ok(payload) => {
                    trace!(%peer, payload, "payload enqueued");
                    self.in_flight.insert(payload, Instant::now());
                }
                Err(err) => warn!(%peer, %err, "payload send failed"),
            }
        }
    }

    /// The transport confirmed a payload reached the neighbor's radio.
    /// Unknown ids belong to control traffic or a link's earlier life and
    /// are ignored.
    pub fn on_payload_delivered(&mut self, payload: PayloadId, timestamp_ms: u64) {
        if let Some(sent) = self.in_flight.remove(&payload) {
            self.stats.delivered += 1;
            debug!(
                payload,
                timestamp_ms,
                elapsed_us = sent.elapsed().as_micros() as u64,
                "payload delivered"
            );
        }
    }
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("identity", &self.identity)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
