//! The transport trait the topology layer drives.

use bytes::Bytes;
use daisy_topology::EndpointId;

use crate::types::{ConnectError, PayloadId, SendError};

/// Commands a device issues to its radio.
///
/// Implementations use interior mutability; every method takes `&self` and
/// returns without blocking on any remote device. Errors returned here are
/// immediate local failures only. Failures that the radio discovers later,
/// including the simultaneous-request collision, arrive asynchronously as
/// [`TransportEvent::ConnectionFailed`](crate::TransportEvent::ConnectionFailed).
pub trait Transport: Send + Sync {
    /// Begin advertising `name` to nearby discoverers.
    fn start_advertising(&self, name: &EndpointId);

    fn stop_advertising(&self);

    /// Begin reporting nearby advertisers via
    /// [`TransportEvent::PeerFound`](crate::TransportEvent::PeerFound).
    fn start_discovery(&self);

    fn stop_discovery(&self);

    /// Ask `peer` to connect, presenting `name` as our identity.
    fn request_connection(&self, name: &EndpointId, peer: &EndpointId) -> Result<(), ConnectError>;

    /// Accept the pending request from `peer`.
    fn accept_connection(&self, peer: &EndpointId) -> Result<(), ConnectError>;

    /// Drop the link to `peer`, or refuse its pending request. Idempotent;
    /// unknown peers are ignored.
    fn disconnect(&self, peer: &EndpointId);

    /// Enqueue `bytes` for delivery to the directly linked `peer`. Returns
    /// the payload id that the later delivery confirmation will carry.
    fn send_payload(&self, peer: &EndpointId, bytes: Bytes) -> Result<PayloadId, SendError>;
}
