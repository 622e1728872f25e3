//! Event and error types shared by every transport.

use bytes::Bytes;
use daisy_topology::EndpointId;
use thiserror::Error;

/// Transport-scoped identifier for one enqueued payload. Used to pair a
/// send with its later delivery confirmation.
pub type PayloadId = u64;

/// Everything a transport reports back to its device.
///
/// Events arrive on a queue and are consumed one at a time by the device's
/// actor; the transport never calls back into protocol state directly.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An advertising device came into range. `name` is the identity it
    /// advertises, which is also what a well-behaved radio uses as `peer`.
    PeerFound { peer: EndpointId, name: EndpointId },
    /// A previously found advertiser went away.
    PeerLost { peer: EndpointId },
    /// A remote device asked to connect; answer with `accept_connection`
    /// or `disconnect`.
    ConnectionRequested { peer: EndpointId },
    /// An outgoing connection request failed. `name` is the advertised
    /// identity of the peer, carried so the tie-break can compare it.
    ConnectionFailed {
        peer: EndpointId,
        name: EndpointId,
        reason: ConnectError,
    },
    /// A link is up. Both ends observe this.
    Connected { peer: EndpointId },
    /// A link dropped. Both ends observe this, including the end that
    /// called `disconnect`.
    Disconnected { peer: EndpointId },
    /// A payload arrived from a directly linked peer.
    PayloadReceived { peer: EndpointId, bytes: Bytes },
    /// A previously sent payload reached the peer's radio.
    PayloadDelivered { payload: PayloadId, timestamp_ms: u64 },
}

/// Why a connection attempt did not produce a link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Both devices requested each other at once and the radio failed both
    /// requests. Exactly one side should retry.
    #[error("simultaneous connection requests collided")]
    SimultaneousConflict,
    /// The remote refused the request.
    #[error("remote refused the connection")]
    Rejected,
    /// The target is not visible over the radio.
    #[error("peer is not reachable")]
    UnknownPeer,
    /// A link or an outstanding request to this peer already exists.
    #[error("connection to this peer already exists or is pending")]
    AlreadyPending,
    /// Accept was called with no request outstanding.
    #[error("no pending request from this peer")]
    NoPendingRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("no live link to this peer")]
    NotConnected,
}
