//! Daisy Chain Topology
//!
//! Degree-capped link bookkeeping for devices that self-assemble into a
//! single connected chain. Each device owns exactly two peer slots; a slot
//! holds one directly connected peer together with the set of every identity
//! reachable through that peer.
//!
//! # Why two slots
//!
//! Capping every device at two links makes the only connected shapes a
//! simple path (or, transiently, a forest of paths). A path has no redundant
//! routes, so flooding a payload down both links delivers it exactly once to
//! every other device, and the size of the whole network is computable
//! locally: everything beyond slot A, plus everything beyond slot B, plus
//! this device.
//!
//! # Reachable sets
//!
//! A slot's reachable set always contains its own peer. When a replacement
//! set arrives from that peer it is stored as `ids ∪ {peer}`, so the direct
//! link can never be forgotten by a sloppy update. An identity showing up in
//! a received set that equals the *receiving* device is the signature of a
//! cycle; detecting and acting on that belongs to the protocol layer, but
//! the membership primitives live here.

mod endpoint;
mod links;
mod slot;

pub use endpoint::EndpointId;
pub use links::{ChainLinks, LinkError, SlotIndex};
pub use slot::PeerSlot;

/// Maximum simultaneous links per device (invariant: always 2).
pub const MAX_LINKS: usize = 2;

// Chain shape depends on the degree cap; a third slot would allow branching.
const _: () = assert!(MAX_LINKS == 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_cap_is_two() {
        assert_eq!(MAX_LINKS, 2);
    }
}
