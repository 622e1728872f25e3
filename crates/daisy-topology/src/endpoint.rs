//! Device identity.

use std::fmt;

/// Opaque, process-unique identity of a device.
///
/// Chosen once at startup and stable for the device's lifetime. A device
/// advertises its identity as its name, embeds it as the origin of messages
/// it creates, and exchanges sets of identities to describe which devices
/// its side of the chain can reach.
///
/// Identities are totally ordered by plain lexicographic byte order; the
/// simultaneous-connection tie-break relies on that ordering and nothing
/// stronger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndpointId(pub String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EndpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_lexicographic() {
        let a = EndpointId::from("amber");
        let b = EndpointId::from("basalt");
        assert!(a < b);
        // Byte order, not human collation.
        assert!(EndpointId::from("Zed") < EndpointId::from("ash"));
    }

    #[test]
    fn display_round_trips() {
        let id = EndpointId::from("quartz-7");
        assert_eq!(id.to_string(), "quartz-7");
        assert_eq!(EndpointId::from(id.to_string()), id);
    }
}
