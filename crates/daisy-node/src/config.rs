//! Node configuration.

use daisy_topology::EndpointId;

use crate::error::{Error, Result};

/// Configuration for one chain device.
///
/// The identity is chosen by the embedding application (device naming is
/// not this system's concern) and must be unique within the radio
/// neighborhood for the device's lifetime.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This device's identity, advertised as its name.
    pub identity: EndpointId,

    /// Capacity of the broadcast channel carrying displayed messages to
    /// application subscribers. Slow subscribers that fall further behind
    /// than this lose the oldest messages, not the node.
    pub delivery_buffer: usize,
}

impl NodeConfig {
    pub fn new(identity: impl Into<EndpointId>) -> Self {
        Self {
            identity: identity.into(),
            delivery_buffer: 64,
        }
    }

    /// Builds a config from `DAISY_IDENTITY` and, optionally,
    /// `DAISY_DELIVERY_BUFFER`.
    pub fn from_env() -> Result<Self> {
        let identity = std::env::var("DAISY_IDENTITY")
            .map_err(|_| Error::MissingEnv("DAISY_IDENTITY"))?;
        let mut config = Self::new(identity);
        if let Ok(value) = std::env::var("DAISY_DELIVERY_BUFFER") {
            config.delivery_buffer = value.parse().map_err(|_| Error::InvalidEnv {
                name: "DAISY_DELIVERY_BUFFER",
                value,
            })?;
        }
        Ok(config)
    }

    /// Set the delivery broadcast capacity.
    #[must_use]
    pub fn with_delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = NodeConfig::new("ash");
        assert_eq!(config.identity, EndpointId::from("ash"));
        assert!(config.delivery_buffer > 0);
    }

    #[test]
    fn builder_overrides_buffer() {
        let config = NodeConfig::new("ash").with_delivery_buffer(8);
        assert_eq!(config.delivery_buffer, 8);
    }
}
