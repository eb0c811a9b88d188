//! Session configuration.

use serde::Deserialize;

/// Default capacity of each session queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration for session behavior.
///
/// The outbound capacity is the backpressure bound: once that many packets
/// are waiting for the write loop, [`Session::send`](crate::Session::send)
/// waits for room.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Decoded packets buffered ahead of the handler. Default: 100.
    pub inbound_capacity: usize,
    /// Packets buffered ahead of the socket. Default: 100.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Session::new`](crate::Session::new).
    /// Zero capacities are raised to 1.
    pub fn validated(mut self) -> Self {
        if self.inbound_capacity == 0 {
            tracing::warn!("inbound_capacity of 0 is invalid, using 1");
            self.inbound_capacity = 1;
        }
        if self.outbound_capacity == 0 {
            tracing::warn!("outbound_capacity of 0 is invalid, using 1");
            self.outbound_capacity = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities_are_100() {
        let config = SessionConfig::default();
        assert_eq!(config.inbound_capacity, 100);
        assert_eq!(config.outbound_capacity, 100);
    }

    #[test]
    fn test_validated_raises_zero_capacities() {
        let config = SessionConfig {
            inbound_capacity: 0,
            outbound_capacity: 0,
        }
        .validated();
        assert_eq!(config.inbound_capacity, 1);
        assert_eq!(config.outbound_capacity, 1);
    }

    #[test]
    fn test_deserialize_partial_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "outbound_capacity": 8 }"#).unwrap();
        assert_eq!(config.outbound_capacity, 8);
        assert_eq!(config.inbound_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
