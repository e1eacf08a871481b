use std::time::Duration;

use crate::net::{Hello, MAX_PAYLOAD_SIZE, Message, MessageError};
use crate::session::DEFAULT_PING_INTERVAL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("hello is {size} bytes encoded, the limit is {limit}")]
    HelloTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Encode(#[from] MessageError),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub player_name: String,
    pub client_version: String,
    pub ping_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            player_name: "Wally".to_string(),
            client_version: "0.1.0".to_string(),
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn hello(&self) -> Message {
        Message::Hello(Hello {
            player_name: self.player_name.clone(),
            client_version: self.client_version.clone(),
        })
    }

    /// Checks that the greeting built from this config fits in one datagram.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let size = self.hello().encode()?.len();
        if size > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::HelloTooLarge {
                size,
                limit: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_oversized_name_rejected() {
        let config = ClientConfig {
            player_name: "w".repeat(MAX_PAYLOAD_SIZE),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HelloTooLarge { size, limit }) if size > limit
        ));
    }

    #[test]
    fn test_oversized_version_rejected() {
        let config = ClientConfig {
            client_version: "9".repeat(MAX_PAYLOAD_SIZE),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
