//! Lobby configuration.

use std::time::Duration;

/// Settings for the coordinator.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// How long a finished session stays registered after `game-over`, so
    /// clients can show the result before the session is torn down.
    pub grace_delay: Duration,

    /// Capacity of the coordinator's command channel. Senders wait when it
    /// is full.
    pub command_buffer: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(5),
            command_buffer: 256,
        }
    }
}

impl LobbyConfig {
    /// Default settings with a different grace delay.
    pub fn with_grace_delay(grace_delay: Duration) -> Self {
        Self {
            grace_delay,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.grace_delay, Duration::from_secs(5));
        assert_eq!(config.command_buffer, 256);
    }

    #[test]
    fn test_with_grace_delay_keeps_other_defaults() {
        let config = LobbyConfig::with_grace_delay(Duration::from_millis(50));
        assert_eq!(config.grace_delay, Duration::from_millis(50));
        assert_eq!(config.command_buffer, 256);
    }
}
