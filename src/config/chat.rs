//! Chat behaviour configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Which realtime transport carries message events between processes.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process broadcast; single server only.
    #[default]
    Memory,
    /// Redis pub/sub; required for more than one server.
    Redis,
}

/// Chat subsystem settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub transport: TransportKind,

    /// Per-channel buffer for the in-memory transport. A subscriber falling
    /// further behind is degraded and must re-fetch.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Put the text of a failed send back into the composer.
    #[serde(default)]
    pub restore_draft_on_failure: bool,
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_capacity == 0 || self.channel_capacity > 65_536 {
            return Err(ValidationError::InvalidChannelCapacity);
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            channel_capacity: default_channel_capacity(),
            restore_draft_on_failure: false,
        }
    }
}

fn default_channel_capacity() -> usize {
    128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.transport, TransportKind::Memory);
        assert_eq!(config.channel_capacity, 128);
        assert!(!config.restore_draft_on_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = ChatConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidChannelCapacity));
    }
}
