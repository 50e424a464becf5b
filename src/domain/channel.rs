// Channel (lane) identifiers and the configured catalog of valid channels
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_CHANNEL: &str = "lane_1";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("channel list is empty")]
    Empty,
    #[error("channel names must not be blank")]
    BlankName,
    #[error("channel {0} is listed more than once")]
    Duplicate(String),
    #[error("default channel {0} is not in the channel list")]
    DefaultNotListed(String),
}

/// The externally configured set of channels a dashboard may select
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    channels: Vec<ChannelId>,
    default_channel: ChannelId,
}

impl ChannelCatalog {
    pub fn new(channels: Vec<String>, default_channel: &str) -> Result<Self, CatalogError> {
        if channels.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids: Vec<ChannelId> = Vec::with_capacity(channels.len());
        for name in channels {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::BlankName);
            }
            if ids.iter().any(|id| id.0 == name) {
                return Err(CatalogError::Duplicate(name));
            }
            ids.push(ChannelId(name));
        }

        let default_channel = ids
            .iter()
            .find(|id| id.0 == default_channel.trim())
            .cloned()
            .ok_or_else(|| CatalogError::DefaultNotListed(default_channel.to_string()))?;

        Ok(Self {
            channels: ids,
            default_channel,
        })
    }

    /// Look up a channel by name
    pub fn resolve(&self, name: &str) -> Option<ChannelId> {
        self.channels.iter().find(|id| id.0 == name).cloned()
    }

    pub fn contains(&self, channel: &ChannelId) -> bool {
        self.channels.contains(channel)
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn default_channel(&self) -> &ChannelId {
        &self.default_channel
    }
}
