use std::fmt;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::{error::Result, name::ChannelName};

/// Which of the two independent channel sets an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSet {
    /// Channels the bot should be joined to.
    Membership,
    /// Channels whose activity is observed.
    Watch,
}

impl ChannelSet {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::Watch => "watch",
        }
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted channel entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelEntry {
    pub id: i64,
    pub name: ChannelName,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Persistent storage for both channel sets.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Every entry of `set`, ordered by id.
    async fn list(&self, set: ChannelSet) -> Result<Vec<ChannelEntry>>;
    /// Insert `name`, or only bump `updated_at` when it is already present.
    async fn add(&self, set: ChannelSet, name: &ChannelName) -> Result<()>;
    /// Delete `name`. Returns whether an entry existed.
    async fn remove(&self, set: ChannelSet, name: &ChannelName) -> Result<bool>;
}
