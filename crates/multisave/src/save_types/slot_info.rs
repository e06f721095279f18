use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Quick-access slot metadata, written at the start of every save.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct SlotInfo {
    pub name: String,
    /// Unix epoch seconds.
    pub timestamp: u64,
    /// Canonical name of the level the slot was saved in.
    pub level: String,
    pub players: Vec<String>,
}

impl SlotInfo {
    pub fn now(name: &str, level: &str, players: Vec<String>) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            name: name.to_string(),
            timestamp,
            level: level.to_string(),
            players,
        }
    }
}
