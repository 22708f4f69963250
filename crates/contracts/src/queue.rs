//! Bounded queue policy and statistics

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TwinError;

/// What a full queue does with a new item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest item, admit the new one
    #[default]
    DropOldest,
    /// Discard the new item
    DropNewest,
    /// Wait for space up to the put timeout
    Block,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowPolicy {
    type Err = TwinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            "block" => Ok(Self::Block),
            other => Err(TwinError::configuration(format!(
                "invalid overflow policy '{other}', expected one of drop_oldest, drop_newest, block"
            ))
            .with_detail("policy", other)),
        }
    }
}

/// Point-in-time queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub size: usize,
    pub capacity: usize,
    /// Cumulative items discarded by an overflow policy
    pub dropped: u64,
    /// Cumulative put attempts, whatever their outcome
    pub total_put: u64,
    pub overflow_policy: OverflowPolicy,
}
