use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ElectionRecord;

/// Format version written with every stored dataset.
pub const DATASET_VERSION: &str = "1.0";

/// The canonical election dataset as persisted by a sync.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDataset {
    /// Milliseconds since the Unix epoch when the dataset was written.
    pub timestamp: i64,
    /// Most recent election first.
    pub elections: Vec<ElectionRecord>,
    pub version: String,
}

impl StoredDataset {
    /// Wrap `elections` for storage, sorting them most recent first.
    pub fn new(mut elections: Vec<ElectionRecord>) -> Self {
        elections.sort_by(|a, b| b.year.cmp(&a.year));
        Self {
            timestamp: Utc::now().timestamp_millis(),
            elections,
            version: DATASET_VERSION.to_string(),
        }
    }

    pub fn years(&self) -> Vec<u16> {
        self.elections.iter().map(|e| e.year).collect()
    }
}
