use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    Democratic,
    Republican,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub name: String,
    pub party: Party,
    pub electoral_votes: u32,
    pub popular_votes: u64,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartyVotes {
    pub democratic: u64,
    pub republican: u64,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResult {
    pub winner: String,
    pub winner_party: Party,
    pub electoral_votes: u32,
    pub popular_votes: PartyVotes,
    pub turnout: f64,
    pub margin: f64,
}

/// One presidential election, keyed by year.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionRecord {
    pub year: u16,
    pub winner: Candidate,
    pub runner_up: Candidate,
    pub total_electoral_votes: u32,
    pub total_popular_votes: u64,
    pub turnout_percentage: f64,
    pub source: String,
    /// Two-letter state code to that state's result.
    #[serde(default)]
    pub state_results: BTreeMap<String, StateResult>,
}

impl ElectionRecord {
    /// Winner's popular vote lead over the runner-up, in percentage points
    /// of the total popular vote.
    pub fn popular_margin(&self) -> f64 {
        if self.total_popular_votes == 0 {
            return 0.0;
        }
        let diff = self.winner.popular_votes as f64 - self.runner_up.popular_votes as f64;
        diff / self.total_popular_votes as f64 * 100.0
    }

    pub fn electoral_margin(&self) -> i64 {
        self.winner.electoral_votes as i64 - self.runner_up.electoral_votes as i64
    }
}
