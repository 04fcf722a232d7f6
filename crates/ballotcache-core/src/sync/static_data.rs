//! Bundled presidential results used when no other source is configured.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::models::{Candidate, ElectionRecord, Party};

use super::DatasetSource;

const FEC_SOURCE: &str = "Federal Election Commission";
const TOTAL_ELECTORAL_VOTES: u32 = 538;

/// Serves the built-in 2004-2020 results, oldest first as they were entered.
#[derive(Debug, Default, Clone)]
pub struct StaticDatasetSource;

impl DatasetSource for StaticDatasetSource {
    async fn load(&self) -> Result<Vec<ElectionRecord>> {
        Ok(static_elections())
    }
}

fn candidate(name: &str, party: Party, electoral_votes: u32, popular_votes: u64) -> Candidate {
    Candidate {
        name: name.to_string(),
        party,
        electoral_votes,
        popular_votes,
    }
}

fn record(
    year: u16,
    winner: Candidate,
    runner_up: Candidate,
    total_popular_votes: u64,
    turnout_percentage: f64,
) -> ElectionRecord {
    ElectionRecord {
        year,
        winner,
        runner_up,
        total_electoral_votes: TOTAL_ELECTORAL_VOTES,
        total_popular_votes,
        turnout_percentage,
        source: FEC_SOURCE.to_string(),
        state_results: BTreeMap::new(),
    }
}

pub fn static_elections() -> Vec<ElectionRecord> {
    use Party::{Democratic, Republican};

    vec![
        record(
            2004,
            candidate("George W. Bush", Republican, 286, 62_040_610),
            candidate("John Kerry", Democratic, 251, 59_028_444),
            121_069_054,
            60.1,
        ),
        record(
            2008,
            candidate("Barack Obama", Democratic, 365, 69_498_516),
            candidate("John McCain", Republican, 173, 59_948_323),
            129_446_839,
            61.6,
        ),
        record(
            2012,
            candidate("Barack Obama", Democratic, 332, 65_915_795),
            candidate("Mitt Romney", Republican, 206, 60_933_504),
            126_849_299,
            58.6,
        ),
        record(
            2016,
            candidate("Donald Trump", Republican, 304, 62_984_828),
            candidate("Hillary Clinton", Democratic, 227, 65_853_516),
            128_838_342,
            60.1,
        ),
        record(
            2020,
            candidate("Joe Biden", Democratic, 306, 81_283_098),
            candidate("Donald Trump", Republican, 232, 74_222_958),
            155_507_469,
            66.8,
        ),
    ]
}
