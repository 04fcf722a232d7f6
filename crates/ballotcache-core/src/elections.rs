//! Read side of the canonical election dataset.
//!
//! Readers prefer the dataset written by the last sync and fall back to the
//! bundled results when nothing has been synced yet.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{ElectionRecord, StoredDataset};
use crate::notify::{on_keys, Notifier};
use crate::store::{DatasetKey, Store, ELECTION_DATA_KEY};
use crate::sync::static_data::static_elections;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Election data not available for {0}")]
    YearUnavailable(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Stored,
    Bundled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElectionData {
    pub origin: DataOrigin,
    /// Most recent first.
    pub elections: Vec<ElectionRecord>,
}

impl ElectionData {
    /// Load the stored dataset, or the bundled results when none is stored
    /// or the stored one cannot be read.
    pub fn load(store: &Store) -> Self {
        match store.dataset().get::<StoredDataset>(DatasetKey::Elections) {
            Ok(Some(dataset)) => {
                return Self {
                    origin: DataOrigin::Stored,
                    elections: dataset.elections,
                }
            }
            Ok(None) => debug!("No stored election data, using bundled results"),
            Err(e) => warn!(error = %e, "Stored election data unreadable, using bundled results"),
        }

        let mut elections = static_elections();
        elections.sort_by(|a, b| b.year.cmp(&a.year));
        Self {
            origin: DataOrigin::Bundled,
            elections,
        }
    }

    pub fn years(&self) -> Vec<u16> {
        self.elections.iter().map(|e| e.year).collect()
    }

    pub fn get(&self, year: u16) -> Result<&ElectionRecord, DataError> {
        self.elections
            .iter()
            .find(|e| e.year == year)
            .ok_or(DataError::YearUnavailable(year))
    }

    /// Pick the primary and comparison elections; the primary year is
    /// reported first when both are missing.
    pub fn select(&self, primary: u16, comparison: u16) -> Result<Comparison<'_>, DataError> {
        Ok(Comparison {
            primary: self.get(primary)?,
            comparison: self.get(comparison)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison<'a> {
    pub primary: &'a ElectionRecord,
    pub comparison: &'a ElectionRecord,
}

impl Comparison<'_> {
    /// Turnout change in percentage points, primary minus comparison.
    pub fn turnout_change(&self) -> f64 {
        self.primary.turnout_percentage - self.comparison.turnout_percentage
    }

    pub fn popular_vote_growth(&self) -> i64 {
        self.primary.total_popular_votes as i64 - self.comparison.total_popular_votes as i64
    }

    pub fn same_winning_party(&self) -> bool {
        self.primary.winner.party == self.comparison.winner.party
    }
}

/// Keeps an [`ElectionData`] current as syncs land.
pub struct ElectionWatcher {
    store: Store,
    data: watch::Sender<ElectionData>,
}

impl ElectionWatcher {
    pub fn new(store: Store) -> Self {
        let (data, _) = watch::channel(ElectionData::load(&store));
        Self { store, data }
    }

    pub fn current(&self) -> ElectionData {
        self.data.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ElectionData> {
        self.data.subscribe()
    }

    pub fn reload(&self) {
        self.data.send_replace(ElectionData::load(&self.store));
    }

    /// Reload whenever the dataset key changes.
    pub fn watch(self: &Arc<Self>, notifier: &dyn Notifier) -> JoinHandle<()> {
        let watcher = Arc::clone(self);
        on_keys(notifier, &[ELECTION_DATA_KEY], move |_event| {
            let watcher = Arc::clone(&watcher);
            async move {
                watcher.reload();
            }
        })
    }
}
