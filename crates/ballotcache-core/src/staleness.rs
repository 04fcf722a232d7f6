//! Tracks whether the canonical dataset is due for a refresh.
//!
//! The state is recomputed when the tracker is created and whenever a change
//! notification arrives for the last-update or dataset key. There is no
//! timer; a dataset that ages past the threshold while nothing is written
//! is only reported stale on the next [`StalenessTracker::refresh`].

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::{on_keys, Notifier};
use crate::store::{DatasetKey, Store, StoreError, ELECTION_DATA_KEY, LAST_UPDATE_KEY};

pub const DEFAULT_STALE_THRESHOLD_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    /// Raw ISO-8601 value of the last-update key.
    pub last_update: Option<String>,
    pub is_stale: bool,
}

/// Stale iff there was never an update or it is more than `threshold` old.
pub fn is_stale_at(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match last_update {
        Some(last) => now - last > threshold,
        None => true,
    }
}

fn parse_last_update(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = raw, error = %e, "Unreadable last update time, treating data as stale");
            None
        }
    }
}

pub struct StalenessTracker {
    store: Store,
    threshold: Duration,
    state: watch::Sender<Staleness>,
}

impl StalenessTracker {
    pub fn new(store: Store, threshold: Duration) -> Self {
        let initial = compute(&store, threshold, Utc::now());
        let (state, _) = watch::channel(initial);
        Self {
            store,
            threshold,
            state,
        }
    }

    pub fn current(&self) -> Staleness {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Staleness> {
        self.state.subscribe()
    }

    /// Re-read the last-update key and publish the result.
    pub fn refresh(&self) -> Staleness {
        let next = compute(&self.store, self.threshold, Utc::now());
        debug!(stale = next.is_stale, last_update = ?next.last_update, "Staleness recomputed");
        self.state.send_replace(next.clone());
        next
    }

    /// Record a refresh that happened outside a sync.
    pub fn mark_updated(&self) -> Result<Staleness, StoreError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.store.dataset().set_raw(DatasetKey::LastUpdate, &now)?;
        Ok(self.refresh())
    }

    /// Recompute on every notification for the last-update or dataset key.
    pub fn watch(self: &Arc<Self>, notifier: &dyn Notifier) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        on_keys(notifier, &[LAST_UPDATE_KEY, ELECTION_DATA_KEY], move |_event| {
            let tracker = Arc::clone(&tracker);
            async move {
                tracker.refresh();
            }
        })
    }
}

fn compute(store: &Store, threshold: Duration, now: DateTime<Utc>) -> Staleness {
    let last_update = match store.dataset().get_raw(DatasetKey::LastUpdate) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Could not read last update time");
            None
        }
    };
    let parsed = last_update.as_deref().and_then(parse_last_update);
    Staleness {
        is_stale: is_stale_at(parsed, now, threshold),
        last_update,
    }
}
