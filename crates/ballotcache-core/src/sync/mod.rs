//! Bulk refresh of the canonical election dataset.
//!
//! A sync loads the full dataset from a [`DatasetSource`], stores it sorted
//! most recent first, stamps the update time, drops every cached API
//! response and finally tells subscribers the dataset changed. The writes
//! happen in that order so anyone reacting to the notification sees the
//! finished state. If any write fails the previous dataset and timestamps
//! are put back and the error is returned; nothing is retried.

pub mod static_data;

use std::fmt;
use std::future::Future;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::{ElectionRecord, StoredDataset};
use crate::notify::{NotifierRef, StorageEvent};
use crate::store::{DatasetKey, DatasetSlots, Store, StoreError};

pub use static_data::StaticDatasetSource;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where a sync gets the full election list from.
pub trait DatasetSource: Send + Sync {
    fn load(&self) -> impl Future<Output = anyhow::Result<Vec<ElectionRecord>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    LoadSource,
    Serialize,
    Snapshot,
    WriteDataset,
    WriteLastUpdate,
    InvalidateCache,
    WriteLastSync,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStage::LoadSource => "loading the source dataset",
            SyncStage::Serialize => "serializing the dataset",
            SyncStage::Snapshot => "reading the current dataset",
            SyncStage::WriteDataset => "writing the dataset",
            SyncStage::WriteLastUpdate => "writing the update time",
            SyncStage::InvalidateCache => "clearing cached responses",
            SyncStage::WriteLastSync => "writing the sync marker",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Data sync aborted while {stage}: {source}")]
    Aborted {
        stage: SyncStage,
        #[source]
        source: BoxError,
    },
}

impl SyncError {
    fn at(stage: SyncStage, source: impl Into<BoxError>) -> Self {
        SyncError::Aborted {
            stage,
            source: source.into(),
        }
    }

    pub fn stage(&self) -> SyncStage {
        match self {
            SyncError::Aborted { stage, .. } => *stage,
        }
    }
}

/// Raw values of the dataset keys before a sync touched them.
struct Snapshot {
    elections: Option<String>,
    last_update: Option<String>,
    last_sync: Option<String>,
}

impl Snapshot {
    fn capture(slots: &DatasetSlots) -> Result<Self, StoreError> {
        Ok(Self {
            elections: slots.get_raw(DatasetKey::Elections)?,
            last_update: slots.get_raw(DatasetKey::LastUpdate)?,
            last_sync: slots.get_raw(DatasetKey::LastSync)?,
        })
    }

    fn restore(&self, slots: &DatasetSlots) {
        let restores = [
            (DatasetKey::Elections, self.elections.as_deref()),
            (DatasetKey::LastUpdate, self.last_update.as_deref()),
            (DatasetKey::LastSync, self.last_sync.as_deref()),
        ];
        for (key, previous) in restores {
            if let Err(e) = slots.restore(key, previous) {
                error!(key = key.as_str(), error = %e, "Failed to restore dataset key after aborted sync");
            }
        }
    }
}

pub struct SyncService<S> {
    source: S,
    store: Store,
    notifier: NotifierRef,
}

impl<S: DatasetSource> SyncService<S> {
    pub fn new(source: S, store: Store, notifier: NotifierRef) -> Self {
        Self {
            source,
            store,
            notifier,
        }
    }

    pub async fn sync(&self) -> Result<Vec<ElectionRecord>, SyncError> {
        info!("Starting election data sync");
        let result = self.run().await;
        if let Err(ref e) = result {
            error!(stage = ?e.stage(), error = %e, "Data sync failed");
        }
        result
    }

    async fn run(&self) -> Result<Vec<ElectionRecord>, SyncError> {
        let elections = self
            .source
            .load()
            .await
            .map_err(|e| SyncError::at(SyncStage::LoadSource, e))?;

        let dataset = StoredDataset::new(elections);
        let payload = serde_json::to_string(&dataset).map_err(|e| SyncError::at(SyncStage::Serialize, e))?;

        let slots = self.store.dataset();
        let snapshot = Snapshot::capture(&slots).map_err(|e| SyncError::at(SyncStage::Snapshot, e))?;

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Err(e) = self.commit(&slots, &payload, &now) {
            warn!(stage = ?e.stage(), "Restoring previous dataset");
            snapshot.restore(&slots);
            return Err(e);
        }

        self.notifier
            .publish(StorageEvent::new(DatasetKey::Elections.as_str(), Some(payload)));
        self.notifier
            .publish(StorageEvent::new(DatasetKey::LastUpdate.as_str(), Some(now)));

        info!(years = ?dataset.years(), "Election data sync complete");
        Ok(dataset.elections)
    }

    fn commit(&self, slots: &DatasetSlots, payload: &str, now: &str) -> Result<(), SyncError> {
        slots
            .set_raw(DatasetKey::Elections, payload)
            .map_err(|e| SyncError::at(SyncStage::WriteDataset, e))?;
        slots
            .set_raw(DatasetKey::LastUpdate, now)
            .map_err(|e| SyncError::at(SyncStage::WriteLastUpdate, e))?;

        let cleared = self
            .store
            .cache()
            .clear("")
            .map_err(|e| SyncError::at(SyncStage::InvalidateCache, e))?;
        info!(cleared, "Cached API responses invalidated");

        slots
            .set_raw(DatasetKey::LastSync, now)
            .map_err(|e| SyncError::at(SyncStage::WriteLastSync, e))?;
        Ok(())
    }
}
