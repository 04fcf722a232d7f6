//! Data models for election results and campaign finance.
//!
//! - `ElectionRecord`, `Candidate`, `StateResult`: presidential results
//! - `StoredDataset`: the canonical dataset envelope written by a sync
//! - `CampaignTotals`, `DisbursementSummary`, `ExpenditureSummary`: finance figures

pub mod dataset;
pub mod election;
pub mod finance;

pub use dataset::{StoredDataset, DATASET_VERSION};
pub use election::{Candidate, ElectionRecord, Party, PartyVotes, StateResult};
pub use finance::{
    CampaignTotals, CandidateTotalsRow, DisbursementRow, DisbursementSummary, ExpenditureRow, ExpenditureSummary,
    FecPage,
};
