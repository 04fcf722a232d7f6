//! The fixed set of FEC endpoints the dashboard reads.

use crate::cache::QueryParams;

pub const PRESIDENTIAL_RESULTS: &str = "/presidential/results";
pub const CANDIDATE_DETAILS: &str = "/candidate";
pub const COMMITTEE_DETAILS: &str = "/committee";
pub const INDEPENDENT_EXPENDITURES: &str = "/schedules/schedule_e";
pub const DISBURSEMENTS: &str = "/schedules/schedule_b";
pub const RECEIPTS: &str = "/schedules/schedule_a";

/// Disbursement rows fetched per committee, largest first.
const DISBURSEMENTS_PER_PAGE: u32 = 20;

/// An endpoint path plus its parameters, ready for the cached query layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiQuery {
    pub endpoint: String,
    pub params: QueryParams,
}

impl ApiQuery {
    pub fn new(endpoint: impl Into<String>, params: QueryParams) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
        }
    }

    pub fn presidential_results(year: u16) -> Self {
        Self::new(format!("{}/{}", PRESIDENTIAL_RESULTS, year), QueryParams::new())
    }

    pub fn candidate(candidate_id: &str) -> Self {
        Self::new(format!("{}/{}", CANDIDATE_DETAILS, candidate_id), QueryParams::new())
    }

    pub fn candidate_totals(candidate_id: &str, election_year: u16) -> Self {
        Self::new(
            format!("{}/{}/totals", CANDIDATE_DETAILS, candidate_id),
            QueryParams::new().with("election_year", election_year),
        )
    }

    pub fn committee(committee_id: &str) -> Self {
        Self::new(format!("{}/{}", COMMITTEE_DETAILS, committee_id), QueryParams::new())
    }

    pub fn receipts(params: QueryParams) -> Self {
        Self::new(RECEIPTS, params)
    }

    pub fn disbursements(committee_id: &str, election_year: u16) -> Self {
        Self::new(
            DISBURSEMENTS,
            QueryParams::new()
                .with("committee_id", committee_id)
                .with("two_year_transaction_period", election_year)
                .with("sort", "-disbursement_amount")
                .with("per_page", DISBURSEMENTS_PER_PAGE),
        )
    }

    pub fn independent_expenditures(candidate_id: &str, cycle: u16) -> Self {
        Self::new(
            format!("{}/by_candidate", INDEPENDENT_EXPENDITURES),
            QueryParams::new()
                .with("candidate_id", candidate_id)
                .with("cycle", cycle),
        )
    }
}
