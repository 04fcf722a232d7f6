//! Campaign finance figures derived from FEC responses.

use std::future::Future;
use std::sync::Arc;

use crate::api::{ApiError, ApiQuery, RemoteSource};
use crate::models::{
    CampaignTotals, CandidateTotalsRow, DisbursementRow, DisbursementSummary, ExpenditureRow, ExpenditureSummary,
    FecPage,
};
use crate::query::QueryClient;

pub type FinanceResult<T> = Result<T, Arc<ApiError>>;

/// Source of finance figures for one candidate or committee and cycle.
pub trait FinanceEstimator: Send + Sync {
    fn campaign_totals(&self, candidate_id: &str, year: u16) -> impl Future<Output = FinanceResult<CampaignTotals>> + Send;

    fn disbursements(
        &self,
        committee_id: &str,
        year: u16,
    ) -> impl Future<Output = FinanceResult<DisbursementSummary>> + Send;

    fn independent_expenditures(
        &self,
        candidate_id: &str,
        year: u16,
    ) -> impl Future<Output = FinanceResult<ExpenditureSummary>> + Send;
}

/// Reads figures through the cached query layer, so repeated lookups
/// within the cache window cost no requests.
pub struct FecFinance<R> {
    client: QueryClient<R>,
}

impl<R: RemoteSource> FecFinance<R> {
    pub fn new(client: QueryClient<R>) -> Self {
        Self { client }
    }

    async fn page<T>(&self, query: ApiQuery) -> FinanceResult<Vec<T>>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync,
    {
        let page = self.client.fetch::<FecPage<T>>(&query).await?;
        Ok(page.map(|p| p.results).unwrap_or_default())
    }

    /// Campaign totals and outside spending, fetched concurrently.
    pub async fn candidate_overview(
        &self,
        candidate_id: &str,
        year: u16,
    ) -> FinanceResult<(CampaignTotals, ExpenditureSummary)> {
        futures::try_join!(
            self.campaign_totals(candidate_id, year),
            self.independent_expenditures(candidate_id, year)
        )
    }
}

impl<R: RemoteSource> FinanceEstimator for FecFinance<R> {
    async fn campaign_totals(&self, candidate_id: &str, year: u16) -> FinanceResult<CampaignTotals> {
        let rows: Vec<CandidateTotalsRow> = self.page(ApiQuery::candidate_totals(candidate_id, year)).await?;
        Ok(rows.first().map(CampaignTotals::from).unwrap_or_default())
    }

    async fn disbursements(&self, committee_id: &str, year: u16) -> FinanceResult<DisbursementSummary> {
        let rows: Vec<DisbursementRow> = self.page(ApiQuery::disbursements(committee_id, year)).await?;
        Ok(DisbursementSummary::from_rows(&rows))
    }

    async fn independent_expenditures(&self, candidate_id: &str, year: u16) -> FinanceResult<ExpenditureSummary> {
        let rows: Vec<ExpenditureRow> = self
            .page(ApiQuery::independent_expenditures(candidate_id, year))
            .await?;
        Ok(ExpenditureSummary::from_rows(&rows))
    }
}
