use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The `{ "results": [...] }` envelope FEC list endpoints return.
/// Pagination and other fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FecPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// One row of `/candidate/{id}/totals`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTotalsRow {
    pub total_receipts: Option<f64>,
    pub total_disbursements: Option<f64>,
    pub cash_on_hand_end_period: Option<f64>,
    pub debts_owed: Option<f64>,
}

/// One row of schedule B (disbursements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementRow {
    #[serde(default)]
    pub disbursement_amount: f64,
    pub disbursement_description: Option<String>,
}

/// One row of schedule E aggregated by candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenditureRow {
    /// `S` for support, `O` for oppose.
    pub support_oppose_indicator: Option<String>,
    #[serde(default)]
    pub total: f64,
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignTotals {
    pub total_raised: f64,
    pub total_spent: f64,
    pub cash_on_hand: f64,
    pub debts: f64,
}

impl From<&CandidateTotalsRow> for CampaignTotals {
    fn from(row: &CandidateTotalsRow) -> Self {
        Self {
            total_raised: row.total_receipts.unwrap_or(0.0),
            total_spent: row.total_disbursements.unwrap_or(0.0),
            cash_on_hand: row.cash_on_hand_end_period.unwrap_or(0.0),
            debts: row.debts_owed.unwrap_or(0.0),
        }
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisbursementSummary {
    pub total: f64,
    /// Description to summed amount; rows without a description count as "Other".
    pub categories: BTreeMap<String, f64>,
}

impl DisbursementSummary {
    pub fn from_rows(rows: &[DisbursementRow]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.total += row.disbursement_amount;
            let category = row
                .disbursement_description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("Other");
            *summary.categories.entry(category.to_string()).or_insert(0.0) += row.disbursement_amount;
        }
        summary
    }
}

#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenditureSummary {
    pub support_total: f64,
    pub oppose_total: f64,
}

impl ExpenditureSummary {
    pub fn from_rows(rows: &[ExpenditureRow]) -> Self {
        rows.iter().fold(Self::default(), |mut acc, row| {
            match row.support_oppose_indicator.as_deref() {
                Some("S") => acc.support_total += row.total,
                Some("O") => acc.oppose_total += row.total,
                _ => {}
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_from_partial_row() {
        let page: FecPage<CandidateTotalsRow> =
            serde_json::from_str(r#"{"results":[{"total_receipts": 1000.0, "debts_owed": null}], "pagination": {"count": 1}}"#)
                .unwrap();
        let totals = CampaignTotals::from(&page.results[0]);
        assert_eq!(totals.total_raised, 1000.0);
        assert_eq!(totals.total_spent, 0.0);
        assert_eq!(totals.debts, 0.0);
    }

    #[test]
    fn test_disbursement_categories() {
        let rows = vec![
            DisbursementRow { disbursement_amount: 100.0, disbursement_description: Some("MEDIA".into()) },
            DisbursementRow { disbursement_amount: 50.0, disbursement_description: Some("MEDIA".into()) },
            DisbursementRow { disbursement_amount: 25.0, disbursement_description: None },
            DisbursementRow { disbursement_amount: 5.0, disbursement_description: Some(String::new()) },
        ];
        let summary = DisbursementSummary::from_rows(&rows);
        assert_eq!(summary.total, 180.0);
        assert_eq!(summary.categories["MEDIA"], 150.0);
        assert_eq!(summary.categories["Other"], 30.0);
    }

    #[test]
    fn test_missing_results_is_empty_page() {
        let page: FecPage<DisbursementRow> = serde_json::from_str("{}").unwrap();
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_expenditures_split_support_and_oppose() {
        let page: FecPage<ExpenditureRow> = serde_json::from_str(
            r#"{"results":[
                {"support_oppose_indicator":"S","total":10.0},
                {"support_oppose_indicator":"O","total":4.0},
                {"support_oppose_indicator":"S","total":1.5},
                {"support_oppose_indicator":null,"total":99.0}
            ]}"#,
        )
        .unwrap();
        let summary = ExpenditureSummary::from_rows(&page.results);
        assert_eq!(summary.support_total, 11.5);
        assert_eq!(summary.oppose_total, 4.0);
    }
}
