use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CategorySummary, LedgerTotals, MinorUnits, MonthlySummary, TransactionKind};
use crate::storage::TransactionFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryReport {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub categories: Vec<CategoryShare>,
    pub total: MinorUnits,
    pub totals: LedgerTotals,
}

/// A category summary with its share of the report total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryShare {
    #[serde(flatten)]
    pub summary: CategorySummary,
    /// Display-only percentage of the report total.
    pub percentage: f64,
}

impl CategoryReport {
    pub fn new(
        filter: &TransactionFilter,
        summaries: Vec<CategorySummary>,
        totals: LedgerTotals,
    ) -> Self {
        let total: MinorUnits = summaries.iter().map(|s| s.total).sum();
        let categories = summaries
            .into_iter()
            .map(|summary| {
                let percentage = if total > 0 {
                    summary.total as f64 * 100.0 / total as f64
                } else {
                    0.0
                };
                CategoryShare {
                    summary,
                    percentage,
                }
            })
            .collect();

        Self {
            from_date: filter.from_date,
            to_date: filter.to_date,
            kind: filter.kind,
            categories,
            total,
            totals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub months: Vec<MonthlySummary>,
    pub totals: LedgerTotals,
}
