use anyhow::Result;
use std::io::Write;

use crate::application::{LedgerService, MonthlyReport};
use crate::domain::{SessionContext, format_plain, resolve_category};
use crate::storage::TransactionFilter;

use super::TRANSACTION_CSV_HEADER;

/// Exporter for converting ledger data to CSV and JSON.
pub struct Exporter<'a> {
    service: &'a LedgerService,
    ctx: &'a SessionContext,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService, ctx: &'a SessionContext) -> Self {
        Self { service, ctx }
    }

    /// Export the session user's transactions to CSV. Amounts are plain
    /// decimals in the session currency; categories are written by name
    /// so the file can be re-imported into another ledger.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        writer: W,
        filter: &TransactionFilter,
    ) -> Result<usize> {
        let transactions = self.service.list_transactions(self.ctx, filter).await?;
        let categories = self.service.list_categories(self.ctx).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(TRANSACTION_CSV_HEADER)?;

        let mut count = 0;
        for tx in &transactions {
            let category = resolve_category(tx.category_id(), &categories)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| tx.category_id().to_string());

            csv_writer.write_record(&[
                tx.id().to_string(),
                tx.date().format("%Y-%m-%d").to_string(),
                tx.kind().as_str().to_string(),
                category,
                format_plain(tx.amount(), &self.ctx.currency),
                tx.description().to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a monthly report as pretty JSON.
    pub fn export_monthly_json<W: Write>(&self, writer: W, report: &MonthlyReport) -> Result<()> {
        serde_json::to_writer_pretty(writer, report)?;
        Ok(())
    }
}
