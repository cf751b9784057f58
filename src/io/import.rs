use anyhow::Result;
use std::io::Read;
use tracing::warn;

use crate::application::{LedgerService, ReceiptImportResult};
use crate::domain::{
    NewTransaction, ParsedReceipt, SessionContext, TransactionKind, ensure_non_negative,
    parse_amount, parse_date, require_text,
};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate every row but write nothing.
    pub dry_run: bool,
}

/// Outcome of a receipt import; a dry run only carries the parsed receipt.
pub struct ReceiptImport {
    pub receipt: ParsedReceipt,
    pub recorded: Option<ReceiptImportResult>,
}

/// Importer for loading data into the session user's ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
    ctx: &'a SessionContext,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService, ctx: &'a SessionContext) -> Self {
        Self { service, ctx }
    }

    /// Import transactions from CSV with columns
    /// `id,date,kind,category,amount,description` (the `id` column is ignored).
    /// Invalid rows are reported and skipped; valid rows are recorded. Rows
    /// get the same checks in a dry run as in a real import.
    pub async fn import_transactions_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut imported = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let input = match self.parse_row(&record) {
                Ok(input) => input,
                Err((field, error)) => {
                    warn!(line, field, %error, "skipping import row");
                    errors.push(ImportError {
                        line,
                        field: Some(field.to_string()),
                        error,
                    });
                    continue;
                }
            };

            if options.dry_run {
                imported += 1;
                continue;
            }

            match self.service.record_transaction(self.ctx, input).await {
                Ok(_) => imported += 1,
                Err(e) => errors.push(ImportError {
                    line,
                    field: None,
                    error: format!("Transaction creation failed: {}", e),
                }),
            }
        }

        Ok(ImportResult { imported, errors })
    }

    fn parse_row(
        &self,
        record: &csv::StringRecord,
    ) -> Result<NewTransaction, (&'static str, String)> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let date = parse_date(field(1)).map_err(|e| ("date", e.to_string()))?;
        let kind = TransactionKind::parse(field(2)).map_err(|e| ("kind", e.to_string()))?;
        let amount = parse_amount(field(4), &self.ctx.currency)
            .and_then(|amount| ensure_non_negative("amount", amount))
            .map_err(|e| ("amount", e.to_string()))?;
        let category =
            require_text("category", field(3)).map_err(|e| ("category", e.to_string()))?;

        Ok(NewTransaction {
            amount,
            kind,
            category_id: category,
            date,
            description: field(5).to_string(),
        })
    }

    /// Import a scanned receipt from JSON. Receipt amounts are read in the
    /// receipt's currency, defaulting to the session currency.
    pub async fn import_receipt_json<R: Read>(
        &self,
        mut reader: R,
        options: ImportOptions,
    ) -> Result<ReceiptImport> {
        let mut json = String::new();
        reader.read_to_string(&mut json)?;
        let receipt = ParsedReceipt::from_json(&json, &self.ctx.currency)?;

        if options.dry_run {
            return Ok(ReceiptImport {
                receipt,
                recorded: None,
            });
        }

        let recorded = self.service.import_receipt(self.ctx, &receipt).await?;
        Ok(ReceiptImport {
            receipt,
            recorded: Some(recorded),
        })
    }
}
