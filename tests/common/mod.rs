// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use clarity::application::LedgerService;
use clarity::domain::{
    Currency, Locale, NewTransaction, Role, SessionContext, TransactionKind, TransactionRecord,
};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), &Currency::idr()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Register the first user (who becomes admin) and open an IDR session.
pub async fn admin_session(service: &LedgerService) -> Result<SessionContext> {
    service
        .register_user(None, "admin@example.com", Role::User)
        .await?;
    Ok(service
        .session_with("admin@example.com", Locale::IdId, Currency::idr())
        .await?)
}

/// Register a regular user through `admin` and open an IDR session.
pub async fn user_session(
    service: &LedgerService,
    admin: &SessionContext,
    email: &str,
) -> Result<SessionContext> {
    service.register_user(Some(admin), email, Role::User).await?;
    Ok(service
        .session_with(email, Locale::IdId, Currency::idr())
        .await?)
}

pub async fn expense(
    service: &LedgerService,
    ctx: &SessionContext,
    amount: i64,
    category: &str,
    date: &str,
) -> Result<TransactionRecord> {
    Ok(service
        .record_transaction(
            ctx,
            NewTransaction {
                amount,
                kind: TransactionKind::Expense,
                category_id: category.to_string(),
                date: parse_date(date),
                description: String::new(),
            },
        )
        .await?)
}

pub async fn income(
    service: &LedgerService,
    ctx: &SessionContext,
    amount: i64,
    category: &str,
    date: &str,
) -> Result<TransactionRecord> {
    Ok(service
        .record_transaction(
            ctx,
            NewTransaction {
                amount,
                kind: TransactionKind::Income,
                category_id: category.to_string(),
                date: parse_date(date),
                description: String::new(),
            },
        )
        .await?)
}
