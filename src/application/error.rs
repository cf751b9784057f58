use thiserror::Error;

use crate::domain::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    CategoryAlreadyExists(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Currency mismatch: got {found} but the ledger is kept in {ledger}")]
    CurrencyMismatch { found: String, ledger: String },

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
