use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MinorUnits, UserId, ValidationError, ensure_non_negative, require_text};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unvalidated input for a transaction, as supplied by a form, an import
/// row or a receipt line.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: MinorUnits,
    pub kind: TransactionKind,
    pub category_id: String,
    pub date: NaiveDate,
    pub description: String,
}

/// A validated ledger entry. Records are never mutated in place:
/// editing one produces a replacement carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    id: TransactionId,
    user_id: UserId,
    amount: MinorUnits,
    kind: TransactionKind,
    category_id: String,
    date: NaiveDate,
    description: String,
    created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Validate `input` and create a new record owned by `user_id`.
    pub fn create(user_id: UserId, input: NewTransaction) -> Result<Self, ValidationError> {
        Self::build(Uuid::new_v4(), user_id, input, Utc::now())
    }

    /// Validate `input` and build the record that supersedes `self`.
    pub fn replacement(&self, input: NewTransaction) -> Result<Self, ValidationError> {
        Self::build(self.id, self.user_id, input, Utc::now())
    }

    /// Rebuild a stored record, re-checking its invariants.
    pub(crate) fn restore(
        id: TransactionId,
        user_id: UserId,
        input: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Self::build(id, user_id, input, created_at)
    }

    fn build(
        id: TransactionId,
        user_id: UserId,
        input: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let amount = ensure_non_negative("amount", input.amount)?;
        let category_id = require_text("category", &input.category_id)?;

        Ok(Self {
            id,
            user_id,
            amount,
            kind: input.kind,
            category_id,
            date: input.date,
            description: input.description.trim().to_string(),
            created_at,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn amount(&self) -> MinorUnits {
        self.amount
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Category id, or the raw category text when no category matched.
    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Amount with the sign of its effect on the balance.
    pub fn signed_amount(&self) -> MinorUnits {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}
