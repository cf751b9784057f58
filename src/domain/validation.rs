use thiserror::Error;

use super::MinorUnits;

/// A record was rejected before reaching the ledger computations.
/// Every variant names the constraint that was violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed amount: '{0}'")]
    MalformedAmount(String),

    #[error("amount '{input}' has more fractional digits than {currency} allows")]
    TooPrecise { input: String, currency: String },

    #[error("amount out of range: '{0}'")]
    AmountOutOfRange(String),

    #[error("{field} must not be negative (got {value})")]
    NegativeAmount {
        field: &'static str,
        value: MinorUnits,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid currency code: '{0}'")]
    InvalidCurrency(String),

    #[error("unknown transaction kind: '{0}' (expected income or expense)")]
    UnknownKind(String),

    #[error("unknown locale: '{0}'")]
    UnknownLocale(String),

    #[error("unknown theme: '{0}' (expected light, dark or system)")]
    UnknownTheme(String),

    #[error("unknown role: '{0}' (expected user or admin)")]
    UnknownRole(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("receipt line {line}: {source}")]
    ReceiptLine {
        line: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("discount {discount} exceeds item amount {amount}")]
    DiscountExceedsAmount {
        amount: MinorUnits,
        discount: MinorUnits,
    },
}

impl ValidationError {
    /// Attach a 1-based receipt line number to an item-level error.
    pub fn at_line(self, line: usize) -> Self {
        ValidationError::ReceiptLine {
            line,
            source: Box::new(self),
        }
    }
}

/// Reject negative amounts for fields that must be non-negative.
pub fn ensure_non_negative(
    field: &'static str,
    value: MinorUnits,
) -> Result<MinorUnits, ValidationError> {
    if value < 0 {
        Err(ValidationError::NegativeAmount { field, value })
    } else {
        Ok(value)
    }
}

/// Reject empty or whitespace-only required text fields.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}
