//! Parsed receipts: normalization of scanned line items into validated
//! monetary records, and lenient receipt timestamp handling.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use super::{
    Currency, MAX_AMOUNT, MinorUnits, ValidationError, compute_receipt_total, ensure_non_negative,
    parse_amount,
};

/// Category assigned to receipt lines that don't name one.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Naive (offset-less) ISO-8601 date-time layouts accepted on receipts.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A receipt timestamp after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReceiptTimestamp {
    /// A valid ISO-8601 value, re-rendered in canonical form.
    Parsed { text: String, date: NaiveDate },
    /// Not a date. Holds the original input unchanged, for display only.
    Unparsed { text: String },
}

impl ReceiptTimestamp {
    pub fn as_str(&self) -> &str {
        match self {
            ReceiptTimestamp::Parsed { text, .. } | ReceiptTimestamp::Unparsed { text } => text,
        }
    }

    /// Calendar date of the receipt, in the timestamp's own offset.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ReceiptTimestamp::Parsed { date, .. } => Some(*date),
            ReceiptTimestamp::Unparsed { .. } => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ReceiptTimestamp::Parsed { .. })
    }
}

impl std::fmt::Display for ReceiptTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a raw receipt timestamp. Never fails: absent or blank input
/// is `None`, anything that isn't ISO-8601 comes back verbatim as
/// [`ReceiptTimestamp::Unparsed`].
pub fn parse_timestamp(raw: Option<&str>) -> Option<ReceiptTimestamp> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ReceiptTimestamp::Parsed {
            text: dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            date: dt.date_naive(),
        });
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ReceiptTimestamp::Parsed {
                text: dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
                date: dt.date(),
            });
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(ReceiptTimestamp::Parsed {
            text: date.format("%Y-%m-%d").to_string(),
            date,
        });
    }

    Some(ReceiptTimestamp::Unparsed {
        text: raw.to_string(),
    })
}

/// An amount as it appears in scanned receipt JSON: either a JSON number
/// or a string. Numbers are read through their decimal text, never as `f64`
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    fn to_minor_units(&self, currency: &Currency) -> Result<MinorUnits, ValidationError> {
        match self {
            RawAmount::Number(n) => parse_amount(&n.to_string(), currency),
            RawAmount::Text(s) => parse_amount(s, currency),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    pub amount: Option<RawAmount>,
    pub discount: Option<RawAmount>,
    pub tax: Option<RawAmount>,
    #[serde(alias = "service_fee")]
    pub service_fee: Option<RawAmount>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Receipt as produced by an external scanner, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    #[serde(default)]
    pub items: Vec<RawLineItem>,
    pub timestamp: Option<String>,
    pub rounding: Option<RawAmount>,
    pub currency: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLineItem {
    pub amount: MinorUnits,
    pub discount: Option<MinorUnits>,
    pub tax: MinorUnits,
    pub service_fee: MinorUnits,
    pub category: String,
    pub description: String,
}

impl ReceiptLineItem {
    /// amount − discount + tax + service fee, with a missing discount as 0.
    pub fn net_amount(&self) -> MinorUnits {
        self.amount - self.discount.unwrap_or(0) + self.tax + self.service_fee
    }

    fn from_raw(raw: &RawLineItem, currency: &Currency) -> Result<Self, ValidationError> {
        let amount_field = |field: &'static str, value: &Option<RawAmount>| {
            value
                .as_ref()
                .map(|v| v.to_minor_units(currency))
                .transpose()?
                .map(|v| ensure_non_negative(field, v))
                .transpose()
        };

        let amount =
            amount_field("amount", &raw.amount)?.ok_or(ValidationError::MissingField("amount"))?;
        let discount = amount_field("discount", &raw.discount)?;
        let tax = amount_field("tax", &raw.tax)?.unwrap_or(0);
        let service_fee = amount_field("serviceFee", &raw.service_fee)?.unwrap_or(0);

        if let Some(discount) = discount {
            if discount > amount {
                return Err(ValidationError::DiscountExceedsAmount { amount, discount });
            }
        }

        let category = raw
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED)
            .to_string();

        Ok(Self {
            amount,
            discount,
            tax,
            service_fee,
            category,
            description: raw.description.as_deref().unwrap_or("").trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub items: Vec<ReceiptLineItem>,
    pub timestamp: Option<ReceiptTimestamp>,
    /// Signed cash rounding applied at the till.
    pub rounding: MinorUnits,
    pub currency: Currency,
    pub note: Option<String>,
}

impl ParsedReceipt {
    /// Validate a scanned receipt. The receipt's own currency wins over
    /// `default_currency` when present.
    pub fn from_raw(raw: &RawReceipt, default_currency: &Currency) -> Result<Self, ValidationError> {
        let currency = match raw.currency.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Currency::from_code(code)?,
            _ => default_currency.clone(),
        };

        let items = raw
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                ReceiptLineItem::from_raw(item, &currency).map_err(|e| e.at_line(idx + 1))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rounding = raw
            .rounding
            .as_ref()
            .map(|r| r.to_minor_units(&currency))
            .transpose()?
            .unwrap_or(0);

        checked_grand_total(&items, rounding).ok_or_else(|| {
            ValidationError::AmountOutOfRange(format!("total of {} receipt lines", items.len()))
        })?;

        Ok(Self {
            items,
            timestamp: parse_timestamp(raw.timestamp.as_deref()),
            rounding,
            currency,
            note: raw
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        })
    }

    /// Parse and validate receipt JSON.
    pub fn from_json(json: &str, default_currency: &Currency) -> Result<Self, ReceiptJsonError> {
        let raw: RawReceipt = serde_json::from_str(json)?;
        Ok(Self::from_raw(&raw, default_currency)?)
    }

    /// Sum of line items, excluding rounding.
    pub fn total(&self) -> MinorUnits {
        compute_receipt_total(&self.items)
    }

    /// Amount actually paid: line items plus rounding.
    pub fn grand_total(&self) -> MinorUnits {
        self.total() + self.rounding
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.as_ref().and_then(ReceiptTimestamp::date)
    }
}

/// Line total plus rounding, or `None` when the line total exceeds
/// [`MAX_AMOUNT`]. A receipt that passes this check can be summed with plain
/// `i64` arithmetic.
fn checked_grand_total(items: &[ReceiptLineItem], rounding: MinorUnits) -> Option<MinorUnits> {
    let total = items.iter().try_fold(0_i64, |acc, item| {
        let net = item
            .amount
            .checked_sub(item.discount.unwrap_or(0))?
            .checked_add(item.tax)?
            .checked_add(item.service_fee)?;
        acc.checked_add(net)
    })?;
    if total > MAX_AMOUNT {
        return None;
    }
    total.checked_add(rounding)
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiptJsonError {
    #[error("invalid receipt JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
