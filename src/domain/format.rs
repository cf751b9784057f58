use serde::{Deserialize, Serialize};

use super::{Currency, MinorUnits, TransactionKind, ValidationError};

/// Display locales with their number and currency conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "id-ID")]
    IdId,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "ja-JP")]
    JaJp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolPosition {
    /// "Rp50.000", "$12.50"
    Prefix,
    /// "12,50 €", with the separator between number and symbol.
    Suffix(&'static str),
}

impl Locale {
    pub const ALL: [Locale; 6] = [
        Locale::EnUs,
        Locale::EnGb,
        Locale::IdId,
        Locale::DeDe,
        Locale::FrFr,
        Locale::JaJp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::EnUs => "en-US",
            Locale::EnGb => "en-GB",
            Locale::IdId => "id-ID",
            Locale::DeDe => "de-DE",
            Locale::FrFr => "fr-FR",
            Locale::JaJp => "ja-JP",
        }
    }

    /// Parse a BCP 47 tag; matching ignores case and accepts `_` for `-`.
    pub fn parse(tag: &str) -> Result<Self, ValidationError> {
        let normalized = tag.trim().replace('_', "-").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().to_lowercase() == normalized)
            .ok_or_else(|| ValidationError::UnknownLocale(tag.to_string()))
    }

    fn group_separator(&self) -> &'static str {
        match self {
            Locale::EnUs | Locale::EnGb | Locale::JaJp => ",",
            Locale::IdId | Locale::DeDe => ".",
            Locale::FrFr => "\u{202f}",
        }
    }

    fn decimal_separator(&self) -> &'static str {
        match self {
            Locale::EnUs | Locale::EnGb | Locale::JaJp => ".",
            Locale::IdId | Locale::DeDe | Locale::FrFr => ",",
        }
    }

    fn symbol_position(&self) -> SymbolPosition {
        match self {
            Locale::EnUs | Locale::EnGb | Locale::IdId | Locale::JaJp => SymbolPosition::Prefix,
            Locale::DeDe => SymbolPosition::Suffix(" "),
            Locale::FrFr => SymbolPosition::Suffix("\u{a0}"),
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render an amount with locale grouping and the currency symbol.
/// Whole-unit currencies (exponent 0, e.g. IDR) get no fractional digits.
pub fn format_amount(amount: MinorUnits, currency: &Currency, locale: Locale) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let scale = currency.scale().unsigned_abs();

    let mut number = group_digits(abs / scale, locale.group_separator());
    if currency.exponent() > 0 {
        number.push_str(locale.decimal_separator());
        number.push_str(&format!(
            "{:0width$}",
            abs % scale,
            width = currency.exponent() as usize
        ));
    }

    match locale.symbol_position() {
        SymbolPosition::Prefix => format!("{}{}{}", sign, currency.symbol(), number),
        SymbolPosition::Suffix(gap) => format!("{}{}{}{}", sign, number, gap, currency.symbol()),
    }
}

/// Prefix `+` for income and `−` (U+2212) for expense before the formatted
/// absolute amount.
pub fn format_signed_amount(
    amount: MinorUnits,
    kind: TransactionKind,
    currency: &Currency,
    locale: Locale,
) -> String {
    let sign = match kind {
        TransactionKind::Income => "+",
        TransactionKind::Expense => "\u{2212}",
    };
    format!("{}{}", sign, format_amount(amount.abs(), currency, locale))
}

fn group_digits(value: u64, separator: &str) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

/// A currency and locale pair fixed for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyFormatter {
    currency: Currency,
    locale: Locale,
}

impl CurrencyFormatter {
    pub fn new(currency: Currency, locale: Locale) -> Self {
        Self { currency, locale }
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn format(&self, amount: MinorUnits) -> String {
        format_amount(amount, &self.currency, self.locale)
    }

    pub fn format_signed(&self, amount: MinorUnits, kind: TransactionKind) -> String {
        format_signed_amount(amount, kind, &self.currency, self.locale)
    }
}
