use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Money is represented as integer minor units of its currency to avoid
/// floating-point drift. For EUR/USD 1 unit = 100 minor units, so €50.00 = 5000.
/// For IDR the exponent is 0, so Rp50.000 = 50000.
pub type MinorUnits = i64;

/// Largest absolute amount accepted at the validation boundary.
/// Keeps sums over realistic ledgers far away from `i64` overflow.
pub const MAX_AMOUNT: MinorUnits = 1_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    exponent: u32,
    symbol: String,
}

impl Currency {
    /// Look up a currency by ISO 4217 code. Unknown but well-formed codes
    /// get two fractional digits and use the code itself as symbol.
    pub fn from_code(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(code));
        }

        let (exponent, symbol) = match code.as_str() {
            "IDR" => (0, "Rp"),
            "JPY" => (0, "¥"),
            "USD" => (2, "$"),
            "EUR" => (2, "€"),
            "GBP" => (2, "£"),
            "SGD" => (2, "S$"),
            other => (2, other),
        };
        let symbol = symbol.to_string();

        Ok(Self {
            code,
            exponent,
            symbol,
        })
    }

    pub fn idr() -> Self {
        Self {
            code: "IDR".into(),
            exponent: 0,
            symbol: "Rp".into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Number of fractional digits in a whole unit.
    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Minor units per whole unit (100 for cents, 1 for IDR).
    pub fn scale(&self) -> MinorUnits {
        10_i64.pow(self.exponent)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// Format minor units as a plain decimal string with no grouping or symbol.
/// Example (EUR): 5000 -> "50.00", -1234 -> "-12.34". Example (IDR): 50000 -> "50000"
pub fn format_plain(amount: MinorUnits, currency: &Currency) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    if currency.exponent() == 0 {
        return format!("{}{}", sign, abs);
    }
    let scale = currency.scale().unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = currency.exponent() as usize
    )
}

/// Parse a decimal string into minor units of `currency`.
/// Example (EUR): "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000.
/// More fractional digits than the currency allows is an error, not a truncation.
pub fn parse_amount(input: &str, currency: &Currency) -> Result<MinorUnits, ValidationError> {
    let malformed = || ValidationError::MalformedAmount(input.to_string());

    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (units_str, fraction_str) = match digits.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (digits, ""),
    };

    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(malformed());
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }

    let exponent = currency.exponent() as usize;
    if fraction_str.len() > exponent {
        // Trailing zeros beyond the exponent carry no value ("50000.00" in IDR).
        if fraction_str[exponent..].chars().any(|c| c != '0') {
            return Err(ValidationError::TooPrecise {
                input: input.to_string(),
                currency: currency.code().to_string(),
            });
        }
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        // All digits at this point, so a parse failure means overflow.
        units_str
            .parse()
            .map_err(|_| ValidationError::AmountOutOfRange(input.to_string()))?
    };

    let fraction_digits = &fraction_str[..fraction_str.len().min(exponent)];
    let fraction: i64 = if fraction_digits.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction_digits, width = exponent);
        padded.parse().map_err(|_| malformed())?
    };

    let amount = units
        .checked_mul(currency.scale())
        .and_then(|v| v.checked_add(fraction))
        .filter(|v| *v <= MAX_AMOUNT)
        .ok_or_else(|| ValidationError::AmountOutOfRange(input.to_string()))?;

    Ok(if negative { -amount } else { amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur() -> Currency {
        Currency::from_code("eur").unwrap()
    }

    #[test]
    fn test_currency_lookup() {
        let idr = Currency::from_code("IDR").unwrap();
        assert_eq!(idr.exponent(), 0);
        assert_eq!(idr.symbol(), "Rp");
        assert_eq!(idr, Currency::idr());

        let eur = eur();
        assert_eq!(eur.code(), "EUR");
        assert_eq!(eur.scale(), 100);

        let chf = Currency::from_code("chf").unwrap();
        assert_eq!(chf.symbol(), "CHF");
        assert_eq!(chf.exponent(), 2);
    }

    #[test]
    fn test_currency_invalid() {
        assert!(Currency::from_code("").is_err());
        assert!(Currency::from_code("EURO").is_err());
        assert!(Currency::from_code("E1R").is_err());
    }

    #[test]
    fn test_format_plain() {
        assert_eq!(format_plain(5000, &eur()), "50.00");
        assert_eq!(format_plain(1, &eur()), "0.01");
        assert_eq!(format_plain(-1234, &eur()), "-12.34");
        assert_eq!(format_plain(50000, &Currency::idr()), "50000");
        assert_eq!(format_plain(-7, &Currency::idr()), "-7");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50.00", &eur()), Ok(5000));
        assert_eq!(parse_amount("50", &eur()), Ok(5000));
        assert_eq!(parse_amount("12.5", &eur()), Ok(1250));
        assert_eq!(parse_amount(".50", &eur()), Ok(50));
        assert_eq!(parse_amount("-50.00", &eur()), Ok(-5000));
        assert_eq!(parse_amount(" 7 ", &eur()), Ok(700));
        assert_eq!(parse_amount("50000", &Currency::idr()), Ok(50000));
        assert_eq!(parse_amount("50000.00", &Currency::idr()), Ok(50000));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert!(matches!(
            parse_amount("abc", &eur()),
            Err(ValidationError::MalformedAmount(_))
        ));
        assert!(parse_amount("NaN", &eur()).is_err());
        assert!(parse_amount("inf", &eur()).is_err());
        assert!(parse_amount("", &eur()).is_err());
        assert!(parse_amount(".", &eur()).is_err());
        assert!(parse_amount("12.34.56", &eur()).is_err());
        assert!(parse_amount("1e5", &eur()).is_err());
    }

    #[test]
    fn test_parse_amount_rejects_excess_precision() {
        assert!(matches!(
            parse_amount("100.999", &eur()),
            Err(ValidationError::TooPrecise { .. })
        ));
        assert!(parse_amount("10.5", &Currency::idr()).is_err());
    }

    #[test]
    fn test_parse_amount_out_of_range() {
        assert!(matches!(
            parse_amount("99999999999999999999", &eur()),
            Err(ValidationError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn test_decimal_sum_has_no_drift() {
        // 0.1 + 0.2 in floating point is 0.30000000000000004
        let a = parse_amount("0.10", &eur()).unwrap();
        let b = parse_amount("0.20", &eur()).unwrap();
        assert_eq!(format_plain(a + b, &eur()), "0.30");
    }
}
