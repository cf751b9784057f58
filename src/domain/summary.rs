use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{MinorUnits, ValidationError};

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate(input.to_string());
        let (year, month) = input.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Shift by a signed number of months.
    pub fn offset(self, months: i32) -> Self {
        let index = self.year * 12 + self.month as i32 - 1 + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(self) -> Option<NaiveDate> {
        self.next().first_day().and_then(|d| d.pred_opt())
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive range of months requested for a dense rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl MonthRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: YearMonth, end: YearMonth) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, month: YearMonth) -> bool {
        self.start <= month && month <= self.end
    }

    pub fn months(&self) -> impl Iterator<Item = YearMonth> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |m| {
            let next = m.next();
            (next <= end).then_some(next)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_id: String,
    pub label: String,
    pub color: String,
    pub total: MinorUnits,
    pub count: i64,
}

/// Income and expenses for one month. The balance is derived in the
/// constructor and cannot be set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    month: YearMonth,
    income: MinorUnits,
    expenses: MinorUnits,
    balance: MinorUnits,
}

impl MonthlySummary {
    pub fn new(month: YearMonth, income: MinorUnits, expenses: MinorUnits) -> Self {
        Self {
            month,
            income,
            expenses,
            balance: income - expenses,
        }
    }

    pub fn empty(month: YearMonth) -> Self {
        Self::new(month, 0, 0)
    }

    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn income(&self) -> MinorUnits {
        self.income
    }

    pub fn expenses(&self) -> MinorUnits {
        self.expenses
    }

    pub fn balance(&self) -> MinorUnits {
        self.balance
    }
}

/// Totals over a whole transaction collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub income: MinorUnits,
    pub expenses: MinorUnits,
    pub balance: MinorUnits,
    pub count: i64,
}
