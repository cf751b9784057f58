use std::collections::{BTreeMap, HashMap};

use super::{
    Category, CategorySummary, LedgerTotals, MinorUnits, MonthRange, MonthlySummary,
    NEUTRAL_COLOR, ReceiptLineItem, TransactionKind, TransactionRecord, YearMonth,
    resolve_category,
};

/// Total of a receipt's line items.
/// Total = Σ(amount − discount + tax + service fee); an empty receipt totals 0.
pub fn compute_receipt_total(items: &[ReceiptLineItem]) -> MinorUnits {
    items.iter().map(ReceiptLineItem::net_amount).sum()
}

/// Group transactions by category key, summing and counting each group.
/// Labels and colors come from `categories` (by id, then case-insensitive
/// name); unknown keys keep the raw key as label and the neutral color.
pub fn summarize_by_category(
    transactions: &[TransactionRecord],
    categories: &[Category],
) -> Vec<CategorySummary> {
    let mut groups: HashMap<&str, (MinorUnits, i64)> = HashMap::new();
    for tx in transactions {
        let entry = groups.entry(tx.category_id()).or_insert((0, 0));
        entry.0 += tx.amount();
        entry.1 += 1;
    }

    let mut summaries: Vec<CategorySummary> = groups
        .into_iter()
        .map(|(key, (total, count))| {
            let category = resolve_category(key, categories);
            CategorySummary {
                category_id: key.to_string(),
                label: category.map_or_else(|| key.to_string(), |c| c.name.clone()),
                color: category.map_or_else(|| NEUTRAL_COLOR.to_string(), |c| c.color.clone()),
                total,
                count,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    summaries
}

/// Bucket transactions by the calendar month of their date. Months without
/// transactions are omitted. Buckets are in chronological order.
pub fn summarize_by_month(transactions: &[TransactionRecord]) -> Vec<MonthlySummary> {
    month_buckets(transactions, None)
        .into_iter()
        .map(|(month, (income, expenses))| MonthlySummary::new(month, income, expenses))
        .collect()
}

/// Like [`summarize_by_month`] but yields every month of `range`,
/// zero-filled when empty. Transactions outside the range are ignored.
pub fn summarize_by_month_dense(
    transactions: &[TransactionRecord],
    range: MonthRange,
) -> Vec<MonthlySummary> {
    let buckets = month_buckets(transactions, Some(range));
    range
        .months()
        .map(|month| match buckets.get(&month) {
            Some((income, expenses)) => MonthlySummary::new(month, *income, *expenses),
            None => MonthlySummary::empty(month),
        })
        .collect()
}

fn month_buckets(
    transactions: &[TransactionRecord],
    range: Option<MonthRange>,
) -> BTreeMap<YearMonth, (MinorUnits, MinorUnits)> {
    let mut buckets: BTreeMap<YearMonth, (MinorUnits, MinorUnits)> = BTreeMap::new();
    for tx in transactions {
        let month = YearMonth::of(tx.date());
        if range.is_some_and(|r| !r.contains(month)) {
            continue;
        }
        let bucket = buckets.entry(month).or_insert((0, 0));
        match tx.kind() {
            TransactionKind::Income => bucket.0 += tx.amount(),
            TransactionKind::Expense => bucket.1 += tx.amount(),
        }
    }
    buckets
}

/// Overall income, expenses and balance.
pub fn compute_totals(transactions: &[TransactionRecord]) -> LedgerTotals {
    let (income, expenses) = transactions
        .iter()
        .fold((0, 0), |(income, expenses), tx| match tx.kind() {
            TransactionKind::Income => (income + tx.amount(), expenses),
            TransactionKind::Expense => (income, expenses + tx.amount()),
        });

    LedgerTotals {
        income,
        expenses,
        balance: income - expenses,
        count: transactions.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::domain::NewTransaction;

    fn item(
        amount: MinorUnits,
        discount: Option<MinorUnits>,
        tax: MinorUnits,
        fee: MinorUnits,
    ) -> ReceiptLineItem {
        ReceiptLineItem {
            amount,
            discount,
            tax,
            service_fee: fee,
            category: "Food".into(),
            description: String::new(),
        }
    }

    fn tx(
        kind: TransactionKind,
        amount: MinorUnits,
        category: &str,
        date: &str,
    ) -> TransactionRecord {
        TransactionRecord::create(
            Uuid::nil(),
            NewTransaction {
                amount,
                kind,
                category_id: category.into(),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                description: String::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_receipt_total_example() {
        let items = vec![item(100, Some(10), 5, 2), item(50, None, 0, 0)];
        assert_eq!(compute_receipt_total(&items), 147);
    }

    #[test]
    fn test_receipt_total_empty() {
        assert_eq!(compute_receipt_total(&[]), 0);
    }

    #[test]
    fn test_receipt_total_matches_formula() {
        let items: Vec<ReceiptLineItem> = (0..20)
            .map(|i| item(1000 + i * 37, (i % 3 == 0).then_some(i * 5), i * 11, i % 4))
            .collect();
        let expected: MinorUnits = items
            .iter()
            .map(|it| it.amount - it.discount.unwrap_or(0) + it.tax + it.service_fee)
            .sum();
        assert_eq!(compute_receipt_total(&items), expected);
    }

    #[test]
    fn test_summarize_by_category() {
        let user = Uuid::nil();
        let food = Category::new(
            user,
            "Food",
            Some("#f97316".into()),
            TransactionKind::Expense,
        )
        .unwrap();
        let food_key = food.id.to_string();
        let categories = vec![food];

        let transactions = vec![
            tx(TransactionKind::Expense, 1500, &food_key, "2024-01-05"),
            tx(TransactionKind::Expense, 2000, "food", "2024-01-12"),
            tx(TransactionKind::Expense, 700, "Travel", "2024-01-20"),
        ];

        let summaries = summarize_by_category(&transactions, &categories);
        assert_eq!(summaries.len(), 3);

        // The name-keyed group resolves to the same category metadata.
        assert_eq!(summaries[0].category_id, "food");
        assert_eq!(summaries[0].label, "Food");
        assert_eq!(summaries[0].color, "#f97316");
        assert_eq!(summaries[0].total, 2000);

        assert_eq!(summaries[1].category_id, food_key);
        assert_eq!(summaries[1].total, 1500);
        assert_eq!(summaries[1].count, 1);

        assert_eq!(summaries[2].label, "Travel");
        assert_eq!(summaries[2].color, NEUTRAL_COLOR);
    }

    #[test]
    fn test_summarize_by_category_counts() {
        let transactions = vec![
            tx(TransactionKind::Expense, 100, "a", "2024-01-01"),
            tx(TransactionKind::Expense, 200, "a", "2024-01-02"),
            tx(TransactionKind::Expense, 300, "b", "2024-01-03"),
        ];
        let summaries = summarize_by_category(&transactions, &[]);
        assert_eq!(summaries[0].category_id, "a");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].total, 300);
        // Equal totals are ordered by label.
        assert_eq!(summaries[1].category_id, "b");
    }

    #[test]
    fn test_summarize_by_month_sparse() {
        let transactions = vec![
            tx(TransactionKind::Income, 5000, "salary", "2024-03-01"),
            tx(TransactionKind::Expense, 1200, "food", "2024-01-31"),
            tx(TransactionKind::Income, 3000, "salary", "2024-01-01"),
            tx(TransactionKind::Expense, 800, "food", "2024-03-15"),
        ];

        let months = summarize_by_month(&transactions);
        assert_eq!(months.len(), 2, "February has no transactions");

        assert_eq!(months[0].month().to_string(), "2024-01");
        assert_eq!(months[0].income(), 3000);
        assert_eq!(months[0].expenses(), 1200);
        assert_eq!(months[0].balance(), 1800);

        assert_eq!(months[1].month().to_string(), "2024-03");
        assert_eq!(months[1].balance(), 4200);
    }

    #[test]
    fn test_summarize_by_month_dense() {
        let transactions = vec![
            tx(TransactionKind::Expense, 1200, "food", "2023-12-31"),
            tx(TransactionKind::Income, 3000, "salary", "2024-01-01"),
            tx(TransactionKind::Expense, 800, "food", "2024-03-15"),
        ];
        let range = MonthRange::new(
            YearMonth::new(2024, 1).unwrap(),
            YearMonth::new(2024, 3).unwrap(),
        )
        .unwrap();

        let months = summarize_by_month_dense(&transactions, range);
        assert_eq!(months.len(), 3);
        assert_eq!(months[0].income(), 3000);
        assert_eq!(months[0].expenses(), 0, "December is outside the range");
        assert_eq!(months[1], MonthlySummary::empty(YearMonth::new(2024, 2).unwrap()));
        assert_eq!(months[2].balance(), -800);
    }

    #[test]
    fn test_monthly_balance_invariant() {
        let transactions: Vec<TransactionRecord> = (0..48)
            .map(|i| {
                let kind = if i % 3 == 0 {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                };
                let date = format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1);
                tx(kind, 100 * (i + 1), "misc", &date)
            })
            .collect();

        for summary in summarize_by_month(&transactions) {
            assert_eq!(summary.balance(), summary.income() - summary.expenses());
        }
    }

    #[test]
    fn test_aggregators_are_idempotent() {
        let transactions = vec![
            tx(TransactionKind::Income, 5000, "salary", "2024-01-01"),
            tx(TransactionKind::Expense, 1200, "food", "2024-02-10"),
        ];
        assert_eq!(
            summarize_by_month(&transactions),
            summarize_by_month(&transactions)
        );
        assert_eq!(
            summarize_by_category(&transactions, &[]),
            summarize_by_category(&transactions, &[])
        );
        assert_eq!(compute_totals(&transactions), compute_totals(&transactions));
    }

    #[test]
    fn test_compute_totals() {
        let transactions = vec![
            tx(TransactionKind::Income, 5000, "salary", "2024-01-01"),
            tx(TransactionKind::Expense, 1200, "food", "2024-02-10"),
            tx(TransactionKind::Expense, 300, "food", "2024-02-11"),
        ];
        let totals = compute_totals(&transactions);
        assert_eq!(totals.income, 5000);
        assert_eq!(totals.expenses, 1500);
        assert_eq!(totals.balance, 3500);
        assert_eq!(totals.count, 3);
        assert_eq!(compute_totals(&[]), LedgerTotals::default());
    }
}
