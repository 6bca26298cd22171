use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use chrono::Datelike;
use comfy_table::{Table, TableComponent};
use csv::WriterBuilder;
use log::info;

use crate::classifier::UNCATEGORIZED;
use crate::transaction::Transaction;

pub(crate) const CATEGORY_SUMMARY_FILE: &str = "summary_by_category.csv";
pub(crate) const ACCOUNT_SUMMARY_FILE: &str = "summary_by_account.csv";
pub(crate) const MONTH_SUMMARY_FILE: &str = "summary_by_month.csv";

/// Print the first few categorized transactions, dry-run-import style.
pub(crate) fn print_sample(transactions: &[Transaction]) {
    let mut table = new_table(vec!["Date", "Description", "Amount", "Category", "Account"]);
    for t in transactions.iter().take(10) {
        table.add_row(vec![
            t.date_display(),
            t.description.clone(),
            format!("{:.2}", t.amount),
            t.category.clone(),
            t.account.clone(),
        ]);
    }
    println!("\nSample categorized transactions:");
    println!("{table}");
}

/// Write all summary files and print the on-screen digest.
pub(crate) fn write_reports(ledger: &[Transaction]) -> anyhow::Result<()> {
    let by_category = totals_by_category(ledger);
    write_summary(
        Path::new(CATEGORY_SUMMARY_FILE),
        &["Category", "Amount"],
        by_category
            .iter()
            .map(|(category, amount)| vec![category.clone(), format!("{:.2}", amount)]),
    )?;

    let by_account = totals_by_account(ledger);
    write_summary(
        Path::new(ACCOUNT_SUMMARY_FILE),
        &["Account", "Category", "Amount"],
        by_account
            .iter()
            .map(|((account, category), amount)| {
                vec![account.clone(), category.clone(), format!("{:.2}", amount)]
            }),
    )?;

    let by_month = totals_by_month(ledger);
    write_summary(
        Path::new(MONTH_SUMMARY_FILE),
        &["Year", "Month", "Category", "Amount"],
        by_month.iter().map(|((year, month, category), amount)| {
            vec![
                year.to_string(),
                month.to_string(),
                category.clone(),
                format!("{:.2}", amount),
            ]
        }),
    )?;
    info!(
        "Wrote {}, {} and {}",
        CATEGORY_SUMMARY_FILE, ACCOUNT_SUMMARY_FILE, MONTH_SUMMARY_FILE
    );

    print_digest(&by_category, ledger);
    Ok(())
}

/// Category totals, largest amount first.
pub(crate) fn totals_by_category(transactions: &[Transaction]) -> Vec<(String, f64)> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for t in transactions {
        *totals.entry(t.category.clone()).or_insert(0.0) += t.amount;
    }

    let mut totals: Vec<(String, f64)> = totals.into_iter().collect();
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

/// Per-account, per-category totals, ordered by account then amount.
pub(crate) fn totals_by_account(transactions: &[Transaction]) -> Vec<((String, String), f64)> {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for t in transactions {
        *totals
            .entry((t.account.clone(), t.category.clone()))
            .or_insert(0.0) += t.amount;
    }

    let mut totals: Vec<((String, String), f64)> = totals.into_iter().collect();
    totals.sort_by(|a, b| {
        a.0 .0
            .cmp(&b.0 .0)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    totals
}

/// Per-month, per-category totals. Rows with unparsable dates are excluded.
pub(crate) fn totals_by_month(transactions: &[Transaction]) -> Vec<((i32, u32, String), f64)> {
    let mut totals: BTreeMap<(i32, u32, String), f64> = BTreeMap::new();
    for t in transactions {
        if let Some(date) = t.date {
            *totals
                .entry((date.year(), date.month(), t.category.clone()))
                .or_insert(0.0) += t.amount;
        }
    }
    totals.into_iter().collect()
}

/// Most frequent still-uncategorized descriptions, count descending.
pub(crate) fn uncategorized_counts(transactions: &[Transaction]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for t in transactions {
        if t.category == UNCATEGORIZED {
            *counts.entry(t.description.clone()).or_insert(0) += 1;
        }
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts
}

fn print_digest(by_category: &[(String, f64)], ledger: &[Transaction]) {
    let mut table = new_table(vec!["Category", "Amount"]);
    for (category, amount) in by_category.iter().take(10) {
        table.add_row(vec![category.clone(), format!("{:.2}", amount)]);
    }
    println!("\nTop spending categories:");
    println!("{table}");

    let mut account_totals: BTreeMap<String, f64> = BTreeMap::new();
    for t in ledger {
        *account_totals.entry(t.account.clone()).or_insert(0.0) += t.amount;
    }
    println!("\nPer-account totals:");
    for (account, total) in account_totals {
        println!("  {}: ${:.2}", account, total);
    }

    let uncategorized = uncategorized_counts(ledger);
    if !uncategorized.is_empty() {
        let total: usize = uncategorized.iter().map(|(_, n)| n).sum();
        println!(
            "\nFound {} uncategorized transactions. Consider adding rules for:",
            total
        );
        for (description, count) in uncategorized.iter().take(10) {
            println!("  - {} ({} times)", description, count);
        }
    }
}

fn write_summary<I>(path: &Path, header: &[&str], rows: I) -> anyhow::Result<()>
where
    I: Iterator<Item = Vec<String>>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("writing summary {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_header(header);
    table.remove_style(TableComponent::HorizontalLines);
    table.remove_style(TableComponent::MiddleIntersections);
    table.remove_style(TableComponent::LeftBorderIntersections);
    table.remove_style(TableComponent::RightBorderIntersections);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Source;
    use chrono::NaiveDate;

    fn txn(date: Option<&str>, account: &str, amount: f64, category: &str) -> Transaction {
        Transaction {
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            description: format!("{} PURCHASE", category.to_uppercase()),
            amount,
            source: Source::Bank,
            account: account.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_totals_by_category_sorted() {
        let ledger = vec![
            txn(Some("2024-01-01"), "Chequing", -10.0, "Shopping"),
            txn(Some("2024-01-02"), "Chequing", -20.0, "Shopping"),
            txn(Some("2024-01-03"), "Chequing", 100.0, "Income"),
        ];
        let totals = totals_by_category(&ledger);
        assert_eq!(totals[0], ("Income".to_string(), 100.0));
        assert_eq!(totals[1], ("Shopping".to_string(), -30.0));
    }

    #[test]
    fn test_totals_by_month_excludes_undated_rows() {
        let ledger = vec![
            txn(Some("2024-01-15"), "Chequing", -10.0, "Shopping"),
            txn(Some("2024-02-15"), "Chequing", -5.0, "Shopping"),
            txn(None, "Chequing", -99.0, "Shopping"),
        ];
        let totals = totals_by_month(&ledger);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0], ((2024, 1, "Shopping".to_string()), -10.0));
        assert_eq!(totals[1], ((2024, 2, "Shopping".to_string()), -5.0));
    }

    #[test]
    fn test_totals_by_account() {
        let ledger = vec![
            txn(Some("2024-01-01"), "Paul", -10.0, "Shopping"),
            txn(Some("2024-01-02"), "Paul", -90.0, "Travel"),
            txn(Some("2024-01-03"), "Sarah", -1.0, "Shopping"),
        ];
        let totals = totals_by_account(&ledger);
        // ordered by account, then amount ascending within the account
        assert_eq!(totals[0].0, ("Paul".to_string(), "Travel".to_string()));
        assert_eq!(totals[1].0, ("Paul".to_string(), "Shopping".to_string()));
        assert_eq!(totals[2].0, ("Sarah".to_string(), "Shopping".to_string()));
    }

    #[test]
    fn test_uncategorized_counts() {
        let mut mystery = txn(Some("2024-01-01"), "Chequing", -1.0, UNCATEGORIZED);
        mystery.description = "MYSTERY SHOP".to_string();
        let ledger = vec![
            mystery.clone(),
            mystery,
            txn(Some("2024-01-02"), "Chequing", -2.0, "Shopping"),
        ];
        let counts = uncategorized_counts(&ledger);
        assert_eq!(counts, vec![("MYSTERY SHOP".to_string(), 2)]);
    }
}
