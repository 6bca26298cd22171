use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use csv::{ReaderBuilder, WriterBuilder};
use log::info;

use crate::transaction::{IdentityKey, Transaction};

/// Load the master ledger, or an empty one when the file does not exist yet.
pub(crate) fn load(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if !path.exists() {
        info!("No master ledger at {}, starting fresh", path.display());
        return Ok(vec![]);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening ledger {}", path.display()))?;

    let mut transactions = vec![];
    for row in reader.deserialize() {
        let t: Transaction = row.with_context(|| format!("reading ledger {}", path.display()))?;
        transactions.push(t);
    }

    info!(
        "Loaded {} transactions from {}",
        transactions.len(),
        path.display()
    );
    Ok(transactions)
}

/// Rewrite the ledger file wholesale.
pub(crate) fn save(path: &Path, transactions: &[Transaction]) -> anyhow::Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("writing ledger {}", path.display()))?;
    for t in transactions {
        writer.serialize(t)?;
    }
    writer.flush()?;
    Ok(())
}

/// Merge newly classified transactions into the existing ledger.
///
/// Rows are deduplicated on the identity key (date, description, amount,
/// source, account) keeping the last occurrence, so a re-imported row with a
/// fresh category overwrites the persisted one. Merging the same batch twice
/// yields the same ledger as merging it once. The result is date-sorted,
/// stable, with unparsable dates placed last.
pub(crate) fn merge(existing: Vec<Transaction>, new: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen: HashMap<IdentityKey, usize> = HashMap::new();
    let mut merged: Vec<Transaction> = vec![];

    for t in existing.into_iter().chain(new) {
        let key = t.identity_key();
        match seen.get(&key) {
            Some(&i) => merged[i] = t,
            None => {
                seen.insert(key, merged.len());
                merged.push(t);
            }
        }
    }

    merged.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Source;
    use chrono::NaiveDate;

    fn txn(date: Option<&str>, description: &str, amount: f64, category: &str) -> Transaction {
        Transaction {
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            description: description.to_string(),
            amount,
            source: Source::Bank,
            account: "Chequing".to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_new_category_overwrites_existing_row() {
        let existing = vec![txn(Some("2024-03-01"), "NETFLIX.COM", -19.99, "B")];
        let new = vec![txn(Some("2024-03-01"), "NETFLIX.COM", -19.99, "A")];

        let merged = merge(existing, new);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].category, "A");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![
            txn(Some("2024-01-05"), "PAYROLL", 2500.0, "Income"),
            txn(Some("2024-01-07"), "LCBO OTTAWA", -43.10, "Entertainment"),
        ];
        let batch = vec![
            txn(Some("2024-01-07"), "LCBO OTTAWA", -43.10, "Entertainment"),
            txn(Some("2024-01-09"), "FARM BOY", -88.20, "Food & Dining"),
        ];

        let once = merge(existing.clone(), batch.clone());
        let twice = merge(once.clone(), batch);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_different_amount_is_a_different_row() {
        let existing = vec![txn(Some("2024-03-01"), "COSTCO", -50.00, "Shopping")];
        let new = vec![txn(Some("2024-03-01"), "COSTCO", -51.00, "Shopping")];
        assert_eq!(merge(existing, new).len(), 2);
    }

    #[test]
    fn test_sorted_by_date_none_last() {
        let existing = vec![
            txn(None, "MYSTERY ROW", -1.0, "Uncategorized"),
            txn(Some("2024-02-01"), "B", -2.0, "Shopping"),
        ];
        let new = vec![txn(Some("2024-01-01"), "A", -3.0, "Shopping")];

        let merged = merge(existing, new);
        assert_eq!(merged[0].description, "A");
        assert_eq!(merged[1].description, "B");
        assert_eq!(merged[2].description, "MYSTERY ROW");
    }

    #[test]
    fn test_uncategorized_rows_are_kept() {
        let merged = merge(vec![], vec![txn(Some("2024-01-01"), "UNKNOWN SHOP", -5.0, "Uncategorized")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].category, "Uncategorized");
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = std::env::temp_dir().join("tally_ledger_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("all_transactions.csv");
        let _ = std::fs::remove_file(&path);

        assert!(load(&path).unwrap().is_empty());

        let transactions = vec![
            txn(Some("2024-01-05"), "PAYROLL", 2500.0, "Income"),
            txn(None, "ODD DATE ROW", -1.25, "Uncategorized"),
        ];
        save(&path, &transactions).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, transactions);

        std::fs::remove_file(&path).unwrap();
    }
}
