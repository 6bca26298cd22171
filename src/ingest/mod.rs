use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::bail;
use chrono::NaiveDate;
use comfy_table::{Table, TableComponent};
use csv::{ReaderBuilder, StringRecord};
use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

use crate::classifier::UNCATEGORIZED;
use crate::config::Config;
use crate::transaction::{Source, Transaction};

#[cfg(test)]
mod tests;

lazy_static! {
    static ref HEADER_REGEX: Regex =
        Regex::new(r"(?i)date|description|narrative|merchant|amount|debit|credit|card").unwrap();
}

/// A statement file split into an optional header row and data rows.
struct RawTable {
    headers: Option<StringRecord>,
    rows: Vec<StringRecord>,
}

/// Read and normalize every statement file under `folder`. A file that
/// cannot be processed is logged and skipped; one bad statement never aborts
/// the batch.
pub(crate) fn read_statements(folder: &Path, config: &Config) -> Vec<Transaction> {
    let files = match scan_statement_files(folder) {
        Ok(files) => files,
        Err(e) => {
            warn!("Unable to scan {}: {}", folder.display(), e);
            return vec![];
        }
    };

    if files.is_empty() {
        warn!("No CSV files found in {}", folder.display());
        return vec![];
    }
    info!("Found {} statement files", files.len());

    let mut all = vec![];
    for file in files {
        match read_statement_file(&file, config) {
            Ok(mut transactions) => {
                info!(
                    "Processed {}: {} transactions",
                    file.display(),
                    transactions.len()
                );
                all.append(&mut transactions);
            }
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    all
}

/// Scan a dir recursively and list all eligible statement files.
pub(crate) fn scan_statement_files(root_path: &Path) -> anyhow::Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    let walker = WalkDir::new(root_path).into_iter();
    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let dir_entry = entry?;
        // Ignore symlinks and directories
        if dir_entry.path_is_symlink() || dir_entry.path().is_dir() {
            continue;
        }

        let path = dir_entry.path();
        if path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
        {
            files.insert(path.to_path_buf());
        }
    }

    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn read_statement_file(path: &Path, config: &Config) -> anyhow::Result<Vec<Transaction>> {
    let raw = read_raw(path)?;
    if is_credit_file(path, raw.headers.as_ref()) {
        normalize_credit(&raw, config)
    } else {
        normalize_bank(&raw)
    }
}

fn read_raw(path: &Path) -> anyhow::Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows: Vec<StringRecord> = vec![];
    for record in reader.records() {
        rows.push(record?);
    }
    if rows.is_empty() {
        bail!("file is empty");
    }

    // A header row mentions column names and does not start with a date;
    // headerless bank exports start every row with the transaction date.
    let first = &rows[0];
    let joined = first.iter().collect::<Vec<&str>>().join("|");
    let has_header = HEADER_REGEX.is_match(&joined) && parse_date(first.get(0).unwrap_or("")).is_none();

    if has_header {
        let headers = rows.remove(0);
        Ok(RawTable {
            headers: Some(headers),
            rows,
        })
    } else {
        Ok(RawTable {
            headers: None,
            rows,
        })
    }
}

/// Credit-card statements are detected by filename convention or by the
/// presence of a card number column.
fn is_credit_file(path: &Path, headers: Option<&StringRecord>) -> bool {
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("")
        .to_lowercase();
    if filename.contains("transaction_download") || filename.contains("credit") {
        return true;
    }

    match headers {
        Some(headers) => find_column(headers, CARD_VARIANTS).is_some(),
        None => false,
    }
}

const DATE_VARIANTS: &[&str] = &["transaction date", "date", "posted date", "posting date"];
const DESCRIPTION_VARIANTS: &[&str] = &[
    "description",
    "description 1",
    "narrative",
    "merchant name",
    "transaction details",
];
const AMOUNT_VARIANTS: &[&str] = &["amount", "cad$"];
const DEBIT_VARIANTS: &[&str] = &["debit", "withdrawal"];
const CREDIT_VARIANTS: &[&str] = &["credit", "deposit"];
const CARD_VARIANTS: &[&str] = &["card no.", "card number", "card"];

fn find_column(headers: &StringRecord, variants: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| variants.contains(&h.trim().to_lowercase().as_str()))
}

fn normalize_bank(raw: &RawTable) -> anyhow::Result<Vec<Transaction>> {
    match &raw.headers {
        Some(headers) => {
            let date_idx = find_column(headers, DATE_VARIANTS);
            let description_idx = find_column(headers, DESCRIPTION_VARIANTS);
            let amount_idx = find_column(headers, AMOUNT_VARIANTS);
            let debit_idx = find_column(headers, DEBIT_VARIANTS);
            let credit_idx = find_column(headers, CREDIT_VARIANTS);

            if amount_idx.is_none() && (debit_idx.is_none() || credit_idx.is_none()) {
                bail!("unable to locate an amount column");
            }

            let mut transactions = vec![];
            for row in &raw.rows {
                let amount = match amount_idx {
                    Some(i) => parse_amount(row.get(i).unwrap_or("")),
                    None => {
                        // Credit is income, debit is spending.
                        let debit = parse_amount(row.get(debit_idx.unwrap()).unwrap_or(""));
                        let credit = parse_amount(row.get(credit_idx.unwrap()).unwrap_or(""));
                        credit - debit
                    }
                };
                transactions.push(bank_transaction(
                    date_idx.and_then(|i| parse_date(row.get(i).unwrap_or(""))),
                    description(row, description_idx),
                    amount,
                ));
            }
            Ok(transactions)
        }
        None => normalize_headerless_bank(&raw.rows),
    }
}

/// Headerless bank exports come in a 3-column (date, amount, description)
/// or 4-column (date, amount, extra, description) layout.
fn normalize_headerless_bank(rows: &[StringRecord]) -> anyhow::Result<Vec<Transaction>> {
    let columns = rows[0].len();
    if columns != 3 && columns != 4 {
        bail!("unrecognized headerless bank format with {} columns", columns);
    }

    let mut transactions = vec![];
    for row in rows {
        let date = parse_date(row.get(0).unwrap_or(""));
        let amount = parse_amount(row.get(1).unwrap_or(""));
        let description = if columns == 3 {
            row.get(2).unwrap_or("").to_string()
        } else {
            format!("{} {}", row.get(2).unwrap_or(""), row.get(3).unwrap_or(""))
                .trim()
                .to_string()
        };
        transactions.push(bank_transaction(date, description, amount));
    }
    Ok(transactions)
}

fn bank_transaction(date: Option<NaiveDate>, description: String, amount: f64) -> Transaction {
    Transaction {
        date,
        description,
        amount,
        source: Source::Bank,
        account: "Chequing".to_string(),
        category: UNCATEGORIZED.to_string(),
    }
}

fn normalize_credit(raw: &RawTable, config: &Config) -> anyhow::Result<Vec<Transaction>> {
    let headers = match &raw.headers {
        Some(headers) => headers,
        None => bail!("credit card statement without a header row"),
    };

    let date_idx = find_column(headers, DATE_VARIANTS);
    let description_idx = find_column(headers, DESCRIPTION_VARIANTS);
    let amount_idx = find_column(headers, AMOUNT_VARIANTS);
    let debit_idx = find_column(headers, DEBIT_VARIANTS);
    let credit_idx = find_column(headers, CREDIT_VARIANTS);
    let card_idx = find_column(headers, CARD_VARIANTS);

    if amount_idx.is_none() && (debit_idx.is_none() || credit_idx.is_none()) {
        bail!("unable to locate an amount column");
    }

    let mut transactions = vec![];
    for row in &raw.rows {
        let amount = match amount_idx {
            // Positive statement amounts are purchases; store spending as
            // negative like bank rows.
            Some(i) => -parse_amount(row.get(i).unwrap_or("")).abs(),
            None => {
                let debit = parse_amount(row.get(debit_idx.unwrap()).unwrap_or(""));
                let credit = parse_amount(row.get(credit_idx.unwrap()).unwrap_or(""));
                credit - debit
            }
        };

        let account = match card_idx {
            Some(i) => card_account(row.get(i).unwrap_or(""), config),
            None => "CreditCard".to_string(),
        };

        transactions.push(Transaction {
            date: date_idx.and_then(|i| parse_date(row.get(i).unwrap_or(""))),
            description: description(row, description_idx),
            amount,
            source: Source::CreditCard,
            account,
            category: UNCATEGORIZED.to_string(),
        });
    }
    Ok(transactions)
}

/// Map the last 4 digits of a card number to an account holder name.
fn card_account(card: &str, config: &Config) -> String {
    let card = card.trim();
    let last4: String = card
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<char>>()
        .into_iter()
        .rev()
        .collect();
    match config.card_accounts.get(&last4) {
        Some(account) => account.clone(),
        None => {
            warn!("Unknown card ending in {}", last4);
            "UnknownCard".to_string()
        }
    }
}

fn description(row: &StringRecord, description_idx: Option<usize>) -> String {
    match description_idx {
        Some(i) => row.get(i).unwrap_or("").trim().to_string(),
        None => "Unknown Transaction".to_string(),
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d %b %Y", "%Y/%m/%d"];

/// Lenient date parsing. Returns None for anything unrecognized; rows with
/// unparsable dates are kept and sorted last in the ledger.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Keep only the date part of timestamp forms like 2023-01-05T17:30:45
    let s = if s.len() >= 11 && s.as_bytes()[10] == b'T' {
        &s[..10]
    } else {
        s
    };

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Lenient amount parsing: currency symbols and thousand separators are
/// stripped; anything unparsable coerces to 0.0 rather than failing the row.
pub(crate) fn parse_amount(s: &str) -> f64 {
    s.replace(['$', ','], "").trim().parse::<f64>().unwrap_or(0.0)
}

/// Print the detected structure of every statement file without processing
/// anything. Used by `--inspect`.
pub(crate) fn inspect_folder(folder: &Path) -> anyhow::Result<()> {
    let files = scan_statement_files(folder)?;
    if files.is_empty() {
        warn!("No CSV files found in {}", folder.display());
        return Ok(());
    }

    for file in files {
        match read_raw(&file) {
            Ok(raw) => {
                println!("\nFile: {}", file.display());
                match &raw.headers {
                    Some(headers) => {
                        println!("Columns: {:?}", headers.iter().collect::<Vec<&str>>())
                    }
                    None => println!("Columns: none detected ({} fields per row)", raw.rows[0].len()),
                }

                let mut table = Table::new();
                table.remove_style(TableComponent::HorizontalLines);
                table.remove_style(TableComponent::MiddleIntersections);
                table.remove_style(TableComponent::LeftBorderIntersections);
                table.remove_style(TableComponent::RightBorderIntersections);
                if let Some(headers) = &raw.headers {
                    table.set_header(headers.iter().collect::<Vec<&str>>());
                }
                for row in raw.rows.iter().take(5) {
                    table.add_row(row.iter().collect::<Vec<&str>>());
                }
                println!("{table}");
            }
            Err(e) => warn!("Error reading {}: {}", file.display(), e),
        }
    }

    Ok(())
}
