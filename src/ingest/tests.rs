use std::path::PathBuf;

use chrono::NaiveDate;

use super::*;
use crate::transaction::Source;

/// Return the path to a file within the test data directory
fn fixture_filename(filename: &str) -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.push("fixture");
    dir.push(filename);
    dir
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.card_accounts.insert("1522".to_string(), "Paul".to_string());
    config.card_accounts.insert("7256".to_string(), "Sarah".to_string());
    config
}

fn date(s: &str) -> Option<NaiveDate> {
    Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
}

#[test]
fn test_bank_with_header() {
    let rows = read_statement_file(&fixture_filename("bank_header.csv"), &test_config()).unwrap();
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].date, date("2024-01-05"));
    assert_eq!(rows[0].description, "ACME CORP PAYROLL DEP");
    assert_eq!(rows[0].amount, 2500.00);
    assert_eq!(rows[0].source, Source::Bank);
    assert_eq!(rows[0].account, "Chequing");

    // unparsable date and amount are coerced, not dropped
    assert_eq!(rows[2].date, None);
    assert_eq!(rows[2].amount, 0.0);
}

#[test]
fn test_bank_withdrawal_deposit_columns() {
    let rows =
        read_statement_file(&fixture_filename("bank_withdrawal_deposit.csv"), &test_config())
            .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, date("2024-01-05"));
    assert_eq!(rows[0].amount, -43.10);
    assert_eq!(rows[1].amount, 120.00);
}

#[test]
fn test_headerless_bank() {
    let rows =
        read_statement_file(&fixture_filename("bank_headerless.csv"), &test_config()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, date("2024-02-01"));
    assert_eq!(rows[0].description, "NETFLIX.COM-5678");
    assert_eq!(rows[0].amount, -19.99);
    assert_eq!(rows[1].amount, 1250.00);
}

#[test]
fn test_headerless_bank_4_columns() {
    let rows =
        read_statement_file(&fixture_filename("bank_headerless_4col.csv"), &test_config()).unwrap();
    assert_eq!(rows.len(), 2);
    // extra column folds into the description
    assert_eq!(rows[0].description, "POS PURCHASE EQUATOR COFFEE ROASTERS");
    assert_eq!(rows[1].description, "BILL PAYMENT ENBRIDGE GAS");
}

#[test]
fn test_credit_card_file() {
    let rows = read_statement_file(
        &fixture_filename("credit_transaction_download.csv"),
        &test_config(),
    )
    .unwrap();
    assert_eq!(rows.len(), 3);

    // purchases are stored as negative amounts
    assert_eq!(rows[0].amount, -4.75);
    assert_eq!(rows[0].source, Source::CreditCard);

    // card last-4 maps to account holders, unknown cards fall back
    assert_eq!(rows[0].account, "Paul");
    assert_eq!(rows[1].account, "Sarah");
    assert_eq!(rows[2].account, "UnknownCard");
}

#[test]
fn test_invalid_file_is_an_error() {
    let result = read_statement_file(&fixture_filename("invalid.csv"), &test_config());
    assert!(result.is_err());
}

#[test]
fn test_folder_scan_skips_bad_files() {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.push("fixture");

    // invalid.csv is skipped with a warning; every valid fixture row survives
    let rows = read_statements(&dir, &test_config());
    assert_eq!(rows.len(), 12);
}

#[test]
fn test_parse_date_formats() {
    assert_eq!(parse_date("2024-01-05"), date("2024-01-05"));
    assert_eq!(parse_date("05/01/2024"), date("2024-01-05"));
    assert_eq!(parse_date("5 Jan 2024"), date("2024-01-05"));
    assert_eq!(parse_date("2024-01-05T17:30:45"), date("2024-01-05"));
    assert_eq!(parse_date("garbage"), None);
    assert_eq!(parse_date(""), None);
}

#[test]
fn test_parse_amount() {
    assert_eq!(parse_amount("$1,250.00"), 1250.00);
    assert_eq!(parse_amount(" -43.10 "), -43.10);
    assert_eq!(parse_amount("abc"), 0.0);
    assert_eq!(parse_amount(""), 0.0);
}
