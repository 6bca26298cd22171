use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Runtime configuration. Every field has a compiled-in default so the tool
/// works without a config file; a `tally.toml` in the working directory or
/// under the user config dir overrides individual fields.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Config {
    /// Keyword rule table, rewritten wholesale on save.
    pub(crate) rules_file: PathBuf,

    /// Cumulative master ledger of all categorized transactions.
    pub(crate) ledger_file: PathBuf,

    /// Transaction prefixes stripped before keyword extraction.
    pub(crate) strip_prefixes: Vec<String>,

    /// Merchants that always get wildcard rules; their descriptions carry
    /// variable suffixes such as store numbers or billing references.
    pub(crate) brands: Vec<String>,

    /// Categories offered during manual selection even when no rule uses
    /// them yet.
    pub(crate) extended_categories: Vec<String>,

    /// Last-4 card digits to account holder name.
    pub(crate) card_accounts: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            rules_file: PathBuf::from("categories.csv"),
            ledger_file: PathBuf::from("all_transactions.csv"),
            strip_prefixes: [
                "POS PURCHASE - ",
                "INTERAC PURCHASE - ",
                "VISA DEBIT PURCHASE - ",
                "E-TRANSFER ",
                "BILL PAYMENT - ",
                "PREAUTHORIZED DEBIT - ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            brands: [
                "NETFLIX", "SPOTIFY", "AMAZON", "UBER", "AIRBNB", "APPLE", "STARBUCKS", "TIM",
                "COSTCO", "WALMART", "GOOGLE", "MICROSOFT", "PAYPAL", "EBAY", "FACEBOOK", "ADOBE",
                "DROPBOX",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            extended_categories: [
                "Income",
                "Food & Dining",
                "Shopping",
                "Transportation",
                "Utilities",
                "Entertainment",
                "Healthcare",
                "Insurance",
                "Housing & Utilities",
                "Cash Withdrawal",
                "Transfer",
                "Education",
                "Personal Care",
                "Gifts & Donations",
                "Fees",
                "Electronics",
                "Home Improvement",
                "Travel",
                "Subscriptions",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            card_accounts: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from the explicit path if given, otherwise from
    /// `./tally.toml`, otherwise from the user config dir. A missing file is
    /// not an error; a file that fails to parse is.
    pub(crate) fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(p) => vec![p.to_path_buf()],
            None => {
                let mut c = vec![PathBuf::from("tally.toml")];
                if let Some(dir) = dirs::config_dir() {
                    c.push(dir.join("tally").join("config.toml"));
                }
                c
            }
        };

        for path in candidates {
            if path.exists() && path.is_file() {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("parsing config {}", path.display()))?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rules_file, PathBuf::from("categories.csv"));
        assert!(config.brands.contains(&"NETFLIX".to_string()));
        assert!(config.strip_prefixes.iter().any(|p| p == "E-TRANSFER "));
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(r#"rules_file = "my_rules.csv""#).unwrap();
        assert_eq!(config.rules_file, PathBuf::from("my_rules.csv"));
        // untouched fields keep their defaults
        assert_eq!(config.ledger_file, PathBuf::from("all_transactions.csv"));
        assert!(!config.extended_categories.is_empty());
    }

    #[test]
    fn test_card_accounts_override() {
        let config: Config = toml::from_str(
            r#"
            [card_accounts]
            "1522" = "Paul"
            "7256" = "Sarah"
            "#,
        )
        .unwrap();
        assert_eq!(config.card_accounts.get("1522"), Some(&"Paul".to_string()));
    }
}
