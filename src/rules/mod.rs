use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Persisted shape of a rule row in the rules CSV.
#[derive(Debug, Serialize, Deserialize)]
struct RuleRow {
    #[serde(rename = "Keyword")]
    keyword: String,
    #[serde(rename = "Category")]
    category: String,
}

/// A single (keyword, category) rule. Keywords ending in `*` are wildcard
/// rules: the base must start at a word boundary in the description. Plain
/// keywords match as a substring anywhere.
#[derive(Debug, Clone)]
pub(crate) struct KeywordRule {
    pub(crate) keyword: String,
    pub(crate) category: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Wildcard(Regex),
}

impl KeywordRule {
    pub(crate) fn new(keyword: &str, category: &str) -> KeywordRule {
        let keyword = keyword.trim().to_uppercase();
        let matcher = match keyword.strip_suffix('*') {
            Some(base) => {
                // Anchor at start-of-string or a word separator so NETFLIX*
                // never matches inside ANTINETFLIXSHOP. The base is escaped,
                // so the compile cannot fail.
                let pattern = format!(r"(^|[\s\-_/]){}", regex::escape(base));
                Matcher::Wildcard(Regex::new(&pattern).unwrap())
            }
            None => Matcher::Substring(keyword.clone()),
        };

        KeywordRule {
            keyword,
            category: category.trim().to_string(),
            matcher,
        }
    }

    /// `description` must already be uppercased and trimmed.
    pub(crate) fn matches(&self, description: &str) -> bool {
        match &self.matcher {
            Matcher::Substring(keyword) => description.contains(keyword.as_str()),
            Matcher::Wildcard(regex) => regex.is_match(description),
        }
    }
}

/// Ordered rule table. Insertion order is significant: classification takes
/// the first matching rule, so earlier rules shadow later ones.
pub(crate) struct RuleStore {
    rules: Vec<KeywordRule>,
    file_path: PathBuf,
}

impl RuleStore {
    /// Load rules from `path`, or seed a starter rule set (and write it out)
    /// when the file does not exist yet.
    pub(crate) fn load(path: &Path) -> anyhow::Result<RuleStore> {
        if path.exists() {
            let mut reader = ReaderBuilder::new()
                .has_headers(true)
                .from_path(path)
                .with_context(|| format!("opening rules file {}", path.display()))?;

            let mut rules = vec![];
            for row in reader.deserialize() {
                let row: RuleRow =
                    row.with_context(|| format!("reading rules file {}", path.display()))?;
                rules.push(KeywordRule::new(&row.keyword, &row.category));
            }

            Ok(RuleStore {
                rules,
                file_path: path.to_path_buf(),
            })
        } else {
            let store = RuleStore {
                rules: seed_rules(),
                file_path: path.to_path_buf(),
            };
            info!("No rules file at {}, seeding starter rules", path.display());
            store.save()?;
            Ok(store)
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rules(rules: Vec<KeywordRule>) -> RuleStore {
        RuleStore {
            rules,
            file_path: PathBuf::new(),
        }
    }

    pub(crate) fn append(&mut self, keyword: &str, category: &str) {
        self.rules.push(KeywordRule::new(keyword, category));
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &KeywordRule> {
        self.rules.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    /// Distinct categories currently referenced by rules, sorted.
    pub(crate) fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.rules.iter().map(|r| r.category.clone()).collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Rewrite the rules file wholesale. Duplicate keywords collapse to the
    /// most recently added rule; in-memory order (and therefore lookup
    /// precedence) is left untouched.
    pub(crate) fn save(&self) -> anyhow::Result<()> {
        let deduped = self.deduped();
        let mut writer = WriterBuilder::new()
            .has_headers(true)
            .from_path(&self.file_path)
            .with_context(|| format!("writing rules file {}", self.file_path.display()))?;
        for rule in &deduped {
            writer.serialize(RuleRow {
                keyword: rule.keyword.clone(),
                category: rule.category.clone(),
            })?;
        }
        writer.flush()?;
        info!(
            "Saved {} category rules to {}",
            deduped.len(),
            self.file_path.display()
        );
        Ok(())
    }

    fn deduped(&self) -> Vec<&KeywordRule> {
        let mut deduped: Vec<&KeywordRule> = vec![];
        for (i, rule) in self.rules.iter().enumerate() {
            let has_later = self.rules[i + 1..].iter().any(|r| r.keyword == rule.keyword);
            if !has_later {
                deduped.push(rule);
            }
        }
        deduped
    }
}

/// Starter rule set used when no rules file exists yet.
fn seed_rules() -> Vec<KeywordRule> {
    [
        ("PAYROLL", "Income"),
        ("DEPOSIT", "Income"),
        ("INTERAC E-TRANSFER", "Transfer"),
        ("WITHDRAWAL", "Cash Withdrawal"),
        ("BILL PAYMENT", "Housing & Utilities"),
        ("ENBRIDGE", "Utilities"),
        ("WATER", "Utilities"),
        ("PAYPAL", "Shopping"),
        ("UBER", "Transportation"),
        ("ACT*VILLED", "Utilities"),
        ("CITY OF OTTAWA PARKING", "Transportation"),
        ("IKEA", "Shopping"),
        ("PRINCESS AUTO", "Shopping"),
        ("CANADA COMPUTERS", "Electronics"),
        ("STARBUCKS", "Food & Dining"),
        ("EQUATOR COFFEE", "Food & Dining"),
        ("LCBO", "Entertainment"),
    ]
    .iter()
    .map(|(k, c)| KeywordRule::new(k, c))
    .collect()
}
