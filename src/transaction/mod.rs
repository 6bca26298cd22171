use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a normalized statement row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum Source {
    Bank,
    CreditCard,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Bank => write!(f, "Bank"),
            Source::CreditCard => write!(f, "CreditCard"),
        }
    }
}

/// A normalized statement row. `date` is None when the statement value could
/// not be parsed; such rows are kept but excluded from date-keyed summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Transaction {
    #[serde(rename = "Date")]
    pub(crate) date: Option<NaiveDate>,
    #[serde(rename = "Description")]
    pub(crate) description: String,
    #[serde(rename = "Amount")]
    pub(crate) amount: f64,
    #[serde(rename = "Source")]
    pub(crate) source: Source,
    #[serde(rename = "Account")]
    pub(crate) account: String,
    #[serde(rename = "Category")]
    pub(crate) category: String,
}

/// Natural key used to detect the same transaction across runs.
pub(crate) type IdentityKey = (Option<NaiveDate>, String, i64, Source, String);

impl Transaction {
    /// Amounts are keyed at cent precision so a row re-read from the ledger
    /// file keys identically to its freshly imported form.
    pub(crate) fn identity_key(&self) -> IdentityKey {
        (
            self.date,
            self.description.clone(),
            (self.amount * 100.0).round() as i64,
            self.source,
            self.account.clone(),
        )
    }

    pub(crate) fn date_display(&self) -> String {
        match self.date {
            Some(d) => d.to_string(),
            None => String::new(),
        }
    }
}
