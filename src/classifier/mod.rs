use crate::rules::RuleStore;

/// Category assigned when no rule matches.
pub(crate) const UNCATEGORIZED: &str = "Uncategorized";

/// Match a description against the rule table. Rules are tried in store
/// order and the first match wins; order is the only tie-break, so a newly
/// appended rule never shadows an older one.
pub(crate) fn classify(description: &str, rules: &RuleStore) -> String {
    let description = description.trim().to_uppercase();
    if description.is_empty() {
        return UNCATEGORIZED.to_string();
    }

    for rule in rules.iter() {
        if rule.matches(&description) {
            return rule.category.clone();
        }
    }

    UNCATEGORIZED.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::KeywordRule;

    fn store() -> RuleStore {
        RuleStore::from_rules(vec![
            KeywordRule::new("PAYROLL", "Income"),
            KeywordRule::new("NETFLIX*", "Subscriptions"),
            KeywordRule::new("UBER", "Transportation"),
        ])
    }

    #[test]
    fn test_exact_substring() {
        assert_eq!(classify("ACME CORP PAYROLL DEP 004522", &store()), "Income");
        assert_eq!(classify("uber trip help.uber.com", &store()), "Transportation");
    }

    #[test]
    fn test_wildcard() {
        let store = store();
        assert_eq!(classify("NETFLIX.COM-5678", &store), "Subscriptions");
        assert_eq!(classify("NETFLIX CANADA", &store), "Subscriptions");
        assert_eq!(classify("ANTINETFLIXSHOP", &store), UNCATEGORIZED);
    }

    #[test]
    fn test_first_match_wins() {
        // Both rules match; the earlier one in store order takes precedence.
        let store = RuleStore::from_rules(vec![
            KeywordRule::new("UBER EATS", "Food & Dining"),
            KeywordRule::new("UBER", "Transportation"),
        ]);
        assert_eq!(classify("UBER EATS TORONTO", &store), "Food & Dining");

        let reversed = RuleStore::from_rules(vec![
            KeywordRule::new("UBER", "Transportation"),
            KeywordRule::new("UBER EATS", "Food & Dining"),
        ]);
        assert_eq!(classify("UBER EATS TORONTO", &reversed), "Transportation");
    }

    #[test]
    fn test_no_match_and_blank() {
        assert_eq!(classify("MYSTERY MERCHANT 123", &store()), UNCATEGORIZED);
        assert_eq!(classify("", &store()), UNCATEGORIZED);
        assert_eq!(classify("   ", &store()), UNCATEGORIZED);
    }
}
