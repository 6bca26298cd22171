use lazy_static::lazy_static;
use regex::Regex;

use crate::config::Config;

lazy_static! {
    // Long digit runs are transaction ids, DD/DD tokens are dates. Neither
    // identifies the merchant.
    static ref NOISE_REGEX: Regex = Regex::new(r"\d{6,}|\d{2}/\d{2}").unwrap();
}

/// Derive a candidate rule keyword from an unclassified description. This is
/// a heuristic: near-duplicate keywords across rules are expected and get
/// resolved by classification order and save-time dedupe.
pub(crate) fn extract_keyword(description: &str, config: &Config) -> String {
    let mut desc_upper = description.to_uppercase();
    for prefix in &config.strip_prefixes {
        if let Some(rest) = desc_upper.strip_prefix(prefix.as_str()) {
            desc_upper = rest.to_string();
        }
    }

    let desc_clean = NOISE_REGEX.replace_all(&desc_upper, "");
    let parts: Vec<&str> = desc_clean.split_whitespace().collect();

    if let Some(first_word) = parts.first() {
        // Known brands always get wildcard rules; their descriptions carry
        // variable suffixes.
        for brand in &config.brands {
            if first_word.starts_with(brand.as_str()) {
                return format!("{}*", brand);
            }
        }

        let survivors: Vec<&str> = parts
            .iter()
            .take(3)
            .filter(|p| p.chars().count() > 2 && !p.chars().all(|c| c.is_ascii_digit()))
            .copied()
            .collect();

        if !survivors.is_empty() {
            let mut keyword = survivors
                .iter()
                .take(2)
                .copied()
                .collect::<Vec<&str>>()
                .join(" ");

            // A digit in the last token is usually a store or location code;
            // generalize to a wildcard on the first token instead.
            let last_has_digit = parts
                .last()
                .map(|p| p.chars().any(|c| c.is_ascii_digit()))
                .unwrap_or(false);
            if parts.len() > 2
                && last_has_digit
                && !keyword.contains(['*', '#', '@'])
            {
                keyword = format!("{}*", survivors[0]);
            }

            return keyword;
        }
    }

    desc_upper.chars().take(20).collect::<String>().trim().to_string()
}
