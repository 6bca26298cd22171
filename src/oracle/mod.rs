use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

/// External category-suggestion service. Treated as an untrusted, fallible
/// collaborator: any answer that is not exactly one of the supplied
/// categories is an error, and callers fall back to manual selection.
pub(crate) trait Oracle {
    fn suggest(&self, description: &str, categories: &[String]) -> anyhow::Result<String>;
}

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-3-haiku-20240307";

/// Oracle backed by the Anthropic messages API. The call is synchronous and
/// carries no timeout; a hang blocks the run, which is acceptable for a
/// local batch tool.
pub(crate) struct ClaudeOracle {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct Request {
    model: String,
    max_tokens: i32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct Response {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl ClaudeOracle {
    pub(crate) fn from_env() -> ClaudeOracle {
        ClaudeOracle {
            client: reqwest::blocking::Client::new(),
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
        }
    }
}

impl Oracle for ClaudeOracle {
    fn suggest(&self, description: &str, categories: &[String]) -> anyhow::Result<String> {
        let api_key = match &self.api_key {
            Some(k) => k,
            None => bail!("ANTHROPIC_API_KEY not found in environment"),
        };

        let prompt = format!(
            "Given this financial transaction description: '{}'\n\n\
             Choose the most appropriate category from this list:\n{}\n\n\
             Respond with ONLY the category name, nothing else.",
            description,
            categories.join(", ")
        );

        let body = Request {
            model: MODEL.to_string(),
            max_tokens: 50,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .context("calling suggestion API")?;

        let status = response.status();
        if !status.is_success() {
            bail!("suggestion API returned {}", status);
        }

        let payload = response.text().context("reading suggestion response")?;
        let response: Response =
            serde_json::from_str(&payload).context("decoding suggestion response")?;
        let answer = response
            .content
            .first()
            .and_then(|block| block.text.as_deref())
            .unwrap_or("");

        validate_suggestion(answer, categories)
    }
}

/// An answer is only accepted when it is exactly one of the supplied
/// categories; anything else counts as an oracle failure and callers fall
/// back to manual selection.
fn validate_suggestion(answer: &str, categories: &[String]) -> anyhow::Result<String> {
    let answer = answer.trim();
    if !categories.iter().any(|c| c == answer) {
        bail!("suggestion '{}' is not a known category", answer);
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Income".to_string(), "Shopping".to_string()]
    }

    #[test]
    fn test_known_category_accepted() {
        assert_eq!(
            validate_suggestion("Shopping", &categories()).unwrap(),
            "Shopping"
        );
        // surrounding whitespace from the model is tolerated
        assert_eq!(
            validate_suggestion("  Income \n", &categories()).unwrap(),
            "Income"
        );
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!(validate_suggestion("Groceries", &categories()).is_err());
        assert!(validate_suggestion("", &categories()).is_err());
    }

    #[test]
    fn test_category_must_match_exactly() {
        assert!(validate_suggestion("shopping", &categories()).is_err());
        assert!(validate_suggestion("Shopping.", &categories()).is_err());
    }
}
