use std::collections::{HashMap, HashSet};

use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::classifier::{classify, UNCATEGORIZED};
use crate::config::Config;
use crate::extract::extract_keyword;
use crate::oracle::Oracle;
use crate::rules::RuleStore;

/// What the user chose to do with one unresolved description.
pub(crate) enum Action {
    Manual,
    AiSuggest,
    Skip,
    Abort,
}

pub(crate) enum ManualPick {
    Category(String),
    Abort,
}

/// Input seam for the labeling loop, so the state machine is testable
/// without a terminal.
pub(crate) trait Prompt {
    fn choose_action(&mut self, description: &str, candidate_keyword: &str) -> Action;
    fn pick_category(&mut self, categories: &[String]) -> ManualPick;
    fn confirm_suggestion(&mut self, suggestion: &str) -> bool;
}

/// Result of one labeling session.
pub(crate) struct LabelOutcome {
    /// Descriptions resolved this session, and the category chosen for each.
    pub(crate) resolved: HashMap<String, String>,
    /// Descriptions the user chose to leave uncategorized this session.
    pub(crate) skipped: HashSet<String>,
    pub(crate) rules_added: usize,
    pub(crate) aborted: bool,
}

enum State {
    AwaitingInput,
    Manual,
    AiSuggest,
}

enum ItemResult {
    Labeled(String),
    Skipped,
    Aborted,
}

/// Categories offered during manual selection: every category referenced by
/// a rule plus the configured extended set.
pub(crate) fn canonical_categories(rules: &RuleStore, config: &Config) -> Vec<String> {
    let mut categories = rules.categories();
    categories.extend(config.extended_categories.iter().cloned());
    categories.sort();
    categories.dedup();
    categories
}

/// Walk the unresolved descriptions once, collecting a decision for each.
/// Every successful decision appends a rule synthesized from the keyword
/// extractor. Each distinct description is visited at most once per session;
/// `Abort` stops the walk, leaving the remaining descriptions untouched so
/// the caller can persist what was added so far.
pub(crate) fn run_labeling_loop(
    unresolved: &[String],
    rules: &mut RuleStore,
    config: &Config,
    oracle: &dyn Oracle,
    prompt: &mut dyn Prompt,
) -> LabelOutcome {
    let mut outcome = LabelOutcome {
        resolved: HashMap::new(),
        skipped: HashSet::new(),
        rules_added: 0,
        aborted: false,
    };

    for description in unresolved {
        if outcome.resolved.contains_key(description) || outcome.skipped.contains(description) {
            continue;
        }
        // A rule added earlier in the session may already cover this one.
        if classify(description, rules) != UNCATEGORIZED {
            continue;
        }

        match resolve_one(description, rules, config, oracle, prompt) {
            ItemResult::Labeled(category) => {
                let keyword = extract_keyword(description, config);
                rules.append(&keyword, &category);
                info!("Added rule: '{}' -> '{}'", keyword, category);

                // Self-check: the fresh rule should match its own trigger.
                let check = classify(description, rules);
                if check != category {
                    warn!(
                        "New rule '{}' does not match '{}', which classified as '{}'",
                        keyword, description, check
                    );
                }

                outcome.resolved.insert(description.clone(), category);
                outcome.rules_added += 1;
            }
            ItemResult::Skipped => {
                outcome.skipped.insert(description.clone());
            }
            ItemResult::Aborted => {
                outcome.aborted = true;
                break;
            }
        }
    }

    outcome
}

/// Drive the per-item state machine. The AI-suggestion path never re-enters
/// itself: every failure transitions to manual selection.
fn resolve_one(
    description: &str,
    rules: &RuleStore,
    config: &Config,
    oracle: &dyn Oracle,
    prompt: &mut dyn Prompt,
) -> ItemResult {
    let categories = canonical_categories(rules, config);
    let candidate_keyword = extract_keyword(description, config);

    let mut state = State::AwaitingInput;
    loop {
        match state {
            State::AwaitingInput => match prompt.choose_action(description, &candidate_keyword) {
                Action::Manual => state = State::Manual,
                Action::AiSuggest => state = State::AiSuggest,
                Action::Skip => return ItemResult::Skipped,
                Action::Abort => return ItemResult::Aborted,
            },
            State::Manual => match prompt.pick_category(&categories) {
                ManualPick::Category(category) => return ItemResult::Labeled(category),
                ManualPick::Abort => return ItemResult::Aborted,
            },
            State::AiSuggest => match oracle.suggest(description, &categories) {
                Ok(suggestion) => {
                    if prompt.confirm_suggestion(&suggestion) {
                        return ItemResult::Labeled(suggestion);
                    }
                    state = State::Manual;
                }
                Err(e) => {
                    warn!("AI suggestion unavailable: {}", e);
                    state = State::Manual;
                }
            },
        }
    }
}

/// Terminal-backed prompt, driven by rustyline.
pub(crate) struct ConsolePrompt {
    editor: DefaultEditor,
}

impl ConsolePrompt {
    pub(crate) fn new() -> anyhow::Result<ConsolePrompt> {
        Ok(ConsolePrompt {
            editor: DefaultEditor::new()?,
        })
    }

    fn readline(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Some(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => None,
            Err(e) => {
                warn!("Input error: {}", e);
                None
            }
        }
    }
}

impl Prompt for ConsolePrompt {
    fn choose_action(&mut self, description: &str, candidate_keyword: &str) -> Action {
        println!("\nUncategorized transaction: '{}'", description);
        println!("Candidate keyword: '{}'", candidate_keyword);
        println!("1. Select category manually");
        println!("2. Let AI suggest a category");
        println!("3. Skip this transaction");
        println!("4. Exit and save progress");

        loop {
            match self.readline("Enter choice (1-4): ") {
                Some(line) => match line.as_str() {
                    "1" => return Action::Manual,
                    "2" => return Action::AiSuggest,
                    "3" => return Action::Skip,
                    "4" => return Action::Abort,
                    _ => println!("Invalid input. Please enter a number between 1 and 4."),
                },
                None => return Action::Abort,
            }
        }
    }

    fn pick_category(&mut self, categories: &[String]) -> ManualPick {
        println!("\nAvailable categories:");
        for (i, category) in categories.iter().enumerate() {
            println!("{:2}. {}", i + 1, category);
        }

        loop {
            let line = match self.readline(
                "Enter category number (or 'new' to create new, 'exit' to save and quit): ",
            ) {
                Some(line) => line,
                None => return ManualPick::Abort,
            };

            match line.to_lowercase().as_str() {
                "exit" => return ManualPick::Abort,
                "new" => match self.readline("Enter new category name: ") {
                    Some(name) if !name.is_empty() => return ManualPick::Category(name),
                    Some(_) => println!("Category name cannot be empty."),
                    None => return ManualPick::Abort,
                },
                _ => match line.parse::<usize>() {
                    Ok(n) if n >= 1 && n <= categories.len() => {
                        return ManualPick::Category(categories[n - 1].clone())
                    }
                    _ => println!("Invalid input. Please enter a number or 'new'."),
                },
            }
        }
    }

    fn confirm_suggestion(&mut self, suggestion: &str) -> bool {
        println!("\nAI suggests: '{}'", suggestion);
        match self.readline("Accept this suggestion? (Y/n): ") {
            Some(line) => !line.eq_ignore_ascii_case("n"),
            None => false,
        }
    }
}
