use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use log::info;

use crate::classifier::{classify, UNCATEGORIZED};
use crate::config::Config;
use crate::label::ConsolePrompt;
use crate::oracle::ClaudeOracle;
use crate::rules::RuleStore;

mod classifier;
mod config;
mod extract;
mod ingest;
mod label;
mod ledger;
mod oracle;
mod report;
mod rules;
mod transaction;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Folder containing statement CSV files
    #[clap(default_value = "statements")]
    folder: PathBuf,

    /// Config file path
    #[clap(long)]
    config: Option<PathBuf>,

    /// Disable interactive categorization of unknown descriptions
    #[clap(long)]
    no_interactive: bool,

    /// Only print detected statement file structures, without processing
    #[clap(long)]
    inspect: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli: Cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    if cli.inspect {
        return ingest::inspect_folder(&cli.folder);
    }

    let mut rules = RuleStore::load(&config.rules_file)?;
    info!("Loaded {} category rules", rules.len());

    let mut transactions = ingest::read_statements(&cli.folder, &config);
    if transactions.is_empty() {
        info!("No transactions were successfully processed");
        return Ok(());
    }
    info!("Combined {} transactions", transactions.len());

    // Classify against a snapshot of the rule store and collect the
    // unresolved descriptions in first-seen order.
    let mut unresolved: Vec<String> = vec![];
    for t in &transactions {
        if t.description.trim().is_empty() {
            continue;
        }
        if classify(&t.description, &rules) == UNCATEGORIZED && !unresolved.contains(&t.description)
        {
            unresolved.push(t.description.clone());
        }
    }

    if !cli.no_interactive && !unresolved.is_empty() {
        info!("{} descriptions need categorization", unresolved.len());
        let oracle = ClaudeOracle::from_env();
        let mut prompt = ConsolePrompt::new()?;
        let outcome =
            label::run_labeling_loop(&unresolved, &mut rules, &config, &oracle, &mut prompt);

        // Persist rule deltas even on abort, so progress is never lost.
        if outcome.rules_added > 0 || outcome.aborted {
            rules.save()?;
        }
        if outcome.aborted {
            info!("Categorization aborted; progress has been saved");
        }
    }

    // Re-classify with the updated store.
    for t in &mut transactions {
        t.category = classify(&t.description, &rules);
    }
    report::print_sample(&transactions);

    let existing = ledger::load(&config.ledger_file)?;
    let existing_count = existing.len();
    let merged = ledger::merge(existing, transactions);
    ledger::save(&config.ledger_file, &merged)?;
    info!(
        "Saved master ledger with {} transactions ({} new) to {}",
        merged.len(),
        merged.len().saturating_sub(existing_count),
        config.ledger_file.display()
    );

    report::write_reports(&merged)?;
    Ok(())
}
