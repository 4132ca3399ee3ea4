//! Classify command: run the keyword patterns over individual words.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use bolder_core::patterns::Classification;
use bolder_core::tokenize::normalize_token;

/// Arguments for the `classify` subcommand.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Words to classify.
    #[arg(required = true)]
    pub words: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WordClass {
    input: String,
    normalized: Option<String>,
    #[serde(flatten)]
    classification: Classification,
    keyword: bool,
    start_override: bool,
}

impl WordClass {
    fn of(input: &str) -> Self {
        let normalized = normalize_token(input).map(|t| t.normalized);
        let classification = normalized
            .as_deref()
            .map(Classification::of)
            .unwrap_or_default();
        Self {
            input: input.to_string(),
            normalized,
            classification,
            keyword: classification.is_auto_detect_candidate(),
            start_override: classification.is_registry_start_candidate(),
        }
    }

    fn patterns(&self) -> Vec<&'static str> {
        let c = &self.classification;
        [
            (c.all_caps, "all-caps"),
            (c.capitalized, "capitalized"),
            (c.mixed_case, "mixed-case"),
            (c.hyphenated, "hyphenated"),
        ]
        .into_iter()
        .filter_map(|(hit, name)| hit.then_some(name))
        .collect()
    }
}

/// Print the pattern matches for each word.
#[instrument(name = "cmd_classify", skip_all, fields(words = args.words.len()))]
pub fn cmd_classify(args: ClassifyArgs, global_json: bool) -> anyhow::Result<()> {
    debug!("executing classify command");
    let classes: Vec<WordClass> = args.words.iter().map(|w| WordClass::of(w)).collect();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&classes)?);
        return Ok(());
    }

    for class in &classes {
        let patterns = class.patterns();
        if patterns.is_empty() {
            println!("{}: {}", class.input.bold(), "plain".dimmed());
        } else {
            println!("{}: {}", class.input.bold(), patterns.join(", ").green());
        }
    }
    Ok(())
}
