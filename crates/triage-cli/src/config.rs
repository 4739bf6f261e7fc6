//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Parser;
use triage_core::TextFormatter;

/// Embedding models evaluated when none are given.
pub const DEFAULT_MODELS: [&str; 5] = [
    "all-MiniLM-L6-v2",
    "all-mpnet-base-v2",
    "paraphrase-MiniLM-L3-v2",
    "BAAI/bge-large-en-v1.5",
    "sentence-t5-base",
];

/// Classify backlog items into work colours with several embedding models
/// and write one CSV column per model.
#[derive(Debug, Parser)]
#[command(name = "triage", version, about)]
pub struct Cli {
    /// SQL file run against DuckDB to extract backlog rows (must yield a text column).
    #[arg(long, env = "TRIAGE_SQL", default_value = "sql/extract-sprint-and-description.sql")]
    pub sql: PathBuf,

    /// Where the classified CSV is written.
    #[arg(long, env = "TRIAGE_OUTPUT", default_value = "classified_backlog_all_models.csv")]
    pub output: PathBuf,

    /// Root directory holding one ONNX model directory per provider id.
    #[arg(long, env = "TRIAGE_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Embedding model to evaluate; repeat (or comma-separate) for several.
    #[arg(
        long = "model",
        env = "TRIAGE_MODELS",
        value_delimiter = ',',
        default_values = DEFAULT_MODELS
    )]
    pub models: Vec<String>,

    /// JSON taxonomy file (`[{"id": ..., "prototype_text": ...}]`); built-in colours if omitted.
    #[arg(long, env = "TRIAGE_TAXONOMY")]
    pub taxonomy: Option<PathBuf>,

    /// Name of the column holding the item text.
    #[arg(long, env = "TRIAGE_TEXT_COLUMN", default_value = "text")]
    pub text_column: String,

    /// Extra prompt prefix as NEEDLE=PREFIX, applied to models whose id contains NEEDLE.
    #[arg(long = "prefix", value_name = "NEEDLE=PREFIX", value_parser = parse_prefix)]
    pub prefixes: Vec<(String, String)>,

    /// Maximum tokens per input; longer texts are truncated.
    #[arg(long, env = "TRIAGE_MAX_LENGTH", default_value_t = 256)]
    pub max_length: usize,

    /// DuckDB database file to open; in-memory if omitted.
    #[arg(long, env = "TRIAGE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default formatter rules followed by any `--prefix` rules, in order.
    pub fn formatter(&self) -> TextFormatter {
        let mut formatter = TextFormatter::default();
        for (needle, prefix) in &self.prefixes {
            formatter.register_contains(needle.clone(), prefix.clone());
        }
        formatter
    }
}

fn parse_prefix(s: &str) -> Result<(String, String), String> {
    let (needle, prefix) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NEEDLE=PREFIX, got {s:?}"))?;
    if needle.is_empty() {
        return Err("NEEDLE must not be empty".into());
    }
    Ok((needle.to_string(), prefix.to_string()))
}
