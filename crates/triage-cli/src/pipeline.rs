//! Extract → classify per provider → assemble → persist.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};
use triage_ai::{Harness, ProviderLoader, ProviderOutcome};
use triage_core::table::{self, TableError};
use triage_core::{ProviderId, Taxonomy, TaxonomyError};
use triage_store::{DuckStore, StoreError};

use crate::config::Cli;

/// A pipeline failure, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("{0}")]
    Extract(#[source] StoreError),

    #[error("{0}")]
    Input(#[source] TableError),

    #[error("{0}")]
    Assemble(#[source] TableError),

    #[error("{0}")]
    Persist(#[source] StoreError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Taxonomy(_) => "taxonomy",
            Self::Extract(_) | Self::Input(_) => "extract",
            Self::Assemble(_) => "assemble",
            Self::Persist(_) => "persist",
        }
    }
}

/// One prediction column written to the output.
#[derive(Debug)]
pub struct ColumnReport {
    pub name: String,
    pub rows: usize,
    pub elapsed: Duration,
}

/// What a successful run produced.
#[derive(Debug)]
pub struct Summary {
    pub output: PathBuf,
    pub rows: usize,
    /// Prediction columns, in provider order.
    pub columns: Vec<ColumnReport>,
    /// Providers that were requested but produced no column.
    pub skipped: Vec<ProviderId>,
}

/// Run the whole pipeline with ONNX models from `--models-dir`.
pub fn run(cli: &Cli) -> Result<Summary, PipelineError> {
    let loader = triage_ai::OnnxLoader::new(&cli.models_dir).with_max_length(cli.max_length);
    run_with_loader(cli, &loader)
}

/// Run the whole pipeline with an arbitrary provider loader.
pub fn run_with_loader(
    cli: &Cli,
    loader: &dyn ProviderLoader,
) -> Result<Summary, PipelineError> {
    let taxonomy = match &cli.taxonomy {
        Some(path) => Taxonomy::from_json_file(path)?,
        None => Taxonomy::work_colors(),
    };
    let formatter = cli.formatter();

    let store = match &cli.database {
        Some(path) => DuckStore::open_persistent(path),
        None => DuckStore::open(),
    }
    .map_err(PipelineError::Extract)?;
    let batches = store
        .extract_from_file(&cli.sql)
        .map_err(PipelineError::Extract)?;
    let texts = table::extract_texts(&batches, &cli.text_column).map_err(PipelineError::Input)?;

    let providers: Vec<ProviderId> = cli.models.iter().map(|m| ProviderId::new(m.as_str())).collect();
    let harness = Harness::new(&taxonomy, &formatter, loader)
        .with_reserved_columns(table::passthrough_columns(&batches, &cli.text_column));
    let run = harness.run(&providers, &texts);

    for column in &run.columns {
        let counts = column
            .distribution(&taxonomy)
            .iter()
            .map(|(id, n)| format!("{id}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        info!(column = %column.name, %counts, "prediction distribution");
    }
    if run.completed() == 0 && !providers.is_empty() {
        warn!("no provider completed; output has passthrough columns only");
    }

    let output = table::assemble(&batches, &cli.text_column, &run.columns)
        .map_err(PipelineError::Assemble)?;
    triage_store::write_csv(&cli.output, &output).map_err(PipelineError::Persist)?;

    Ok(Summary {
        output: cli.output.clone(),
        rows: output.num_rows(),
        columns: run
            .outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                ProviderOutcome::Completed {
                    column,
                    rows,
                    elapsed,
                    ..
                } => Some(ColumnReport {
                    name: column.clone(),
                    rows: *rows,
                    elapsed: *elapsed,
                }),
                ProviderOutcome::Skipped { .. } => None,
            })
            .collect(),
        skipped: run
            .skipped()
            .map(ProviderOutcome::provider)
            .cloned()
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use triage_ai::{AiError, EmbeddingProvider};

    /// Keyword-count provider: dimension per keyword group.
    struct Keywords(ProviderId);

    impl EmbeddingProvider for Keywords {
        fn id(&self) -> &ProviderId {
            &self.0
        }

        fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
            let text = text.to_lowercase();
            let groups: [&[&str]; 4] = [
                &["feature", "add", "new", "capabilit"],
                &["crash", "broken", "fix", "regression"],
                &["refactor", "performance", "documentation", "architecture"],
                &["debt", "missing tests", "deprecated", "shortcut"],
            ];
            let mut v: Vec<f32> = groups
                .iter()
                .map(|words| words.iter().filter(|w| text.contains(**w)).count() as f32)
                .collect();
            // Small shared component keeps unrelated text non-degenerate.
            v.push(0.01);
            Ok(v)
        }
    }

    fn loader(id: &ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError> {
        if id.as_str().starts_with("missing/") {
            return Err(AiError::provider_load(id, "model directory does not exist"));
        }
        Ok(Box::new(Keywords(id.clone())))
    }

    const BACKLOG_SQL: &str = "SELECT * FROM (VALUES \
        ('PRJ-1', 'Sprint 1', 'Add export feature for reports'), \
        ('PRJ-2', 'Sprint 1', 'Fix crash when saving'), \
        ('PRJ-3', 'Sprint 2', 'Refactor storage for performance'), \
        ('PRJ-4', 'Sprint 2', 'Pay down debt: missing tests for parser')) \
        AS t(issue_key, sprint, text)";

    fn cli_for(dir: &std::path::Path, models: &str) -> Cli {
        cli_with_sql(dir, &format!("{BACKLOG_SQL} ORDER BY issue_key"), models)
    }

    fn cli_with_sql(dir: &std::path::Path, query: &str, models: &str) -> Cli {
        let sql = dir.join("extract.sql");
        std::fs::write(&sql, query).unwrap();
        Cli::try_parse_from([
            "triage",
            "--sql",
            sql.to_str().unwrap(),
            "--output",
            dir.join("out").join("classified.csv").to_str().unwrap(),
            "--model",
            models,
        ])
        .unwrap()
    }

    #[test]
    fn end_to_end_with_partial_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cli = cli_for(tmp.path(), "kw-one,missing/kw-two,org/kw-three");

        let summary = run_with_loader(&cli, &loader).unwrap();
        assert_eq!(summary.rows, 4);
        let names: Vec<&str> = summary.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["predicted_kw-one", "predicted_kw-three"]);
        assert!(summary.columns.iter().all(|c| c.rows == 4));
        assert_eq!(summary.skipped, vec![ProviderId::new("missing/kw-two")]);

        let csv = std::fs::read_to_string(&summary.output).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "issue_key,sprint,predicted_kw-one,predicted_kw-three");
        assert_eq!(lines[1], "PRJ-1,Sprint 1,green,green");
        assert_eq!(lines[2], "PRJ-2,Sprint 1,red,red");
        assert_eq!(lines[3], "PRJ-3,Sprint 2,yellow,yellow");
        assert_eq!(lines[4], "PRJ-4,Sprint 2,black,black");
    }

    #[test]
    fn zero_matching_rows_writes_full_header() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cli = cli_with_sql(tmp.path(), &format!("{BACKLOG_SQL} WHERE 1 = 0"), "kw-one");

        let summary = run_with_loader(&cli, &loader).unwrap();
        assert_eq!(summary.rows, 0);

        let csv = std::fs::read_to_string(&summary.output).unwrap();
        assert_eq!(csv.lines().collect::<Vec<_>>(), vec!["issue_key,sprint,predicted_kw-one"]);
    }

    #[test]
    fn zero_matching_rows_still_checks_text_column() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cli = cli_with_sql(tmp.path(), &format!("{BACKLOG_SQL} WHERE 1 = 0"), "kw-one");
        cli.text_column = "description".into();

        let err = run_with_loader(&cli, &loader).unwrap_err();
        assert!(matches!(err, PipelineError::Input(TableError::MissingColumn(_))));
    }

    #[test]
    fn missing_sql_fails_in_extract_stage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cli = cli_for(tmp.path(), "kw-one");
        cli.sql = tmp.path().join("nope.sql");

        let err = run_with_loader(&cli, &loader).unwrap_err();
        assert_eq!(err.stage(), "extract");
        assert!(!cli.output.exists(), "nothing should be written");
    }

    #[test]
    fn missing_text_column_fails_in_extract_stage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cli = cli_for(tmp.path(), "kw-one");
        cli.text_column = "description".into();

        let err = run_with_loader(&cli, &loader).unwrap_err();
        assert_eq!(err.stage(), "extract");
        assert!(matches!(err, PipelineError::Input(TableError::MissingColumn(_))));
    }

    #[test]
    fn bad_taxonomy_fails_in_taxonomy_stage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let taxonomy = tmp.path().join("taxonomy.json");
        std::fs::write(&taxonomy, r#"[{"id": "only", "prototype_text": "one"}]"#).unwrap();

        let mut cli = cli_for(tmp.path(), "kw-one");
        cli.taxonomy = Some(taxonomy);

        let err = run_with_loader(&cli, &loader).unwrap_err();
        assert_eq!(err.stage(), "taxonomy");
    }

    #[test]
    fn persist_failure_is_tagged() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cli = cli_for(tmp.path(), "kw-one");
        // A directory where the file should go.
        cli.output = tmp.path().to_path_buf();

        let err = run_with_loader(&cli, &loader).unwrap_err();
        assert_eq!(err.stage(), "persist");
    }

    #[test]
    fn all_providers_failing_still_writes_passthrough() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cli = cli_for(tmp.path(), "missing/a,missing/b");

        let summary = run_with_loader(&cli, &loader).unwrap();
        assert!(summary.columns.is_empty());
        assert_eq!(summary.skipped.len(), 2);

        let csv = std::fs::read_to_string(&summary.output).unwrap();
        assert_eq!(csv.lines().next(), Some("issue_key,sprint"));
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn onnx_loader_with_no_models_skips_every_provider() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cli = cli_for(tmp.path(), "all-MiniLM-L6-v2,BAAI/bge-large-en-v1.5");
        cli.models_dir = tmp.path().join("models");

        let summary = run(&cli).unwrap();
        assert!(summary.columns.is_empty());
        assert_eq!(summary.skipped.len(), 2);
    }
}
