//! Multi-provider evaluation harness.
//!
//! Runs the classifier once per provider, strictly one after another: each
//! provider is activated, gets its own prototype cache, classifies every
//! row, and is dropped before the next one loads. A provider that fails at
//! any point is logged and skipped; the others still produce columns.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use triage_core::{ColumnNamer, PredictionColumn, ProviderId, Taxonomy, TextFormatter};

use crate::{AiError, Classifier, PrototypeCache, ProviderLoader};

const PROGRESS_EVERY: usize = 500;

/// What happened to one provider during a run.
#[derive(Debug)]
pub enum ProviderOutcome {
    Completed {
        provider: ProviderId,
        column: String,
        rows: usize,
        elapsed: Duration,
    },
    Skipped {
        provider: ProviderId,
        error: AiError,
    },
}

impl ProviderOutcome {
    pub fn provider(&self) -> &ProviderId {
        match self {
            Self::Completed { provider, .. } | Self::Skipped { provider, .. } => provider,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of a harness run: prediction columns of the providers that
/// completed, in provider order, plus one outcome per requested provider.
#[derive(Debug)]
pub struct HarnessRun {
    pub columns: Vec<PredictionColumn>,
    pub outcomes: Vec<ProviderOutcome>,
}

impl HarnessRun {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|o| !o.is_completed())
    }
}

/// Drives classification across providers for a fixed taxonomy.
pub struct Harness<'a> {
    taxonomy: &'a Taxonomy,
    formatter: &'a TextFormatter,
    loader: &'a dyn ProviderLoader,
    reserved_columns: Vec<String>,
}

impl<'a> Harness<'a> {
    pub fn new(
        taxonomy: &'a Taxonomy,
        formatter: &'a TextFormatter,
        loader: &'a dyn ProviderLoader,
    ) -> Self {
        Self {
            taxonomy,
            formatter,
            loader,
            reserved_columns: Vec::new(),
        }
    }

    /// Column names already present in the output (the passthrough fields);
    /// prediction columns will not reuse them.
    pub fn with_reserved_columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.reserved_columns = columns.into_iter().collect();
        self
    }

    /// Classify `texts` with every provider in order.
    ///
    /// Column names are assigned to all providers before any runs, so a
    /// skipped provider never changes another provider's column name.
    pub fn run(&self, providers: &[ProviderId], texts: &[String]) -> HarnessRun {
        let mut namer = ColumnNamer::new(self.reserved_columns.iter().cloned());
        let names: Vec<String> = providers.iter().map(|p| namer.allocate(p)).collect();

        let mut columns = Vec::with_capacity(providers.len());
        let mut outcomes = Vec::with_capacity(providers.len());

        for (provider, name) in providers.iter().zip(names) {
            let start = Instant::now();
            match self.run_provider(provider, &name, texts) {
                Ok(column) => {
                    let elapsed = start.elapsed();
                    info!(
                        provider = %provider,
                        column = %name,
                        rows = column.len(),
                        elapsed_secs = elapsed.as_secs_f64(),
                        "classified rows"
                    );
                    outcomes.push(ProviderOutcome::Completed {
                        provider: provider.clone(),
                        column: name,
                        rows: column.len(),
                        elapsed,
                    });
                    columns.push(column);
                }
                Err(error) => {
                    warn!(provider = %provider, %error, "skipping provider");
                    outcomes.push(ProviderOutcome::Skipped {
                        provider: provider.clone(),
                        error,
                    });
                }
            }
        }

        HarnessRun { columns, outcomes }
    }

    /// One provider end to end. The provider handle is dropped on return.
    fn run_provider(
        &self,
        provider_id: &ProviderId,
        column: &str,
        texts: &[String],
    ) -> Result<PredictionColumn, AiError> {
        info!(provider = %provider_id, "loading model");
        let mut provider = self.loader.activate(provider_id)?;

        let cache = PrototypeCache::build(provider.as_mut(), self.taxonomy, self.formatter)?;
        let classifier = Classifier::new(self.formatter, cache);

        let mut values = Vec::with_capacity(texts.len());
        for (row, text) in texts.iter().enumerate() {
            let id = classifier.classify(provider.as_mut(), text)?;
            values.push(id.to_string());

            if (row + 1) % PROGRESS_EVERY == 0 {
                debug!(provider = %provider_id, done = row + 1, total = texts.len(), "progress");
            }
        }

        Ok(PredictionColumn {
            provider: provider_id.clone(),
            name: column.to_string(),
            values,
        })
    }
}
