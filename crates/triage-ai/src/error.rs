use thiserror::Error;
use triage_core::ProviderId;

#[derive(Debug, Error)]
pub enum AiError {
    /// The named model could not be resolved or loaded.
    #[error("failed to load provider {provider}: {reason}")]
    ProviderLoad { provider: ProviderId, reason: String },

    /// An embedding had zero (or non-finite) magnitude, so cosine similarity
    /// is undefined.
    #[error("provider {provider} produced a degenerate embedding for {input:?}")]
    DegenerateEmbedding { provider: ProviderId, input: String },

    #[error("provider {provider} returned {actual}-dim embedding, expected {expected}")]
    DimensionMismatch {
        provider: ProviderId,
        expected: usize,
        actual: usize,
    },

    /// A prototype cache was used with a provider other than the one that built it.
    #[error("prototype cache built by {expected} used with provider {actual}")]
    ProviderMismatch {
        expected: ProviderId,
        actual: ProviderId,
    },

    #[error("provider {provider} failed to embed: {reason}")]
    Embed { provider: ProviderId, reason: String },
}

impl AiError {
    pub fn provider_load(provider: &ProviderId, err: impl std::fmt::Display) -> Self {
        Self::ProviderLoad {
            provider: provider.clone(),
            reason: format!("{err:#}"),
        }
    }

    pub fn embed(provider: &ProviderId, err: impl std::fmt::Display) -> Self {
        Self::Embed {
            provider: provider.clone(),
            reason: format!("{err:#}"),
        }
    }

    /// Degenerate-embedding error with the offending input shortened for logs.
    pub fn degenerate(provider: &ProviderId, input: &str) -> Self {
        const MAX_CHARS: usize = 80;
        let input = match input.char_indices().nth(MAX_CHARS) {
            Some((idx, _)) => format!("{}...", &input[..idx]),
            None => input.to_string(),
        };
        Self::DegenerateEmbedding {
            provider: provider.clone(),
            input,
        }
    }
}
