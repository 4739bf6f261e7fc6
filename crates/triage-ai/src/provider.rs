//! Embedding provider abstraction.
//!
//! A provider turns one string into one fixed-length vector. Vectors from
//! different providers live in unrelated spaces and are never compared.

use triage_core::ProviderId;

use crate::AiError;

/// A live, activated embedding model.
///
/// `embed` must be deterministic for a fixed handle: the same input yields
/// the same vector within one process run.
pub trait EmbeddingProvider {
    fn id(&self) -> &ProviderId;

    /// Embed one already-formatted string.
    fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Resolves provider ids to live providers.
///
/// Activation may load a large model into memory. A failure is reported as
/// [`AiError::ProviderLoad`] and only affects that provider's run.
pub trait ProviderLoader {
    fn activate(&self, id: &ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError>;
}

impl<F> ProviderLoader for F
where
    F: Fn(&ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError>,
{
    fn activate(&self, id: &ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError> {
        self(id)
    }
}
