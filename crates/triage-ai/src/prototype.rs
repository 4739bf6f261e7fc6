//! Per-provider prototype cache: each category's description, formatted and
//! embedded once per activation and then frozen.

use triage_core::{ProviderId, Taxonomy, TextFormatter};
use tracing::debug;

use crate::{AiError, EmbeddingProvider};

pub(crate) struct Prototype {
    pub(crate) id: String,
    pub(crate) vector: Vec<f32>,
    pub(crate) norm: f32,
}

/// Category id → prototype embedding for one provider, in taxonomy order.
///
/// Built with [`build`](Self::build) and never mutated afterwards. Holds
/// the id of the provider that built it so it cannot be paired with
/// another provider's vectors.
pub struct PrototypeCache {
    provider: ProviderId,
    prototypes: Vec<Prototype>,
    dim: usize,
}

impl PrototypeCache {
    /// Embed every category's prototype text with `provider`.
    ///
    /// One embed call per category. Fails on a degenerate prototype vector
    /// or if the provider returns vectors of differing length.
    pub fn build(
        provider: &mut dyn EmbeddingProvider,
        taxonomy: &Taxonomy,
        formatter: &TextFormatter,
    ) -> Result<Self, AiError> {
        let provider_id = provider.id().clone();
        let mut prototypes = Vec::with_capacity(taxonomy.len());
        let mut dim = None;

        for category in taxonomy.iter() {
            let text = formatter.format(&provider_id, &category.prototype_text);
            let vector = provider
                .embed(&text)
                .map_err(|e| AiError::embed(&provider_id, e))?;

            let expected = *dim.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(AiError::DimensionMismatch {
                    provider: provider_id,
                    expected,
                    actual: vector.len(),
                });
            }

            let norm = l2_norm(&vector);
            if norm == 0.0 || !norm.is_finite() {
                return Err(AiError::degenerate(&provider_id, &category.prototype_text));
            }

            prototypes.push(Prototype {
                id: category.id.clone(),
                vector,
                norm,
            });
        }

        let dim = dim.unwrap_or(0);
        debug!(provider = %provider_id, count = prototypes.len(), dim, "built prototype cache");
        Ok(Self {
            provider: provider_id,
            prototypes,
            dim,
        })
    }

    /// Provider that produced these vectors.
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Embedding dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.prototypes
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.vector.as_slice())
    }

    /// `(category id, vector)` pairs in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.prototypes
            .iter()
            .map(|p| (p.id.as_str(), p.vector.as_slice()))
    }

    pub(crate) fn prototypes(&self) -> &[Prototype] {
        &self.prototypes
    }
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
