//! Prototype-based zero-shot classification.
//!
//! Embeds a backlog item with the same provider and formatting as the
//! prototypes, scores it against every prototype by cosine similarity, and
//! picks the single best category. There is no threshold: a category is
//! always returned, however weak the match.

use triage_core::TextFormatter;

use crate::prototype::l2_norm;
use crate::{AiError, EmbeddingProvider, PrototypeCache};

/// Classifier bound to one provider's frozen prototype cache.
///
/// The cache is owned data, not captured state; building a new classifier
/// per provider activation keeps one provider's prototypes from leaking into
/// another's run.
pub struct Classifier<'f> {
    formatter: &'f TextFormatter,
    cache: PrototypeCache,
}

impl<'f> Classifier<'f> {
    pub fn new(formatter: &'f TextFormatter, cache: PrototypeCache) -> Self {
        Self { formatter, cache }
    }

    pub fn cache(&self) -> &PrototypeCache {
        &self.cache
    }

    /// Cosine similarity of `text` against every prototype, in taxonomy order.
    pub fn scores(
        &self,
        provider: &mut dyn EmbeddingProvider,
        text: &str,
    ) -> Result<Vec<(&str, f32)>, AiError> {
        let provider_id = provider.id().clone();
        if &provider_id != self.cache.provider() {
            return Err(AiError::ProviderMismatch {
                expected: self.cache.provider().clone(),
                actual: provider_id,
            });
        }

        let formatted = self.formatter.format(&provider_id, text);
        let embedding = provider
            .embed(&formatted)
            .map_err(|e| AiError::embed(&provider_id, e))?;

        if embedding.len() != self.cache.dim() {
            return Err(AiError::DimensionMismatch {
                provider: provider_id,
                expected: self.cache.dim(),
                actual: embedding.len(),
            });
        }

        let norm = l2_norm(&embedding);
        if norm == 0.0 || !norm.is_finite() {
            return Err(AiError::degenerate(&provider_id, text));
        }

        Ok(self
            .cache
            .prototypes()
            .iter()
            .map(|p| (p.id.as_str(), dot(&embedding, &p.vector) / (norm * p.norm)))
            .collect())
    }

    /// Best-matching category id for `text`.
    ///
    /// Ties go to the category listed first in the taxonomy.
    pub fn classify(
        &self,
        provider: &mut dyn EmbeddingProvider,
        text: &str,
    ) -> Result<&str, AiError> {
        let scores = self.scores(provider, text)?;
        let mut best: Option<(&str, f32)> = None;
        for (id, score) in scores {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((id, score)),
            }
        }
        // A validated taxonomy has at least two categories.
        best.map(|(id, _)| id).ok_or_else(|| AiError::Embed {
            provider: self.cache.provider().clone(),
            reason: "prototype cache is empty".into(),
        })
    }
}

/// Cosine similarity: `a·b / (|a| |b|)`, in `[-1, 1]`.
///
/// `None` when the lengths differ or either vector has zero (or
/// non-finite) magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(dot(a, b) / denom)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
