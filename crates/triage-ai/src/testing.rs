//! Deterministic stand-in providers for unit tests.

use std::collections::HashMap;

use triage_core::{Category, ProviderId, Taxonomy};

use crate::{AiError, EmbeddingProvider};

pub(crate) const BOW_DIM: usize = 64;

/// `A: "fix a crash"`, `B: "add a new feature"`.
pub(crate) fn two_way_taxonomy() -> Taxonomy {
    Taxonomy::new(vec![
        Category::new("A", "fix a crash"),
        Category::new("B", "add a new feature"),
    ])
    .unwrap()
}

/// Bag-of-words embedder: one dimension per (crudely stemmed) word, in
/// order of first appearance. Shared words give positive similarity;
/// text with no words embeds to the zero vector.
pub(crate) struct BagOfWords {
    id: ProviderId,
    vocab: HashMap<String, usize>,
    seen: Vec<String>,
}

impl BagOfWords {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            vocab: HashMap::new(),
            seen: Vec::new(),
        }
    }

    pub(crate) fn boxed(id: &ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError> {
        Ok(Box::new(Self::new(id.as_str())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.len()
    }

    pub(crate) fn seen(&self) -> &[String] {
        &self.seen
    }
}

fn stem(word: &str) -> String {
    let w = word.to_lowercase();
    for suffix in ["ing", "ed", "es", "s"] {
        if w.len() > suffix.len() + 2 && w.ends_with(suffix) {
            return w[..w.len() - suffix.len()].to_string();
        }
    }
    w
}

impl EmbeddingProvider for BagOfWords {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.seen.push(text.to_string());
        let mut v = vec![0.0f32; BOW_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let next = self.vocab.len();
            let idx = *self.vocab.entry(stem(word)).or_insert(next);
            v[idx % BOW_DIM] += 1.0;
        }
        Ok(v)
    }
}

/// Returns canned vectors for exact texts; anything else is an error.
pub(crate) struct FixedVectors {
    id: ProviderId,
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedVectors {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: ProviderId::new(id),
            vectors: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

impl EmbeddingProvider for FixedVectors {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no canned vector for {text:?}"))
    }
}
