//! Zero-shot work classification: embed category prototypes once per
//! provider, score each backlog item by cosine similarity, and run the
//! whole thing across several providers.

mod classifier;
mod error;
mod harness;
mod prototype;
mod provider;

pub use classifier::{Classifier, cosine_similarity};
pub use error::AiError;
pub use harness::{Harness, HarnessRun, ProviderOutcome};
pub use prototype::PrototypeCache;
pub use provider::{EmbeddingProvider, ProviderLoader};

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::{OnnxEmbedder, OnnxLoader, Pooling};

#[cfg(test)]
mod testing;
