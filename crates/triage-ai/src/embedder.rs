//! ONNX Runtime embedding provider for sentence-transformers models.
//!
//! Each provider id maps to a model directory under a common root
//! (`models/all-MiniLM-L6-v2`, `models/BAAI/bge-large-en-v1.5`, ...). The
//! directory must contain `model.onnx` and `tokenizer.json`; an optional
//! `1_Pooling/config.json` selects CLS or mean pooling the way
//! sentence-transformers does.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};
use triage_core::ProviderId;

use crate::{AiError, EmbeddingProvider, ProviderLoader};

/// Default token budget; longer inputs are truncated.
pub const DEFAULT_MAX_LENGTH: usize = 256;

/// How token embeddings are reduced to one sentence embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Attention-masked mean over all tokens.
    Mean,
    /// Hidden state of the first (`[CLS]`) token.
    Cls,
}

#[derive(Debug, Default, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
}

impl Pooling {
    /// Read `1_Pooling/config.json` if present; mean pooling otherwise.
    pub fn detect(model_dir: &Path) -> anyhow::Result<Self> {
        let path = model_dir.join("1_Pooling").join("config.json");
        if !path.exists() {
            return Ok(Self::Mean);
        }
        let json = std::fs::read_to_string(&path)?;
        let config: PoolingConfig =
            serde_json::from_str(&json).with_context(|| format!("parse {}", path.display()))?;
        Ok(if config.pooling_mode_cls_token {
            Self::Cls
        } else {
            Self::Mean
        })
    }
}

/// Sentence embedding generator using ONNX Runtime.
///
/// Produces L2-normalized vectors. The dimension comes from the model's
/// declared output shape when static, otherwise from the first inference.
pub struct OnnxEmbedder {
    id: ProviderId,
    session: Session,
    tokenizer: Tokenizer,
    pooling: Pooling,
    uses_token_type_ids: bool,
    dim: Option<usize>,
}

impl OnnxEmbedder {
    /// Load an embedding model from a directory containing `model.onnx` and `tokenizer.json`.
    pub fn load(id: ProviderId, model_dir: &Path, max_length: usize) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        anyhow::ensure!(model_path.exists(), "model.onnx not found in {model_dir:?}");
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer.json not found in {model_dir:?}"
        );

        let session = Session::builder()?
            .commit_from_file(&model_path)
            .with_context(|| format!("load {}", model_path.display()))?;

        let dim = infer_dim(session.outputs()[0].dtype());
        // MPNet and T5 exports take no segment ids.
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        let pooling = Pooling::detect(model_dir)?;

        info!(
            provider = %id,
            dim,
            ?pooling,
            uses_token_type_ids,
            model = %model_path.display(),
            "loaded embedding model"
        );
        Ok(Self {
            id,
            session,
            tokenizer,
            pooling,
            uses_token_type_ids,
            dim,
        })
    }

    /// Embedding dimensionality, once known.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn pooling(&self) -> Pooling {
        self.pooling
    }

    /// Embed a batch of texts, returning one normalized vector per input.
    pub fn embed_batch(&mut self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // Flat input tensors: [batch_size, seq_len].
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let offset = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[offset + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[offset + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[offset + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))?;

        let mut inputs = ort::inputs![
            "input_ids" => ids_tensor,
            "attention_mask" => mask_tensor,
        ];
        if self.uses_token_type_ids {
            let type_tensor = Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;
            inputs.push(("token_type_ids".into(), type_tensor.into()));
        }

        let pooling = self.pooling;
        let outputs = self.session.run(inputs)?;

        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;

        let mut embeddings = match dims {
            // Already pooled: [batch_size, dim].
            [b, d] if *b as usize == batch_size => {
                let d = *d as usize;
                check_dim(&mut self.dim, d)?;
                output_data
                    .chunks(d)
                    .map(<[f32]>::to_vec)
                    .collect::<Vec<_>>()
            }
            // Token embeddings: [batch_size, seq_len, dim].
            [b, t, d] if *b as usize == batch_size => {
                let (t, d) = (*t as usize, *d as usize);
                check_dim(&mut self.dim, d)?;
                (0..batch_size)
                    .map(|i| {
                        let tokens = &output_data[i * t * d..(i + 1) * t * d];
                        let mask = &attention_mask[i * seq_len..(i + 1) * seq_len];
                        pool(pooling, tokens, mask, d)
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?
            }
            _ => anyhow::bail!("unexpected output shape: {dims:?} for batch of {batch_size}"),
        };

        for v in &mut embeddings {
            normalize(v);
        }
        Ok(embeddings)
    }
}

/// Record the output dimension on first use; reject changes afterwards.
fn check_dim(dim: &mut Option<usize>, actual: usize) -> anyhow::Result<()> {
    anyhow::ensure!(actual > 0, "model output has zero-width embeddings");
    match *dim {
        Some(expected) => anyhow::ensure!(
            expected == actual,
            "model output dim {actual} differs from declared {expected}"
        ),
        None => *dim = Some(actual),
    }
    Ok(())
}

impl EmbeddingProvider for OnnxEmbedder {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn embed(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("model returned no embedding"))
    }
}

/// Resolves provider ids to model directories under `models_dir`.
///
/// Path-like ids map to nested directories: `BAAI/bge-large-en-v1.5` loads
/// from `<models_dir>/BAAI/bge-large-en-v1.5`.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    models_dir: PathBuf,
    max_length: usize,
}

impl OnnxLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn model_dir(&self, id: &ProviderId) -> PathBuf {
        id.as_str()
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.models_dir.clone(), |dir, part| dir.join(part))
    }
}

impl ProviderLoader for OnnxLoader {
    fn activate(&self, id: &ProviderId) -> Result<Box<dyn EmbeddingProvider>, AiError> {
        let dir = self.model_dir(id);
        debug!(provider = %id, dir = %dir.display(), "resolving model directory");
        if !dir.is_dir() {
            return Err(AiError::provider_load(
                id,
                format!("model directory {} does not exist", dir.display()),
            ));
        }
        let embedder = OnnxEmbedder::load(id.clone(), &dir, self.max_length)
            .map_err(|e| AiError::provider_load(id, e))?;
        Ok(Box::new(embedder))
    }
}

/// Reduce `[seq_len, dim]` token embeddings to one vector.
fn pool(pooling: Pooling, tokens: &[f32], mask: &[i64], dim: usize) -> anyhow::Result<Vec<f32>> {
    match pooling {
        Pooling::Cls => tokens
            .get(..dim)
            .map(<[f32]>::to_vec)
            .ok_or_else(|| anyhow::anyhow!("no token embeddings to pool ({} values, dim {dim})", tokens.len())),
        Pooling::Mean => {
            let mut pooled = vec![0.0f32; dim];
            let mut token_count = 0.0f32;
            for (j, token) in tokens.chunks(dim).enumerate() {
                let mask_val = mask.get(j).copied().unwrap_or(0) as f32;
                if mask_val > 0.0 {
                    for (p, &v) in pooled.iter_mut().zip(token) {
                        *p += v * mask_val;
                    }
                    token_count += mask_val;
                }
            }
            if token_count > 0.0 {
                for p in &mut pooled {
                    *p /= token_count;
                }
            }
            Ok(pooled)
        }
    }
}

/// L2-normalize a vector in place. Zero vectors are left as-is.
fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Try to infer the embedding dimension from the ONNX model output type.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
