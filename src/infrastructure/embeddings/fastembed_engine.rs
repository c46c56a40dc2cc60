use std::str::FromStr;

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use parking_lot::Mutex;
use tracing::debug;

use crate::{application::services::EmbeddingEngine, domain::DomainError};

/// Passages embedded per ONNX call when building the index.
const BATCH_SIZE: usize = 32;

/// Embedding engine backed by `fastembed`'s `TextEmbedding`.
///
/// A single loaded model sits behind a `Mutex`; both the index builder and
/// the service reuse it for every call.
pub struct FastEmbedEngine {
    model_label: String,
    dimensions: usize,
    inner: Mutex<TextEmbedding>,
}

impl FastEmbedEngine {
    /// Load a sentence-transformer model, e.g. `BAAI/bge-small-en-v1.5`.
    pub fn try_new(model_name: impl AsRef<str>) -> Result<Self, DomainError> {
        let label = model_name.as_ref().trim();
        if label.is_empty() {
            return Err(DomainError::configuration(
                "fastembed model name cannot be empty",
            ));
        }

        let embedding_model = EmbeddingModel::from_str(label).map_err(|err| {
            DomainError::configuration(format!("unknown fastembed model `{label}`: {err}"))
        })?;

        let model_info = TextEmbedding::get_model_info(&embedding_model).map_err(|err| {
            DomainError::configuration(format!(
                "unable to read metadata for fastembed model `{label}`: {err}"
            ))
        })?;

        let text_embedding = TextEmbedding::try_new(TextInitOptions::new(embedding_model.clone()))
            .map_err(|err| {
                DomainError::other(format!("failed to load fastembed model `{label}`: {err}"))
            })?;

        debug!(model = label, dims = model_info.dim, "fastembed model loaded");

        Ok(Self {
            model_label: label.to_string(),
            dimensions: model_info.dim,
            inner: Mutex::new(text_embedding),
        })
    }

    fn check_model(&self, model: &str) -> Result<(), DomainError> {
        if model.eq_ignore_ascii_case(&self.model_label) {
            Ok(())
        } else {
            Err(DomainError::embedding(format!(
                "engine initialised for `{}` but `{}` requested",
                self.model_label, model
            )))
        }
    }

    fn check_dims(&self, vector: &[f32]) -> Result<(), DomainError> {
        if vector.len() == self.dimensions {
            return Ok(());
        }
        Err(DomainError::embedding(format!(
            "unexpected embedding dimension (expected {}, got {})",
            self.dimensions,
            vector.len()
        )))
    }
}

impl EmbeddingEngine for FastEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        self.check_model(model)?;
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }

        let vector = self
            .inner
            .lock()
            .embed(vec![text], None)
            .map_err(|err| DomainError::other(format!("fastembed inference failed: {err}")))?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::other("fastembed returned no embedding"))?;

        self.check_dims(&vector)?;
        Ok(vector)
    }

    fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        self.check_model(model)?;

        let vectors = self
            .inner
            .lock()
            .embed(texts.to_vec(), Some(BATCH_SIZE))
            .map_err(|err| DomainError::other(format!("fastembed inference failed: {err}")))?;

        if vectors.len() != texts.len() {
            return Err(DomainError::other(format!(
                "fastembed returned {} embeddings for {} passages",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            self.check_dims(vector)?;
        }
        Ok(vectors)
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}
