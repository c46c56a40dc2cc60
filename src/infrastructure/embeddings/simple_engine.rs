use ahash::RandomState;
use std::hash::BuildHasher;

use crate::{
    application::services::EmbeddingEngine,
    domain::{DomainError, PassageEmbedding},
};

/// Fixed keys so token buckets survive process restarts; the index is built
/// by one process and queried by another.
const HASH_KEYS: (u64, u64, u64, u64) = (
    0x5361_6861_7961_6b31,
    0x2d68_6173_682d_7631,
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
);

/// A lightweight, deterministic embedding engine that hashes lowercase tokens
/// into a fixed-size vector. Good enough for keyword-heavy FAQ corpora and for
/// running without model downloads; use the `fastembed-engine` feature for
/// semantic retrieval.
pub struct SimpleEmbedEngine {
    model_name: String,
    dimensions: usize,
    hasher: RandomState,
}

impl SimpleEmbedEngine {
    pub fn try_new(model_name: impl Into<String>, dimensions: usize) -> Result<Self, DomainError> {
        if dimensions == 0 {
            return Err(DomainError::validation(
                "embedding dimensions must be greater than zero",
            ));
        }
        let dims = dimensions.clamp(8, 4096);
        Ok(Self {
            model_name: model_name.into(),
            dimensions: dims,
            hasher: RandomState::with_seeds(HASH_KEYS.0, HASH_KEYS.1, HASH_KEYS.2, HASH_KEYS.3),
        })
    }

    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self::try_new(model_name, dimensions).expect("valid simple embedder configuration")
    }

    fn tokenize<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।')
            .filter(move |token| !token.is_empty())
    }

    fn hash_token(&self, token: &str) -> usize {
        self.hasher.hash_one(token.to_lowercase()) as usize
    }

    fn embed_internal(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens: Vec<&str> = self.tokenize(text).collect();
        if tokens.is_empty() {
            return vector;
        }

        for token in tokens {
            let idx = self.hash_token(token) % self.dimensions;
            vector[idx] += 1.0;
        }

        // L2 normalize to keep scores in [-1, 1]
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }

    pub fn embed_payload(&self, text: &str) -> Result<PassageEmbedding, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }
        Ok(PassageEmbedding::new(
            &self.model_name,
            self.embed_internal(text),
        ))
    }
}

impl Default for SimpleEmbedEngine {
    fn default() -> Self {
        Self::try_new("sahayak/simple-hash", 256)
            .expect("default simple embedder configuration is valid")
    }
}

impl EmbeddingEngine for SimpleEmbedEngine {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        if !model.eq_ignore_ascii_case(&self.model_name) {
            return Err(DomainError::embedding(format!(
                "engine initialised for `{}` but `{}` requested",
                self.model_name, model
            )));
        }
        if text.trim().is_empty() {
            return Err(DomainError::validation("text payload cannot be empty"));
        }
        Ok(self.embed_internal(text))
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        Some(self.dimensions)
    }
}
