use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    application::dtos::HealthStatusResponse,
    domain::{DomainError, IndexManifest, Passage, PassageEmbedding, PassageRecord},
};

use super::KnowledgeRetriever;

const MAX_PASSAGE_CHARS: usize = 16_000;
const MAX_TOP_K: usize = 32;

/// High level configuration shared by the knowledge service and its adapters.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub embedding_model: String,
    pub top_k: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            embedding_model: "sahayak/simple-hash".into(),
            top_k: 3,
        }
    }
}

impl ServiceConfig {
    pub fn new(embedding_model: impl Into<String>, top_k: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            top_k: top_k.clamp(1, MAX_TOP_K),
        }
    }

    pub fn with_model(embedding_model: impl Into<String>) -> Self {
        Self::new(embedding_model, Self::default().top_k)
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

/// Abstraction over any embedding engine (FastEmbed, hash embedder, etc).
pub trait EmbeddingEngine: Send + Sync {
    fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;

    fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        texts.iter().map(|text| self.embed(model, text)).collect()
    }

    fn dims(&self, _model: &str) -> Option<usize> {
        None
    }
}

/// Contract for the on-disk passage index.
pub trait VectorStore: Send + Sync {
    fn persist(&self, record: &PassageRecord) -> Result<(), DomainError>;

    fn search(
        &self,
        embedding: &PassageEmbedding,
        limit: usize,
    ) -> Result<Vec<(PassageRecord, f32)>, DomainError>;

    fn count(&self) -> Result<usize, DomainError>;

    fn manifest(&self) -> Result<Option<IndexManifest>, DomainError>;

    fn write_manifest(&self, manifest: &IndexManifest) -> Result<(), DomainError>;

    fn ping(&self) -> Result<(), DomainError>;
}

/// Embeds questions and passages and delegates similarity search to storage.
pub struct KnowledgeService {
    embedder: Arc<dyn EmbeddingEngine>,
    store: Arc<dyn VectorStore>,
    config: ServiceConfig,
}

impl KnowledgeService {
    pub fn new(
        embedder: Arc<dyn EmbeddingEngine>,
        store: Arc<dyn VectorStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Embed and persist one passage. Only the index builder calls this.
    pub fn ingest(&self, source: &str, content: &str) -> Result<Uuid, DomainError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("passage content is required"));
        }
        if content.chars().count() > MAX_PASSAGE_CHARS {
            return Err(DomainError::limit(format!(
                "passage cannot exceed {} characters",
                MAX_PASSAGE_CHARS
            )));
        }

        let vector = self
            .embedder
            .embed(&self.config.embedding_model, content)?;
        if is_zero(&vector) {
            return Err(DomainError::validation(
                "passage produced an empty embedding",
            ));
        }
        let embedding = PassageEmbedding::new(&self.config.embedding_model, vector);
        let record = PassageRecord::new(source, content, embedding);

        self.store.persist(&record)?;

        Ok(record.id)
    }

    /// Embed a batch of passages from one source and persist them in order.
    pub fn ingest_batch(&self, source: &str, passages: &[String]) -> Result<usize, DomainError> {
        let passages: Vec<String> = passages
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if let Some(oversized) = passages
            .iter()
            .find(|p| p.chars().count() > MAX_PASSAGE_CHARS)
        {
            return Err(DomainError::limit(format!(
                "passage starting `{}` exceeds {} characters",
                oversized.chars().take(40).collect::<String>(),
                MAX_PASSAGE_CHARS
            )));
        }

        let vectors = self
            .embedder
            .embed_batch(&self.config.embedding_model, &passages)?;

        let mut stored = 0;
        for (content, vector) in passages.iter().zip(vectors) {
            if is_zero(&vector) {
                debug!(source, "skipping passage with empty embedding");
                continue;
            }
            let embedding = PassageEmbedding::new(&self.config.embedding_model, vector);
            self.store
                .persist(&PassageRecord::new(source, content.as_str(), embedding))?;
            stored += 1;
        }

        Ok(stored)
    }

    pub fn search(&self, question: &str, limit: usize) -> Result<Vec<Passage>, DomainError> {
        if question.trim().is_empty() {
            return Err(DomainError::validation("question cannot be empty"));
        }

        let effective_limit = limit.clamp(1, MAX_TOP_K);

        let query_vector = self
            .embedder
            .embed(&self.config.embedding_model, question.trim())?;
        let query_embedding = PassageEmbedding::new(&self.config.embedding_model, query_vector);

        let matches = self.store.search(&query_embedding, effective_limit)?;
        debug!(matches = matches.len(), limit = effective_limit, "similarity search done");

        Ok(matches
            .into_iter()
            .map(|(record, score)| record.into_passage(score))
            .collect())
    }

    /// Record the embedding function used to build the index.
    pub fn stamp_manifest(&self) -> Result<IndexManifest, DomainError> {
        let dimensions = self
            .embedder
            .dims(self.config.embedding_model())
            .ok_or_else(|| DomainError::embedding("embedding engine reports no dimensions"))?;

        let manifest = IndexManifest {
            model: self.config.embedding_model.clone(),
            dimensions,
            passages: self.store.count()?,
            built_at: Utc::now(),
        };
        self.store.write_manifest(&manifest)?;

        Ok(manifest)
    }

    /// Refuse to serve from an index built with a different embedding function.
    pub fn ensure_compatible(&self) -> Result<IndexManifest, DomainError> {
        let manifest = self.store.manifest()?.ok_or_else(|| {
            DomainError::configuration("knowledge index has no manifest; build it first")
        })?;

        if !manifest
            .model
            .eq_ignore_ascii_case(self.config.embedding_model())
        {
            return Err(DomainError::embedding(format!(
                "index built with `{}` but `{}` configured",
                manifest.model, self.config.embedding_model
            )));
        }

        if let Some(dims) = self.embedder.dims(self.config.embedding_model()) {
            if dims != manifest.dimensions {
                return Err(DomainError::embedding(format!(
                    "index has {} dimensions, embedder produces {}",
                    manifest.dimensions, dims
                )));
            }
        }

        info!(
            model = %manifest.model,
            passages = manifest.passages,
            "knowledge index loaded"
        );
        Ok(manifest)
    }

    pub fn passage_count(&self) -> Result<usize, DomainError> {
        self.store.count()
    }

    pub fn embedding_dimensions(&self) -> Option<usize> {
        self.embedder.dims(self.config.embedding_model())
    }

    pub fn health(&self) -> Result<HealthStatusResponse, DomainError> {
        self.store.ping()?;

        Ok(HealthStatusResponse {
            ok: true,
            message: "ready".into(),
            details: Some(format!(
                "model: {}, passages: {}, checked_at: {}",
                self.config.embedding_model,
                self.store.count()?,
                Utc::now()
            )),
        })
    }
}

/// Zero vectors have no cosine similarity and would poison every search.
fn is_zero(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

impl KnowledgeRetriever for KnowledgeService {
    fn retrieve(&self, question: &str) -> Result<Vec<Passage>, DomainError> {
        self.search(question, self.config.top_k)
            .map_err(DomainError::into_retrieval)
    }
}
