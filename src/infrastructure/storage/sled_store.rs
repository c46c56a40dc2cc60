use std::path::{Path, PathBuf};

use bincode::Options;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use sled::{Config, Db, IVec, Tree};
use uuid::Uuid;

use crate::{
    application::services::VectorStore,
    domain::{DomainError, IndexManifest, PassageEmbedding, PassageRecord},
};

const PASSAGES_TREE: &str = "passages";
const META_TREE: &str = "meta";
const MANIFEST_KEY: &[u8] = b"manifest";

/// Embedded passage index backed by `sled`.
///
/// Full `PassageRecord` payloads live in one tree; similarity is a cosine
/// scan in memory, which is fine for the few thousand passages an FAQ-style
/// knowledge base holds. The `meta` tree carries the `IndexManifest`.
pub struct SledVectorStore {
    db: Db,
    passages: Tree,
    meta: Tree,
    _data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl SledVectorStore {
    /// Opens (or creates) a sled database rooted at `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|err| {
            DomainError::storage(format!("failed to create index directory {:?}: {err}", dir))
        })?;

        let db = Config::default()
            .path(&dir)
            .cache_capacity(64 * 1024 * 1024)
            .mode(sled::Mode::HighThroughput)
            .open()
            .map_err(|err| DomainError::storage(format!("failed to open sled db: {err}")))?;

        let passages = db
            .open_tree(PASSAGES_TREE)
            .map_err(|err| DomainError::storage(format!("failed to open passages tree: {err}")))?;
        let meta = db
            .open_tree(META_TREE)
            .map_err(|err| DomainError::storage(format!("failed to open meta tree: {err}")))?;

        Ok(Self {
            db,
            passages,
            meta,
            _data_dir: dir,
            write_lock: Mutex::new(()),
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .serialize(value)
            .map_err(|err| DomainError::storage(format!("serialization error: {err}")))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DomainError> {
        bincode::options()
            .with_fixint_encoding()
            .allow_trailing_bytes()
            .deserialize(bytes)
            .map_err(|err| DomainError::storage(format!("deserialization error: {err}")))
    }

    fn encode_key(id: &Uuid) -> [u8; 16] {
        *id.as_bytes()
    }

    fn decode_record(bytes: &IVec) -> Result<PassageRecord, DomainError> {
        Self::deserialize(bytes.as_ref())
    }

    fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, DomainError> {
        if query.len() != candidate.len() {
            return Err(DomainError::embedding(format!(
                "embedding dimension mismatch: query {} vs candidate {}",
                query.len(),
                candidate.len()
            )));
        }

        let mut dot = 0.0f32;
        let mut q_norm = 0.0f32;
        let mut c_norm = 0.0f32;

        for (q, c) in query.iter().zip(candidate.iter()) {
            dot += q * c;
            q_norm += q * q;
            c_norm += c * c;
        }

        let denom = q_norm.sqrt() * c_norm.sqrt();
        if denom == 0.0 {
            return Err(DomainError::embedding(
                "cannot compute cosine similarity with zero vector",
            ));
        }

        Ok((dot / denom).clamp(-1.0, 1.0))
    }
}

impl VectorStore for SledVectorStore {
    fn persist(&self, record: &PassageRecord) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();

        let bytes = Self::serialize(record)?;
        self.passages
            .insert(Self::encode_key(&record.id), bytes)
            .map_err(|err| DomainError::storage(format!("failed to persist passage: {err}")))?;

        self.passages
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush passages: {err}")))?;

        Ok(())
    }

    fn search(
        &self,
        embedding: &PassageEmbedding,
        limit: usize,
    ) -> Result<Vec<(PassageRecord, f32)>, DomainError> {
        let mut scored: Vec<(PassageRecord, f32)> = Vec::new();

        for entry in self.passages.iter() {
            let (_, value) = entry.map_err(|err| {
                DomainError::storage(format!("failed to read passage record: {err}"))
            })?;
            let record = Self::decode_record(&value)?;

            let score = Self::cosine_similarity(&embedding.vector, &record.embedding.vector)?;

            scored.push((record, score));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        Ok(scored)
    }

    fn count(&self) -> Result<usize, DomainError> {
        Ok(self.passages.len())
    }

    fn manifest(&self) -> Result<Option<IndexManifest>, DomainError> {
        let raw = self
            .meta
            .get(MANIFEST_KEY)
            .map_err(|err| DomainError::storage(format!("failed to read manifest: {err}")))?;

        raw.map(|bytes| {
            serde_json::from_slice(&bytes)
                .map_err(|err| DomainError::storage(format!("corrupt index manifest: {err}")))
        })
        .transpose()
    }

    fn write_manifest(&self, manifest: &IndexManifest) -> Result<(), DomainError> {
        let _guard = self.write_lock.lock();

        let payload = serde_json::to_vec(manifest)
            .map_err(|err| DomainError::storage(format!("serialization error: {err}")))?;
        self.meta
            .insert(MANIFEST_KEY, payload)
            .map_err(|err| DomainError::storage(format!("failed to write manifest: {err}")))?;

        self.db
            .flush()
            .map_err(|err| DomainError::storage(format!("failed to flush db: {err}")))?;

        Ok(())
    }

    fn ping(&self) -> Result<(), DomainError> {
        self.meta
            .contains_key(MANIFEST_KEY)
            .map_err(|err| DomainError::storage(format!("index unreadable: {err}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str, vector: Vec<f32>) -> PassageRecord {
        PassageRecord::new("test.md", content, PassageEmbedding::new("m", vector))
    }

    #[test]
    fn search_orders_by_cosine_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledVectorStore::open(dir.path()).unwrap();

        store.persist(&record("east", vec![1.0, 0.0])).unwrap();
        store.persist(&record("north", vec![0.0, 1.0])).unwrap();
        store.persist(&record("north-east", vec![0.7, 0.7])).unwrap();

        let query = PassageEmbedding::new("m", vec![1.0, 0.1]);
        let hits = store.search(&query, 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.content, "east");
        assert_eq!(hits[1].0.content, "north-east");
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledVectorStore::open(dir.path()).unwrap();
        store.persist(&record("short", vec![1.0, 0.0])).unwrap();

        let query = PassageEmbedding::new("m", vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            store.search(&query, 3),
            Err(DomainError::Embedding(_))
        ));
    }

    #[test]
    fn manifest_is_absent_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledVectorStore::open(dir.path()).unwrap();
        assert!(store.manifest().unwrap().is_none());

        let manifest = IndexManifest {
            model: "m".into(),
            dimensions: 2,
            passages: 0,
            built_at: chrono::Utc::now(),
        };
        store.write_manifest(&manifest).unwrap();
        assert_eq!(store.manifest().unwrap(), Some(manifest));
        store.ping().unwrap();
    }
}
