use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::infrastructure::http_client::{
    DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL, DEFAULT_TRANSLATE_URL, DEFAULT_TTS_URL,
};
use crate::infrastructure::AudioNaming;

/// Configuration file read when neither `--config` nor `SAHAYAK_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "sahayak.json";

pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const HOST_ENV: &str = "SAHAYAK_HOST";
pub const PORT_ENV: &str = "SAHAYAK_PORT";
pub const INDEX_DIR_ENV: &str = "SAHAYAK_INDEX_DIR";
pub const AUDIO_DIR_ENV: &str = "SAHAYAK_AUDIO_DIR";

/// Embedding backends compiled into the binary. The index and the service
/// must agree on the backend and model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    /// Deterministic hash embedder (always available, no downloads).
    Simple {
        #[serde(default = "default_simple_model")]
        model: String,
        #[serde(default = "default_simple_dim")]
        dimensions: usize,
    },
    /// Semantic embeddings powered by FastEmbed (feature gated).
    #[cfg(feature = "fastembed-engine")]
    FastEmbed {
        #[serde(default = "default_fastembed_model")]
        model: String,
    },
}

impl EmbeddingBackend {
    pub fn id(&self) -> &'static str {
        match self {
            EmbeddingBackend::Simple { .. } => "simple",
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { .. } => "fastembed",
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            EmbeddingBackend::Simple { model, .. } => model,
            #[cfg(feature = "fastembed-engine")]
            EmbeddingBackend::FastEmbed { model } => model,
        }
    }
}

impl Default for EmbeddingBackend {
    fn default() -> Self {
        EmbeddingBackend::Simple {
            model: default_simple_model(),
            dimensions: default_simple_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for `audio_file_url`; empty keeps the URL relative.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5001,
            public_base_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("db/knowledge_index"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.into(),
            base_url: DEFAULT_GEMINI_URL.into(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub base_url: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSLATE_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub base_url: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TTS_URL.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub dir: PathBuf,
    pub naming: AudioNaming,
    pub retain: usize,
    /// Answer with text only when speech synthesis fails.
    pub allow_text_only: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("audio"),
            naming: AudioNaming::PerRequest,
            retain: 256,
            allow_text_only: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Candidate languages (ISO 639-1 or 639-3). Empty allows all.
    pub allowlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub generation_secs: u64,
    pub translation_secs: u64,
    pub speech_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: 60,
            translation_secs: 15,
            speech_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs.max(1))
    }

    pub fn translation(&self) -> Duration {
        Duration::from_secs(self.translation_secs.max(1))
    }

    pub fn speech(&self) -> Duration {
        Duration::from_secs(self.speech_secs.max(1))
    }
}

/// Complete service configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingBackend,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub translation: TranslationConfig,
    pub speech: SpeechSettings,
    pub audio: AudioConfig,
    pub detector: DetectorConfig,
    pub timeouts: TimeoutConfig,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub api_key: String,
}

impl AppConfig {
    /// Load from `path` (or the default file when present) and apply
    /// environment overrides from the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, DomainError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DomainError> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::read_file(default_path)?
                } else {
                    AppConfig::default()
                }
            }
        };

        config.apply_env(env)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, DomainError> {
        let bytes = fs::read(path).map_err(|err| {
            DomainError::configuration(format!("failed to read config {:?}: {err}", path))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            DomainError::configuration(format!("invalid config {:?}: {err}", path))
        })
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), DomainError> {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port.parse().map_err(|_| {
                DomainError::configuration(format!("{PORT_ENV} must be a port number, got `{port}`"))
            })?;
        }
        if let Some(dir) = lookup(INDEX_DIR_ENV) {
            self.index.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(AUDIO_DIR_ENV) {
            self.audio.dir = PathBuf::from(dir);
        }

        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = key;
        }

        Ok(())
    }

    /// The Gemini key; only the chat service needs it.
    pub fn require_api_key(&self) -> Result<&str, DomainError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(DomainError::configuration(format!(
                "{API_KEY_ENV} is not set"
            )));
        }
        Ok(key)
    }
}

const fn default_simple_dim() -> usize {
    256
}

fn default_simple_model() -> String {
    "sahayak/simple-hash".to_string()
}

#[cfg(feature = "fastembed-engine")]
fn default_fastembed_model() -> String {
    "BAAI/bge-small-en-v1.5".to_string()
}
