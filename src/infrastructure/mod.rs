//! Infrastructure layer wiring concrete adapters (embeddings, storage, remote
//! services, language detection).

pub mod embeddings;
pub mod http_client;
pub mod language;
pub mod storage;
pub mod text_split;

#[cfg(feature = "fastembed-engine")]
pub use embeddings::FastEmbedEngine;
pub use embeddings::SimpleEmbedEngine;
pub use http_client::{
    GeminiConfig, GeminiGenerator, GoogleSpeechSynthesizer, GoogleTranslator, SpeechConfig,
    TranslatorConfig,
};
pub use language::WhatlangDetector;
pub use storage::{AudioNaming, FileAudioStore, SledVectorStore};
