//! Domain layer: request-scoped values and errors of the chat pipeline.

pub mod errors;
pub mod models;

pub use errors::{DomainError, TranslationDirection};
pub use models::{
    AudioArtifact, ChatReply, ConversationTurn, IndexManifest, LanguageCode, Passage,
    PassageEmbedding, PassageRecord, Query,
};
