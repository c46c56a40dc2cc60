//! Service layer orchestrating the chat pipeline and the knowledge index.

mod chat_service;
mod knowledge_service;

#[cfg(test)]
pub(crate) use chat_service::fakes;
pub use chat_service::{
    AnswerGenerator, AudioStore, ChatConfig, ChatService, KnowledgeRetriever, LanguageDetector,
    SpeechSynthesizer, Translator,
};
pub use knowledge_service::{EmbeddingEngine, KnowledgeService, ServiceConfig, VectorStore};
