use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on query length accepted by `/chat`.
pub const MAX_QUERY_CHARS: usize = 4_000;

/// Language that triggers the translate-in / translate-out legs.
pub const PUNJABI: &str = "pa";
pub const ENGLISH: &str = "en";

/// A lowercase ISO 639-1 code (639-3 when no two-letter code exists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_lowercase())
    }

    pub fn punjabi() -> Self {
        Self::new(PUNJABI)
    }

    pub fn english() -> Self {
        Self::new(ENGLISH)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_punjabi(&self) -> bool {
        self.0 == PUNJABI
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated, trimmed user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
}

impl Query {
    pub fn parse(raw: Option<&str>) -> Result<Self, super::DomainError> {
        let text = raw.map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(super::DomainError::validation("query is required"));
        }
        if text.chars().count() > MAX_QUERY_CHARS {
            return Err(super::DomainError::limit(format!(
                "query cannot exceed {} characters",
                MAX_QUERY_CHARS
            )));
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Stored passage of the knowledge index, embedding included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: Uuid,
    pub source: String,
    pub content: String,
    pub embedding: PassageEmbedding,
    pub created_at: DateTime<Utc>,
}

impl PassageRecord {
    pub fn new(
        source: impl Into<String>,
        content: impl Into<String>,
        embedding: PassageEmbedding,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: sanitize_single_line(source),
            content: content.into(),
            embedding,
            created_at: Utc::now(),
        }
    }

    pub fn into_passage(self, score: f32) -> Passage {
        Passage {
            id: self.id,
            source: self.source,
            content: self.content,
            score,
        }
    }
}

/// Passage as handed to the answer generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: Uuid,
    pub source: String,
    pub content: String,
    pub score: f32,
}

/// Vector representation of a passage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageEmbedding {
    pub model: String,
    pub vector: Vec<f32>,
}

impl PassageEmbedding {
    pub fn new(model: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            vector,
        }
    }

    pub fn dims(&self) -> usize {
        self.vector.len()
    }
}

/// Identity of the embedding function an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub model: String,
    pub dimensions: usize,
    pub passages: usize,
    pub built_at: DateTime<Utc>,
}

/// One prior exchange handed to the generator as conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Audio file written for a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub file_name: String,
    pub path: std::path::PathBuf,
}

/// Outcome of a successful pipeline run, before HTTP assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub answer: String,
    pub language: LanguageCode,
    pub audio: Option<AudioArtifact>,
    /// Set when synthesis failed but text-only replies are allowed.
    pub audio_error: Option<String>,
}

fn sanitize_single_line(input: impl Into<String>) -> String {
    input
        .into()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    #[test]
    fn query_rejects_missing_and_blank() {
        assert!(matches!(Query::parse(None), Err(DomainError::Validation(_))));
        assert!(matches!(Query::parse(Some("")), Err(DomainError::Validation(_))));
        assert!(matches!(
            Query::parse(Some("  \n\t")),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn query_is_trimmed() {
        let query = Query::parse(Some("  What services do you offer?  ")).unwrap();
        assert_eq!(query.as_str(), "What services do you offer?");
    }

    #[test]
    fn query_length_is_capped() {
        let long = "a".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(
            Query::parse(Some(&long)),
            Err(DomainError::LimitExceeded(_))
        ));
    }

    #[test]
    fn language_codes_are_normalized() {
        assert!(LanguageCode::new(" PA ").is_punjabi());
        assert_eq!(LanguageCode::english().as_str(), "en");
    }

    #[test]
    fn passage_source_keeps_first_line() {
        let record = PassageRecord::new(
            "faq.md\nsecond line",
            "body",
            PassageEmbedding::new("m", vec![1.0]),
        );
        assert_eq!(record.source, "faq.md");
        let passage = record.into_passage(0.5);
        assert_eq!(passage.score, 0.5);
    }
}
