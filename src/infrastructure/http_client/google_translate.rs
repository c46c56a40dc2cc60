//! Translation through the public Google Translate web endpoint
//! (`translate_a/single`, client `gtx`), the one `deep_translator` wraps.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::{
    application::services::Translator,
    domain::{DomainError, LanguageCode, TranslationDirection},
    infrastructure::text_split,
};

use super::{build_agent, describe_http_error, trim_base_url};

pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com";

/// The endpoint rejects payloads above 5 000 characters; stay well below.
const MAX_CHUNK_CHARS: usize = 4_500;

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRANSLATE_URL.into(),
            timeout: Duration::from_secs(15),
        }
    }
}

pub struct GoogleTranslator {
    agent: ureq::Agent,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            agent: build_agent(config.timeout),
            endpoint: format!("{}/translate_a/single", trim_base_url(&config.base_url)),
        }
    }

    fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        direction: TranslationDirection,
    ) -> Result<String, DomainError> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        // Only the trimmed core goes out; each piece's whitespace is put back.
        let chunks = text_split::pack_verbatim(text, MAX_CHUNK_CHARS, char::is_whitespace);
        debug!(source, target, chunks = chunks.len(), "translating");

        let mut translated = String::with_capacity(text.len());
        for chunk in &chunks {
            let core = chunk.trim();
            if core.is_empty() {
                translated.push_str(chunk);
                continue;
            }

            let payload: Value = self
                .agent
                .get(&self.endpoint)
                .query("client", "gtx")
                .query("sl", source)
                .query("tl", target)
                .query("dt", "t")
                .query("q", core)
                .call()
                .map_err(|err| DomainError::translation(direction, describe_http_error(err)))?
                .into_json()
                .map_err(|err| {
                    DomainError::translation(direction, format!("unreadable translation: {err}"))
                })?;

            let leading = &chunk[..chunk.len() - chunk.trim_start().len()];
            let trailing = &chunk[chunk.trim_end().len()..];
            translated.push_str(leading);
            translated.push_str(
                &parse_translation(&payload)
                    .ok_or_else(|| DomainError::translation(direction, "empty translation"))?,
            );
            translated.push_str(trailing);
        }

        Ok(translated.trim().to_string())
    }
}

/// The response is a nested array; `payload[0]` lists `[translated, original, ...]`
/// segments whose first elements concatenate to the full translation.
fn parse_translation(payload: &Value) -> Option<String> {
    let text: String = payload
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl Translator for GoogleTranslator {
    fn to_english(&self, text: &str, source: &LanguageCode) -> Result<String, DomainError> {
        self.translate(
            text,
            source.as_str(),
            LanguageCode::english().as_str(),
            TranslationDirection::Inbound,
        )
    }

    fn to_target_language(
        &self,
        text: &str,
        target: &LanguageCode,
    ) -> Result<String, DomainError> {
        self.translate(
            text,
            LanguageCode::english().as_str(),
            target.as_str(),
            TranslationDirection::Outbound,
        )
    }
}
