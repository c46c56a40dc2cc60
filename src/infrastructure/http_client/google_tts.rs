//! Speech synthesis through the Google Translate TTS endpoint, the backend
//! gTTS talks to. Text is sent in short chunks and the MP3 frames returned
//! for each chunk are concatenated into one playable file.

use std::io::Read;
use std::time::Duration;

use tracing::debug;

use crate::{
    application::services::SpeechSynthesizer,
    domain::{DomainError, LanguageCode},
    infrastructure::text_split,
};

use super::{build_agent, describe_http_error, trim_base_url};

pub const DEFAULT_TTS_URL: &str = "https://translate.google.com";

const MAX_CHUNK_CHARS: usize = 100;
const MAX_CHUNK_BYTES: u64 = 4 * 1024 * 1024;

/// Voices the endpoint serves.
const SUPPORTED_VOICES: &[&str] = &[
    "af", "ar", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el", "en", "eo", "es", "et",
    "fi", "fr", "gu", "hi", "hr", "hu", "hy", "id", "is", "it", "ja", "jw", "km", "kn", "ko",
    "la", "lv", "mk", "ml", "mr", "my", "ne", "nl", "no", "pa", "pl", "pt", "ro", "ru", "si",
    "sk", "sq", "sr", "su", "sv", "sw", "ta", "te", "th", "tl", "tr", "uk", "ur", "vi", "zh",
];

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TTS_URL.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct GoogleSpeechSynthesizer {
    agent: ureq::Agent,
    endpoint: String,
}

impl GoogleSpeechSynthesizer {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            agent: build_agent(config.timeout),
            endpoint: format!("{}/translate_tts", trim_base_url(&config.base_url)),
        }
    }

    fn fetch_chunk(
        &self,
        chunk: &str,
        lang: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, DomainError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("ie", "UTF-8")
            .query("client", "tw-ob")
            .query("tl", lang)
            .query("q", chunk)
            .query("total", &total.to_string())
            .query("idx", &idx.to_string())
            .query("textlen", &chunk.chars().count().to_string())
            .query("ttsspeed", "1")
            .call()
            .map_err(|err| DomainError::synthesis(describe_http_error(err)))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_CHUNK_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|err| DomainError::synthesis(format!("failed to read audio chunk: {err}")))?;

        if bytes.is_empty() {
            return Err(DomainError::synthesis(format!(
                "no audio returned for chunk {}/{}",
                idx + 1,
                total
            )));
        }
        Ok(bytes)
    }
}

impl SpeechSynthesizer for GoogleSpeechSynthesizer {
    fn synthesize(&self, text: &str, lang: &LanguageCode) -> Result<Vec<u8>, DomainError> {
        if !self.supports(lang) {
            return Err(DomainError::synthesis(format!(
                "language `{lang}` has no voice"
            )));
        }

        let chunks = text_split::pack(text, MAX_CHUNK_CHARS, text_split::is_speech_break);
        if chunks.is_empty() {
            return Err(DomainError::synthesis("nothing to speak"));
        }
        debug!(lang = %lang, chunks = chunks.len(), "synthesizing speech");

        let total = chunks.len();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, lang.as_str(), idx, total)?);
        }
        Ok(audio)
    }

    fn supports(&self, lang: &LanguageCode) -> bool {
        SUPPORTED_VOICES.contains(&lang.as_str())
    }
}
