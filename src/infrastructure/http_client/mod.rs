//! Blocking HTTP clients for the external collaborators: Gemini for answers,
//! Google Translate for the Punjabi round trip, and the Translate TTS
//! endpoint for speech.
//!
//! Every client owns a `ureq::Agent` with its own timeout; the chat pipeline
//! runs on the blocking pool, so none of these calls touch the async runtime.

mod gemini;
mod google_translate;
mod google_tts;

pub use gemini::{GeminiConfig, GeminiGenerator, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL};
pub use google_translate::{GoogleTranslator, TranslatorConfig, DEFAULT_TRANSLATE_URL};
pub use google_tts::{GoogleSpeechSynthesizer, SpeechConfig, DEFAULT_TTS_URL};

use std::time::Duration;

use serde::Deserialize;

/// Google APIs wrap failures as `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("sahayak/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Flatten a ureq failure into one line, keeping the remote error message
/// when the body carries one.
pub(crate) fn describe_http_error(error: ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            match serde_json::from_str::<GoogleErrorEnvelope>(&body) {
                Ok(envelope) if !envelope.error.status.is_empty() => format!(
                    "HTTP {} - {}: {}",
                    code, envelope.error.status, envelope.error.message
                ),
                Ok(envelope) => format!("HTTP {} - {}", code, envelope.error.message),
                Err(_) if body.trim().is_empty() => format!("HTTP error: {}", code),
                Err(_) => format!(
                    "HTTP {}: {}",
                    code,
                    body.chars().take(200).collect::<String>()
                ),
            }
        }
        ureq::Error::Transport(transport) => format!("Transport error: {}", transport),
    }
}

pub(crate) fn trim_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}
