use serde::{Deserialize, Serialize};

use crate::domain::ChatReply;

/// Body accepted by `POST /chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// Body returned by `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// Assemble the reply; `audio_base` prefixes the `/audio/{name}` path.
    pub fn assemble(reply: ChatReply, audio_base: &str) -> Self {
        let audio_file_url = reply.audio.map(|artifact| {
            format!(
                "{}/audio/{}",
                audio_base.trim_end_matches('/'),
                artifact.file_name
            )
        });

        Self {
            response: reply.answer,
            audio_file_url,
            error: reply.audio_error,
        }
    }
}

/// Failure envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub response: String,
    pub error: String,
}

/// Health/readiness report for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatusResponse {
    pub ok: bool,
    pub message: String,
    pub details: Option<String>,
}
