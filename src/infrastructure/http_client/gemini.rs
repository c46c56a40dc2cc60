//! Answer generation through the Gemini `generateContent` REST API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    application::services::AnswerGenerator,
    domain::{ConversationTurn, DomainError, Passage},
};

use super::{build_agent, describe_http_error, trim_base_url};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Answer used when the model returns no text at all.
pub const EMPTY_ANSWER: &str = "No response available.";

const QA_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.into(),
            base_url: DEFAULT_GEMINI_URL.into(),
            temperature: None,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini-backed `AnswerGenerator` using a "stuff the context" QA prompt.
pub struct GeminiGenerator {
    agent: ureq::Agent,
    endpoint: String,
    config: GeminiConfig,
}

impl GeminiGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, DomainError> {
        if config.api_key.trim().is_empty() {
            return Err(DomainError::configuration("Gemini API key is empty"));
        }
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            trim_base_url(&config.base_url),
            config.model
        );
        Ok(Self {
            agent: build_agent(config.timeout),
            endpoint,
            config,
        })
    }

    fn request(
        &self,
        question: &str,
        context: &[Passage],
        history: &[ConversationTurn],
    ) -> GenerateRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .flat_map(|turn| {
                [
                    Content::text("user", &turn.question),
                    Content::text("model", &turn.answer),
                ]
            })
            .collect();
        contents.push(Content::text("user", &qa_prompt(question, context)));

        GenerateRequest {
            contents,
            generation_config: self
                .config
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        }
    }
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

/// Render the QA prompt: instructions, passages separated by blank lines,
/// then the question.
pub fn qa_prompt(question: &str, context: &[Passage]) -> String {
    let passages = context
        .iter()
        .map(|p| p.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{QA_PREAMBLE}\n\n{passages}\n\nQuestion: {question}\nHelpful Answer:")
}

fn extract_answer(response: GenerateResponse) -> Result<String, DomainError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(DomainError::generation(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(EMPTY_ANSWER.to_string());
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(DomainError::generation(format!(
                "model stopped without an answer: {reason}"
            )));
        }
        return Ok(EMPTY_ANSWER.to_string());
    }

    Ok(text.trim().to_string())
}

impl AnswerGenerator for GeminiGenerator {
    fn generate(
        &self,
        question: &str,
        context: &[Passage],
        history: &[ConversationTurn],
    ) -> Result<String, DomainError> {
        let body = self.request(question, context, history);
        debug!(
            model = %self.config.model,
            passages = context.len(),
            turns = history.len(),
            "calling Gemini"
        );

        let response: GenerateResponse = self
            .agent
            .post(&self.endpoint)
            .set("x-goog-api-key", &self.config.api_key)
            .send_json(&body)
            .map_err(|err| DomainError::generation(describe_http_error(err)))?
            .into_json()
            .map_err(|err| DomainError::generation(format!("unreadable Gemini response: {err}")))?;

        extract_answer(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::test_support;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn passage(content: &str) -> Passage {
        Passage {
            id: uuid::Uuid::nil(),
            source: "faq.md".into(),
            content: content.into(),
            score: 1.0,
        }
    }

    #[test]
    fn prompt_stuffs_context_before_question() {
        let prompt = qa_prompt(
            "What services do you offer?",
            &[passage("We file taxes."), passage(" We help with visas. ")],
        );
        assert!(prompt.starts_with("Use the following pieces of context"));
        assert!(prompt.contains("We file taxes.\n\nWe help with visas."));
        assert!(prompt.ends_with("Question: What services do you offer?\nHelpful Answer:"));
    }

    #[test]
    fn empty_candidates_fall_back_to_placeholder() {
        let response: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert_eq!(extract_answer(response).unwrap(), EMPTY_ANSWER);
    }

    #[test]
    fn blocked_prompts_are_generation_failures() {
        let response: GenerateResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        assert!(matches!(
            extract_answer(response),
            Err(DomainError::GenerationFailed(_))
        ));
    }

    #[test]
    fn missing_api_key_is_rejected() {
        assert!(matches!(
            GeminiGenerator::new(GeminiConfig::new("  ")),
            Err(DomainError::Configuration(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn generate_posts_prompt_and_reads_candidate_text() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/v1beta/models/gemini-1.5-flash:generateContent",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    let key = headers
                        .get("x-goog-api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *sink.lock() = Some((key, body));
                    Json(json!({
                        "candidates": [{
                            "content": {"role": "model", "parts": [{"text": "We offer tax filing. "}]},
                            "finishReason": "STOP"
                        }]
                    }))
                }
            }),
        );
        let base = test_support::serve(router).await;

        let answer = tokio::task::spawn_blocking(move || {
            let mut config = GeminiConfig::new("test-key");
            config.base_url = base;
            GeminiGenerator::new(config)
                .unwrap()
                .generate("What services do you offer?", &[passage("We file taxes.")], &[])
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(answer, "We offer tax filing.");
        let (key, body) = seen.lock().take().unwrap();
        assert_eq!(key, "test-key");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert!(contents[0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("We file taxes."));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn http_errors_become_generation_failures() {
        let router = Router::new().route(
            "/v1beta/models/gemini-1.5-flash:generateContent",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}})),
                )
            }),
        );
        let base = test_support::serve(router).await;

        let result = tokio::task::spawn_blocking(move || {
            let mut config = GeminiConfig::new("k");
            config.base_url = base;
            GeminiGenerator::new(config).unwrap().generate("q", &[], &[])
        })
        .await
        .unwrap();

        match result {
            Err(DomainError::GenerationFailed(msg)) => assert!(msg.contains("RESOURCE_EXHAUSTED")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn history_turns_precede_the_prompt() {
        let generator = GeminiGenerator::new(GeminiConfig::new("k")).unwrap();
        let history = [ConversationTurn {
            question: "Hi".into(),
            answer: "Hello!".into(),
        }];
        let request = generator.request("Next?", &[], &history);
        let roles: Vec<&str> = request.contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }
}
