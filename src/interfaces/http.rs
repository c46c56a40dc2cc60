//! HTTP surface: `POST /chat`, `GET /audio/:filename` and `GET /health`.
//!
//! Handlers stay thin. Every pipeline call is blocking (remote HTTP, sled,
//! file IO), so each one runs on tokio's blocking pool.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::{
    application::{
        ChatRequest, ChatResponse, ChatService, ErrorBody, HealthStatusResponse, KnowledgeService,
    },
    domain::DomainError,
    infrastructure::storage::validate_file_name,
};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub knowledge: Arc<KnowledgeService>,
    pub public_base_url: Arc<str>,
}

/// Error envelope: status from the error kind, `response` is the fixed
/// user-facing line and `error` the detail.
#[derive(Debug)]
pub struct ApiError(DomainError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::Validation(_)
            | DomainError::LimitExceeded(_)
            | DomainError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<task::JoinError> for ApiError {
    fn from(err: task::JoinError) -> Self {
        Self(DomainError::other(format!("worker task failed: {err}")))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self.0, "request failed");
        } else {
            warn!(status = %status, error = %self.0, "request rejected");
        }

        let body = ErrorBody {
            response: self.0.public_message().to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Create the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/audio/:filename", get(audio))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let query = match payload {
        Ok(Json(request)) => request.query,
        Err(rejection) => {
            return Err(DomainError::validation(rejection.body_text()).into());
        }
    };

    let service = Arc::clone(&state.chat);
    let reply = task::spawn_blocking(move || service.chat(query.as_deref())).await??;

    Ok(Json(ChatResponse::assemble(reply, &state.public_base_url)))
}

async fn audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let name = validate_file_name(&filename)?.to_string();

    let store = state.chat.audio();
    let lookup = name.clone();
    let bytes = task::spawn_blocking(move || store.load(&lookup)).await??;

    let headers = [
        (header::CONTENT_TYPE, "audio/mpeg".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        ),
    ];
    Ok((headers, bytes).into_response())
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthStatusResponse>, ApiError> {
    let knowledge = Arc::clone(&state.knowledge);
    let status = task::spawn_blocking(move || knowledge.health()).await??;
    Ok(Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{fakes::Fakes, ChatConfig, ServiceConfig};
    use crate::infrastructure::{AudioNaming, FileAudioStore, SimpleEmbedEngine, SledVectorStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        fakes: Arc<Fakes>,
        _dir: tempfile::TempDir,
    }

    fn knowledge(dir: &std::path::Path) -> Arc<KnowledgeService> {
        Arc::new(KnowledgeService::new(
            Arc::new(SimpleEmbedEngine::default()),
            Arc::new(SledVectorStore::open(dir.join("index")).unwrap()),
            ServiceConfig::default(),
        ))
    }

    fn harness(fakes: Arc<Fakes>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            chat: Arc::new(fakes.service(ChatConfig::default())),
            knowledge: knowledge(dir.path()),
            public_base_url: Arc::from(""),
        };
        Harness {
            router: create_router(state),
            fakes,
            _dir: dir,
        }
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_call() {
        let h = harness(Fakes::new(Some("en")));

        let response = h.router.oneshot(post_chat(json!({"query": ""}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["response"], "Query is required!");
        assert_eq!(h.fakes.calls.total(), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let h = harness(Fakes::new(Some("en")));
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = h.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.fakes.calls.total(), 0);
    }

    #[tokio::test]
    async fn english_chat_returns_fetchable_audio() {
        let h = harness(Fakes::new(Some("en")));

        let response = h
            .router
            .clone()
            .oneshot(post_chat(json!({"query": "What services do you offer?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert!(body["response"]
            .as_str()
            .unwrap()
            .starts_with("answer to What services do you offer?"));
        let url = body["audio_file_url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/audio/"));

        let audio = h.router.oneshot(get(&url)).await.unwrap();
        assert_eq!(audio.status(), StatusCode::OK);
        assert_eq!(audio.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert!(audio.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment"));
        let bytes = to_bytes(audio.into_body(), usize::MAX).await.unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(h.fakes.calls.translate.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generation_failure_is_a_server_error_without_audio() {
        let h = harness(Fakes::new(Some("en")).with(|f| f.fail_generation = true));

        let response = h
            .router
            .oneshot(post_chat(json!({"query": "hello there"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["response"], "Failed to generate AI response.");
        assert!(body["error"].as_str().unwrap().contains("model unavailable"));
        assert_eq!(h.fakes.calls.synthesize.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_audio_is_not_found() {
        let h = harness(Fakes::new(Some("en")));

        let response = h.router.oneshot(get("/audio/nonexistent.mp3")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["response"],
            "Failed to send audio file."
        );
    }

    #[tokio::test]
    async fn traversal_names_are_bad_requests() {
        let h = harness(Fakes::new(Some("en")));

        for uri in ["/audio/..%2Fsecret", "/audio/.env", "/audio/..%5Cboot.ini"] {
            let response = h.router.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                json_body(response).await["response"],
                "Failed to send audio file.",
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn file_store_serves_what_chat_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let fakes = Fakes::new(Some("pa"));
        let store =
            Arc::new(FileAudioStore::open(dir.path().join("audio"), AudioNaming::PerRequest, 8).unwrap());
        let chat = ChatService::new(
            fakes.clone(),
            fakes.clone(),
            fakes.clone(),
            fakes.clone(),
            fakes.clone(),
            store,
            ChatConfig::default(),
        );
        let router = create_router(AppState {
            chat: Arc::new(chat),
            knowledge: knowledge(dir.path()),
            public_base_url: Arc::from("https://bot.example"),
        });

        let body = json_body(
            router
                .clone()
                .oneshot(post_chat(json!({"query": "ਤੁਸੀਂ ਕੀ ਕਰਦੇ ਹੋ?"})))
                .await
                .unwrap(),
        )
        .await;
        assert!(body["response"].as_str().unwrap().starts_with("pa("));
        let url = body["audio_file_url"].as_str().unwrap();
        let path = url.strip_prefix("https://bot.example").unwrap();

        let audio = router.oneshot(get(path)).await.unwrap();
        assert_eq!(audio.status(), StatusCode::OK);
        let bytes = to_bytes(audio.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"mp3[pa]"));
    }

    #[tokio::test]
    async fn health_reports_index_state() {
        let h = harness(Fakes::new(Some("en")));

        let response = h.router.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ok"], true);
    }
}
