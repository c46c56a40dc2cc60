use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod settings;

use application::services::{
    ChatConfig, EmbeddingEngine as EmbeddingEngineTrait, ServiceConfig, VectorStore,
};
use application::{ChatService, KnowledgeService};
#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{
    FileAudioStore, GeminiConfig, GeminiGenerator, GoogleSpeechSynthesizer, GoogleTranslator,
    SimpleEmbedEngine, SledVectorStore, SpeechConfig, TranslatorConfig, WhatlangDetector,
};
use interfaces::{create_router, AppState};
use settings::{AppConfig, EmbeddingBackend};

/// Process-wide collaborators built once at startup.
pub struct AppHandles {
    pub chat: Arc<ChatService>,
    pub knowledge: Arc<KnowledgeService>,
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter =
            std::env::var("SAHAYAK_LOG").unwrap_or_else(|_| "info,sahayak=debug".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}

/// Open the knowledge index and the embedding backend it was built with.
pub fn open_knowledge(config: &AppConfig) -> Result<Arc<KnowledgeService>> {
    std::fs::create_dir_all(&config.index.dir).with_context(|| {
        format!("failed to create index directory {:?}", config.index.dir)
    })?;
    let store: Arc<dyn VectorStore> = Arc::new(
        SledVectorStore::open(&config.index.dir)
            .map_err(|err| anyhow!(err.to_string()))
            .context("failed to open knowledge index")?,
    );

    let (embedder, service_config) = init_embedder(&config.embedding, config.retrieval.top_k)
        .context("failed to initialise embedding backend")?;
    Ok(Arc::new(KnowledgeService::new(
        embedder,
        store,
        service_config,
    )))
}

pub fn build_environment(config: &AppConfig) -> Result<AppHandles> {
    let api_key = config
        .require_api_key()
        .map_err(|err| anyhow!(err.to_string()))?
        .to_string();

    let knowledge = open_knowledge(config)?;
    knowledge
        .ensure_compatible()
        .map_err(|err| anyhow!(err.to_string()))
        .context("knowledge index cannot be served")?;

    let detector = WhatlangDetector::with_allowlist(&config.detector.allowlist)
        .map_err(|err| anyhow!(err.to_string()))?;

    let translator = GoogleTranslator::new(TranslatorConfig {
        base_url: config.translation.base_url.clone(),
        timeout: config.timeouts.translation(),
    });

    let generator = GeminiGenerator::new(GeminiConfig {
        api_key,
        model: config.generation.model.clone(),
        base_url: config.generation.base_url.clone(),
        temperature: config.generation.temperature,
        timeout: config.timeouts.generation(),
    })
    .map_err(|err| anyhow!(err.to_string()))?;

    let synthesizer = GoogleSpeechSynthesizer::new(SpeechConfig {
        base_url: config.speech.base_url.clone(),
        timeout: config.timeouts.speech(),
    });

    let audio = FileAudioStore::open(&config.audio.dir, config.audio.naming, config.audio.retain)
        .map_err(|err| anyhow!(err.to_string()))
        .context("failed to prepare audio directory")?;

    let chat = Arc::new(ChatService::new(
        Arc::new(detector),
        Arc::new(translator),
        knowledge.clone(),
        Arc::new(generator),
        Arc::new(synthesizer),
        Arc::new(audio),
        ChatConfig {
            allow_text_only: config.audio.allow_text_only,
        },
    ));

    Ok(AppHandles { chat, knowledge })
}

pub fn init_embedder(
    backend: &EmbeddingBackend,
    top_k: usize,
) -> Result<(Arc<dyn EmbeddingEngineTrait>, ServiceConfig)> {
    match backend {
        EmbeddingBackend::Simple { model, dimensions } => {
            let engine = SimpleEmbedEngine::try_new(model.clone(), *dimensions)
                .map_err(|err| anyhow!(err.to_string()))?;
            Ok((Arc::new(engine), ServiceConfig::new(model.clone(), top_k)))
        }
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            let engine = FastEmbedEngine::try_new(model).map_err(|err| anyhow!(err.to_string()))?;
            Ok((Arc::new(engine), ServiceConfig::new(model.clone(), top_k)))
        }
    }
}

/// Build every collaborator and serve until Ctrl+C.
pub async fn run_server(config: AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let startup = config.clone();
    let handles = tokio::task::spawn_blocking(move || build_environment(&startup))
        .await
        .context("startup task failed")??;

    let state = AppState {
        chat: handles.chat,
        knowledge: handles.knowledge,
        public_base_url: Arc::from(config.server.public_base_url.trim_end_matches('/')),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        backend = config.embedding.id(),
        model = config.embedding.model_name(),
        audio_dir = %config.audio.dir.display(),
        "sahayak listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
