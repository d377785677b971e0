//! Application setup and router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use inference_client::InferenceClient;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::checks::{CheckJobHandler, CheckStore, FilterPipeline, PgCheckStore};
use crate::domains::dictionary::EmbeddingBatchHandler;
use crate::kernel::{
    Dispatcher, DispatcherConfig, InferenceCompletionService, InferenceEmbeddingService, StreamHub,
};
use crate::server::routes::{
    cancel_check_job, check_job_status, check_status, health_handler, reembed_entries,
    stream_checks, submit_check,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub store: Arc<dyn CheckStore>,
    pub check_dispatcher: Dispatcher<CheckJobHandler>,
    pub embedding_dispatcher: Dispatcher<EmbeddingBatchHandler>,
    pub stream_hub: StreamHub,
}

/// Build the application router and the background dispatchers it shares.
pub fn build_app(pool: PgPool, config: &Config) -> Router {
    let mut client = InferenceClient::new(&config.inference_api_key);
    if let Some(base_url) = &config.inference_base_url {
        client = client.with_base_url(base_url);
    }
    let client = Arc::new(client);

    let completions = Arc::new(InferenceCompletionService::new(
        client.clone(),
        config.chat_model.clone(),
    ));
    let embeddings = Arc::new(InferenceEmbeddingService::new(
        client,
        config.embedding_model.clone(),
    ));

    let store: Arc<dyn CheckStore> = Arc::new(PgCheckStore::new(pool.clone()));
    let stream_hub = StreamHub::new();

    let pipeline = Arc::new(FilterPipeline::new(
        store.clone(),
        completions,
        embeddings.clone(),
    ));
    let check_dispatcher = Dispatcher::with_config(
        CheckJobHandler::new(store.clone(), pipeline, stream_hub.clone()),
        DispatcherConfig {
            max_concurrent: config.max_concurrent_checks,
            ..Default::default()
        },
    );
    let embedding_dispatcher =
        Dispatcher::new(EmbeddingBatchHandler::new(store.clone(), embeddings));

    let state = AppState {
        db_pool: pool,
        store,
        check_dispatcher,
        embedding_dispatcher,
        stream_hub,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/checks", post(submit_check))
        .route("/api/checks/:id", get(check_status))
        .route("/api/checks/jobs/:job_id", get(check_job_status))
        .route("/api/checks/jobs/:job_id/cancel", post(cancel_check_job))
        .route("/api/dictionary/reembed", post(reembed_entries))
        .route("/api/streams/checks/:organization_id", get(stream_checks))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
