//! FraudShield Server
//!
//! Prepares training data for the fraud decision model, drives model
//! training and registration against managed services, and fronts the
//! deployed detector for real-time scoring and explanations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     FRAUDSHIELD SERVER                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐   │
//! │  │  API      │──▶│  Training Orchestrator               │   │
//! │  │  (Axum)   │   │  Reconciler → Job Driver → Registrar │   │
//! │  └─────┬─────┘   └──────────────────┬───────────────────┘   │
//! │        │         ┌──────────────────┴──┐                    │
//! │        ├────────▶│ Synthetic Generator │                    │
//! │        │         └──────────┬──────────┘                    │
//! │        │         ┌─────────────────────┐                    │
//! │        └────────▶│ Scorer · Explainer  │                    │
//! │                  └──────────┬──────────┘                    │
//! │                             ▼                               │
//! │   Object Store · Training Service · Model Registry · LLM    │
//! │   Scoring Runtime · Attribution Endpoint                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod generation;
mod handlers;
mod models;
mod pipeline;
mod scoring;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::generation::SyntheticGenerator;
use crate::pipeline::{JobDriver, Reconciler, Registrar, TrainingOrchestrator};
use crate::scoring::{Explainer, Scorer};
use crate::services::{
    EventScorer, FeatureAttributor, HttpEventScorer, HttpFeatureAttributor, HttpModelRegistry, HttpTextGenerator,
    HttpTrainingService, InMemoryObjectStore, LocalObjectStore, ModelRegistry, ObjectStore, TextGenerator,
    TrainingJobService,
};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    init_tracing(&config.log_format);

    tracing::info!("FraudShield Server starting...");
    tracing::info!(
        environment = %config.environment,
        bucket = %config.data_bucket,
        storage = %config.storage_backend,
        "Configuration loaded"
    );

    let store = build_store(&config);
    let training: Arc<dyn TrainingJobService> = Arc::new(
        HttpTrainingService::new(config.training_service_url.clone(), config.http_timeout())
            .context("Failed to build training service client")?,
    );
    let registry: Arc<dyn ModelRegistry> = Arc::new(
        HttpModelRegistry::new(config.registry_service_url.clone(), config.http_timeout())
            .context("Failed to build model registry client")?,
    );
    let model: Arc<dyn TextGenerator> = Arc::new(
        HttpTextGenerator::new(
            config.generator_service_url.clone(),
            config.generator_model_id.clone(),
            config.http_timeout(),
        )
        .context("Failed to build generative model client")?,
    );
    let scorer: Arc<dyn EventScorer> = Arc::new(
        HttpEventScorer::new(config.scoring_service_url.clone(), config.http_timeout())
            .context("Failed to build scoring runtime client")?,
    );
    let attributor: Arc<dyn FeatureAttributor> = Arc::new(
        HttpFeatureAttributor::new(config.attribution_service_url.clone(), config.http_timeout())
            .context("Failed to build attribution endpoint client")?,
    );
    if config.attribution_endpoint.is_none() {
        tracing::warn!("ATTRIBUTION_ENDPOINT not set; explanations are unavailable");
    }

    // Build application state
    let state = AppState::new(config.clone(), store, training, registry, model, scorer, attributor);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraudshield_server=debug,tower_http=debug".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_store(config: &config::Config) -> Arc<dyn ObjectStore> {
    match config.storage_backend.as_str() {
        "memory" => {
            if config.is_production() {
                tracing::warn!("In-memory object store in production; data is lost on restart");
            }
            Arc::new(InMemoryObjectStore::new())
        }
        other => {
            if other != "local" {
                tracing::warn!(backend = %other, "Unknown storage backend, using local");
            }
            tracing::info!(root = %config.storage_root.display(), "Using local object store");
            Arc::new(LocalObjectStore::new(config.storage_root.clone()))
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub orchestrator: Arc<TrainingOrchestrator>,
    pub generator: Arc<SyntheticGenerator>,
    pub scorer: Arc<Scorer>,
    pub explainer: Arc<Explainer>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        store: Arc<dyn ObjectStore>,
        training: Arc<dyn TrainingJobService>,
        registry: Arc<dyn ModelRegistry>,
        model: Arc<dyn TextGenerator>,
        scorer: Arc<dyn EventScorer>,
        attributor: Arc<dyn FeatureAttributor>,
    ) -> Self {
        let orchestrator = TrainingOrchestrator::new(
            Reconciler::new(store.clone(), config.reconciler_config()),
            JobDriver::new(training, config.job_driver_config()),
            Registrar::new(registry, config.registrar_config()),
        );
        let generator = SyntheticGenerator::new(model, store, config.generator_config());
        let scorer = Scorer::new(scorer, config.scorer_config());
        let explainer = Explainer::new(attributor, config.attribution_endpoint.clone());

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            generator: Arc::new(generator),
            scorer: Arc::new(scorer),
            explainer: Arc::new(explainer),
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        // Model training
        .route("/api/v1/model/train", post(handlers::training::train))
        .route("/api/v1/model/retrain", post(handlers::training::retrain))
        // Synthetic data
        .route("/api/v1/fraud/generate", post(handlers::generation::generate))
        // Real-time scoring
        .route("/api/v1/fraud/predict", post(handlers::scoring::predict))
        .route("/api/v1/fraud/explain", post(handlers::scoring::explain))
        .fallback(handlers::not_found)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
