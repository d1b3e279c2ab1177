//! HTTP surface over the orchestrator.

pub mod client_key;
mod error;
pub mod handlers;
pub mod vector;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use client_key::ClientKey;
pub use vector::{EmbeddingsRequest, UnconfiguredVectorBackend, VectorBackend, VectorRequest};

use crate::admission::AdmissionRoutes;
use crate::config::SwitchyardConfig;
use crate::error::SwitchyardError;
use crate::orchestrator::Orchestrator;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub admission: Arc<AdmissionRoutes>,
    pub vector: Arc<dyn VectorBackend>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// No admission limits and no vector store.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            admission: Arc::new(AdmissionRoutes::open()),
            vector: Arc::new(UnconfiguredVectorBackend),
            trust_proxy_headers: false,
        }
    }

    pub fn from_config(config: &SwitchyardConfig) -> Result<Self, SwitchyardError> {
        Ok(Self {
            orchestrator: Orchestrator::from_config(config)?,
            admission: Arc::new(AdmissionRoutes::new(&config.admission, &config.rate_limit)),
            vector: Arc::new(UnconfiguredVectorBackend),
            trust_proxy_headers: config.rate_limit.trust_proxy_headers,
        })
    }

    pub fn with_admission(mut self, admission: AdmissionRoutes) -> Self {
        self.admission = Arc::new(admission);
        self
    }

    pub fn with_vector(mut self, vector: Arc<dyn VectorBackend>) -> Self {
        self.vector = vector;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("admission", &self.admission)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(handlers::run))
        .route("/stream", post(handlers::stream))
        .route("/vector/run", post(handlers::vector_run))
        .route("/vector/stream", post(handlers::vector_stream))
        .route("/vector/embeddings/run", post(handlers::embeddings))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .with_state(state)
}

/// Bind `config.server.listen` and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &SwitchyardConfig) -> Result<(), SwitchyardError> {
    let addr: SocketAddr = config.server.listen.parse().map_err(|err| {
        SwitchyardError::Configuration(format!(
            "invalid listen address '{}': {err}",
            config.server.listen
        ))
    })?;
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "switchyard listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("switchyard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
