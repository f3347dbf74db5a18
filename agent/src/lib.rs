//! Outpost Agent
//!
//! This crate provides the local telemetry agent: it accepts spans, metric
//! points and log entries from producers over HTTP and exports them in batches
//! to a remote collector through the shared export pipeline.
//!
//! # Architecture
//!
//! The agent is built on Axum and Tokio, providing:
//! - `POST /v1/{traces|metrics|logs}` for record ingestion
//! - `GET /health` and `GET /stats` for operators
//! - Graceful shutdown: on SIGTERM/SIGINT the HTTP server stops accepting
//!   requests, then the pipelines flush within the configured grace period
//!
//! # Example
//!
//! ```no_run
//! use agent::run_agent;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_agent().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
mod routes;
mod state;

pub use config::AgentConfig;
pub use routes::{
    ErrorResponse, HealthResponse, IngestRequest, IngestResponse, RecordRequest, StatsResponse,
    ValidationErrorDetail,
};
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use shared::pipeline::{PipelineManager, ShutdownResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runs the Outpost agent.
///
/// This function initializes the agent with configuration from environment
/// variables and starts listening for incoming connections. It handles
/// graceful shutdown on SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_agent() -> Result<()> {
    let config = AgentConfig::from_env()?;
    run_agent_with_config(config).await
}

/// Runs the Outpost agent with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The pipeline configuration is invalid
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_agent_with_config(config: AgentConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    serve(listener, config, shutdown_signal()).await?;
    Ok(())
}

/// Serves the agent on `listener` until `signal` completes, then flushes the
/// export pipelines.
///
/// # Errors
///
/// Returns an error if the pipeline cannot start or the server fails.
pub async fn serve(
    listener: TcpListener,
    config: AgentConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<ShutdownResult> {
    tracing::info!(
        host = %config.host,
        port = %config.port,
        endpoint = %config.pipeline.endpoint,
        sampler = %config.sampler,
        "Outpost agent starting"
    );

    let grace = config.shutdown_timeout();
    let pipeline = Arc::new(PipelineManager::start(config.pipeline, config.sampler)?);
    let app = create_router(AppState::new(Arc::clone(&pipeline)));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await;

    finish(&pipeline, grace, served).await
}

/// Flushes the export pipelines once the HTTP server has stopped, then
/// reports the server's own failure, if any.
async fn finish(
    pipeline: &PipelineManager,
    grace: Duration,
    served: std::io::Result<()>,
) -> Result<ShutdownResult> {
    match &served {
        Ok(()) => tracing::info!("HTTP server stopped, flushing export pipelines"),
        Err(err) => tracing::error!(%err, "HTTP server failed, flushing export pipelines"),
    }

    let result = pipeline.shutdown(grace).await;
    if result.is_clean() {
        tracing::info!(flushed = ?result.flushed, "Agent shutdown complete");
    } else {
        tracing::warn!(
            flushed = ?result.flushed,
            abandoned = ?result.abandoned,
            "Agent shutdown complete, some telemetry was not exported"
        );
    }
    served?;
    Ok(result)
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::stats_routes())
        .merge(routes::ingest_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shared::config::PipelineConfig;
    use shared::models::RecordKind;
    use shared::pipeline::PipelineState;
    use shared::sampler::Sampler;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let pipeline =
            PipelineManager::start(PipelineConfig::new("http://127.0.0.1:9"), Sampler::default())
                .unwrap();
        AppState::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_200() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok());

        assert!(content_type.is_some_and(|ct| ct.contains("application/json")));
    }

    #[tokio::test]
    async fn test_serve_flushes_pipelines_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = AgentConfig {
            pipeline: PipelineConfig::new("http://127.0.0.1:9"),
            ..AgentConfig::default()
        };

        let result = serve(listener, config, async {}).await.unwrap();

        assert!(result.is_clean());
        assert_eq!(result.flushed, RecordKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_server_failure_still_flushes_pipelines() {
        let pipeline =
            PipelineManager::start(PipelineConfig::new("http://127.0.0.1:9"), Sampler::default())
                .unwrap();

        let err = finish(
            &pipeline,
            Duration::from_secs(1),
            Err(std::io::Error::other("listener failed")),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("listener failed"));
        for kind in RecordKind::ALL {
            assert_eq!(pipeline.state(kind), PipelineState::Stopped);
        }
        assert!(pipeline.shutdown(Duration::ZERO).await.is_clean());
    }

    #[tokio::test]
    async fn test_serve_rejects_invalid_pipeline_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = AgentConfig {
            pipeline: PipelineConfig::new("not-a-url"),
            ..AgentConfig::default()
        };

        assert!(serve(listener, config, async {}).await.is_err());
    }
}
