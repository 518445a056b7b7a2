//! HTTP receiver for Cycle webhooks
//!
//! Each delivery is processed to completion before the response is sent.
//! The response is always `200 OK` with the [`EventReport`] as JSON, so a
//! failed event never makes Cycle redeliver it.
//!
//! # Routes
//!
//! - `POST /webhook` - Process one event
//! - `GET /health` - Liveness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use cycle_autotag::config::AutotagConfig;
//! use cycle_autotag::integrations::{CycleClient, HttpTransport};
//! use cycle_autotag::processor::EventProcessor;
//! use cycle_autotag::server::WebhookServer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> cycle_autotag::Result<()> {
//!     let config = Arc::new(AutotagConfig::load_default()?);
//!     let client = CycleClient::new(HttpTransport::from_config(&config)?);
//!     let processor = EventProcessor::from_config(config, client).await?;
//!
//!     WebhookServer::new(processor).run("127.0.0.1:8787").await?;
//!     Ok(())
//! }
//! ```

use crate::integrations::GraphQLTransport;
use crate::processor::{EventProcessor, EventReport, InboundEvent};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Default request body size limit
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bind error: {0}")]
    Bind(String),
}

impl From<ServerError> for crate::AutotagError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Io(e) => crate::AutotagError::Io(e),
            ServerError::Bind(msg) => crate::AutotagError::Other(format!("Bind error: {}", msg)),
        }
    }
}

/// HTTP receiver for webhook deliveries
pub struct WebhookServer<T: GraphQLTransport + 'static> {
    processor: Arc<EventProcessor<T>>,
    max_body_size: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<T: GraphQLTransport + 'static> WebhookServer<T> {
    pub fn new(processor: EventProcessor<T>) -> Self {
        Self {
            processor: Arc::new(processor),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            shutdown: None,
        }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Stop accepting connections once the watched value becomes `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the router
    pub fn router(processor: Arc<EventProcessor<T>>, max_body_size: usize) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route("/webhook", post(receive_event::<T>))
            .layer(DefaultBodyLimit::max(max_body_size))
            .with_state(processor)
    }

    /// Run the server on the given address
    pub async fn run(self, addr: &str) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        tracing::info!(
            addr = addr,
            workspace_id = %self.processor.workspace_id(),
            max_body_size = self.max_body_size,
            "Webhook receiver listening"
        );

        let router = Self::router(self.processor, self.max_body_size);

        match self.shutdown {
            Some(mut shutdown) => axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                    tracing::info!("Webhook receiver shutting down");
                })
                .await
                .map_err(ServerError::Io),
            None => axum::serve(listener, router).await.map_err(ServerError::Io),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics() -> Response {
    match crate::metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn receive_event<T: GraphQLTransport + 'static>(
    State(processor): State<Arc<EventProcessor<T>>>,
    Json(event): Json<InboundEvent>,
) -> Json<EventReport> {
    tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Webhook received");
    Json(processor.handle(&event).await)
}
