//! HTTP API around the research pipeline.
//!
//! `POST /run` takes `{"company_name": "..."}` and answers with the final
//! research state, or a 500 carrying the state's error. `GET /health` reports
//! that the service is up.

use crate::config::ResearchConfig;
use crate::error::ServerError;
use crate::pipeline::ResearchState;
use crate::research::{Researcher, research};
use async_trait::async_trait;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Something that can research a company on request
#[async_trait]
pub trait ResearchService: Send + Sync {
    async fn research(&self, company: &str) -> ResearchState;
}

#[async_trait]
impl ResearchService for Researcher {
    async fn research(&self, company: &str) -> ResearchState {
        self.run(company).await
    }
}

/// Builds a fresh [`Researcher`] from the configuration for every request
#[async_trait]
impl ResearchService for ResearchConfig {
    async fn research(&self, company: &str) -> ResearchState {
        research(self, company).await
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub company_name: String,
}

#[derive(Clone)]
struct AppState {
    service: Arc<dyn ResearchService>,
}

pub fn router(service: Arc<dyn ResearchService>) -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

/// Serves the API on `bind` until the process is stopped
pub async fn serve(bind: &str, service: Arc<dyn ResearchService>) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind.to_string(),
            source,
        })?;
    ::log::info!("Listening on {}", bind);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn run(
    State(app): State<AppState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<ResearchState>, ServerError> {
    let Json(request) = payload.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    ::log::info!("Research requested for {}", request.company_name);

    let state = app.service.research(&request.company_name).await;
    if let Some(error) = state.error() {
        return Err(ServerError::Research(error.to_string()));
    }
    Ok(Json(state))
}

async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
