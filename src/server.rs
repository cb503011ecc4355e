//! HTTP surface: the dashboard page plus a few JSON endpoints.
//!
//! The server keeps the last successfully built dashboard. A page view
//! renders it (building it on first use); `POST /refresh` is the only thing
//! that fetches again, unless `refresh_on_view` is set.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::RwLock;

use crate::dashboard::{load_and_build, Dashboard};
use crate::error::{DashboardError, FetchError};
use crate::logging::{info, obj, v_str, warn, Domain};
use crate::render::{escape_html, render_page, PageOptions};
use crate::store::DocumentStore;
use crate::trial::IncompleteTrialPolicy;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub collection: String,
    pub document: String,
    pub policy: IncompleteTrialPolicy,
    pub preview_rows: usize,
    pub refresh_on_view: bool,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore + Send + Sync>,
    opts: Arc<ServerOptions>,
    snapshot: Arc<RwLock<Option<Arc<Dashboard>>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore + Send + Sync>, opts: ServerOptions) -> Self {
        Self {
            store,
            opts: Arc::new(opts),
            snapshot: Arc::new(RwLock::new(None)),
        }
    }

    /// Fetch and build now, replacing the held snapshot on success.
    pub async fn refresh(&self) -> Result<Arc<Dashboard>, DashboardError> {
        let dashboard = Arc::new(
            load_and_build(
                self.store.as_ref(),
                &self.opts.collection,
                &self.opts.document,
                self.opts.policy,
            )
            .await?,
        );
        *self.snapshot.write().await = Some(dashboard.clone());
        Ok(dashboard)
    }

    /// The held snapshot, building it if there is none yet.
    pub async fn current(&self) -> Result<Arc<Dashboard>, DashboardError> {
        if self.opts.refresh_on_view {
            return self.refresh().await;
        }
        if let Some(d) = self.snapshot.read().await.as_ref() {
            return Ok(d.clone());
        }
        self.refresh().await
    }
}

/// A failed load: status plus a plain message, never partial content.
pub struct LoadFailure(DashboardError);

impl From<DashboardError> for LoadFailure {
    fn from(e: DashboardError) -> Self {
        Self(e)
    }
}

pub fn status_for(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::Fetch(FetchError::NotFound { .. }) => StatusCode::NOT_FOUND,
        DashboardError::Fetch(_) => StatusCode::BAD_GATEWAY,
        DashboardError::Document(_) | DashboardError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

impl IntoResponse for LoadFailure {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = self.0.to_string();
        warn(
            Domain::Server,
            "load_failed",
            obj(&[("status", json!(status.as_u16())), ("error", v_str(&message))]),
        );
        let body = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"/><title>Load failed</title></head>\
             <body><h1>{} {}</h1><pre>{}</pre></body></html>",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            escape_html(&message)
        );
        (status, Html(body)).into_response()
    }
}

async fn page(State(state): State<AppState>) -> Result<Response, LoadFailure> {
    let dashboard = state.current().await?;
    let html = render_page(
        &dashboard,
        &PageOptions {
            preview_rows: state.opts.preview_rows,
            ..PageOptions::default()
        },
    );
    Ok((
        [(header::ETAG, format!("\"{}\"", dashboard.fingerprint))],
        Html(html),
    )
        .into_response())
}

async fn refresh(State(state): State<AppState>) -> Result<Redirect, LoadFailure> {
    let dashboard = state.refresh().await?;
    info(
        Domain::Server,
        "refreshed",
        obj(&[("fingerprint", v_str(&dashboard.fingerprint))]),
    );
    Ok(Redirect::to("/"))
}

async fn table(State(state): State<AppState>) -> Result<Json<serde_json::Value>, LoadFailure> {
    let dashboard = state.current().await?;
    Ok(Json(dashboard.table_json()))
}

async fn document(State(state): State<AppState>) -> Result<Json<serde_json::Value>, LoadFailure> {
    let dashboard = state.current().await?;
    Ok(Json(serde_json::Value::Object(dashboard.document.clone())))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page))
        .route("/refresh", post(refresh))
        .route("/api/table", get(table))
        .route("/api/document", get(document))
        .route("/api/health", get(health))
        .with_state(state)
}
