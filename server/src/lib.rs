use anyhow::Result;
use auroraseek_core::config::MAX_K;
use auroraseek_core::ingest::load_pages;
use auroraseek_core::rerank::{RerankRequest, RerankResponse};
use auroraseek_core::{CosineReranker, HttpReranker, InvertedIndex, NoopReranker, Page, QueryEngine, Reranker, SearchHit};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: i64,
}
fn default_k() -> i64 { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub reranked: bool,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub length: u32,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub num_docs: usize,
    pub avg_doc_len: f64,
    pub num_terms: usize,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub indexed: usize,
    pub dropped: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(engine: QueryEngine, admin_token: Option<String>) -> Self {
        Self { engine: Arc::new(engine), admin_token }
    }

    fn index(&self) -> &InvertedIndex {
        self.engine.index()
    }
}

/// Remote reranker when a URL is configured, the in-process cosine reranker
/// when `local` is set, otherwise none.
pub fn select_reranker(url: Option<&str>, local: bool, timeout: Duration) -> Result<Arc<dyn Reranker>> {
    match url.filter(|u| !u.trim().is_empty()) {
        Some(u) => {
            tracing::info!(url = u, "using remote reranker");
            Ok(Arc::new(HttpReranker::new(u, timeout)?))
        }
        None if local => {
            tracing::info!("using local cosine reranker");
            Ok(Arc::new(CosineReranker))
        }
        None => Ok(Arc::new(NoopReranker)),
    }
}

/// Index every page found under `paths`; returns how many were added.
pub fn seed_index(index: &InvertedIndex, paths: &[PathBuf]) -> Result<usize> {
    let mut added = 0;
    for path in paths {
        for page in load_pages(path)? {
            index.add_page(&page);
            added += 1;
        }
    }
    Ok(added)
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/index/batch", post(index_batch))
        .route("/rerank", post(rerank_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(0, MAX_K as i64) as usize;
    let outcome = state.engine.search_detailed(&params.q, k).await;
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, k, hits = outcome.hits.len(), reranked = outcome.reranked, "search");
    Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: outcome.total_hits,
        reranked: outcome.reranked,
        results: outcome.hits,
    })
}

pub async fn doc_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DocResponse>, (StatusCode, Json<serde_json::Value>)> {
    match state.index().get(&id) {
        Some(doc) => Ok(Json(DocResponse {
            id: doc.id.clone(),
            url: doc.url.clone(),
            title: doc.title.clone(),
            body: doc.body.clone(),
            length: doc.length,
        })),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let snap = state.index().snapshot();
    Json(StatsResponse { num_docs: snap.num_docs, avg_doc_len: snap.avg_doc_len, num_terms: snap.doc_freqs.len() })
}

/// Reference reranker over the same wire contract the engine's HTTP client
/// speaks.
pub async fn rerank_handler(Json(req): Json<RerankRequest>) -> Json<RerankResponse> {
    Json(RerankResponse { order: CosineReranker.order(&req.query, &req.candidates) })
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(docs): Json<Vec<serde_json::Value>>) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let mut indexed = 0;
    let mut dropped = 0;
    for value in docs {
        match serde_json::from_value::<Page>(value) {
            Ok(page) => {
                state.index().add_page(&page);
                indexed += 1;
            }
            Err(err) => {
                tracing::warn!(%err, "dropping undecodable page");
                dropped += 1;
            }
        }
    }
    tracing::info!(indexed, dropped, total_docs = state.index().len(), "ingested batch");
    Ok(Json(BatchResponse { indexed, dropped }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
