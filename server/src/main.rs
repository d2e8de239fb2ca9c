use anyhow::Result;
use auroraseek_core::config::{BM25_B, BM25_K1, DEFAULT_RERANK_TIMEOUT_MS};
use auroraseek_core::{Bm25Params, EngineConfig, InvertedIndex, QueryEngine};
use axum::Router;
use clap::Parser;
use server::{build_app, seed_index, select_reranker, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "In-memory BM25 search service")]
struct Args {
    /// Host to bind
    #[arg(long, env = "QUERY_HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "QUERY_PORT", default_value_t = 8080)]
    port: u16,
    /// JSON/JSONL page files or directories indexed at startup
    #[arg(long)]
    seed: Vec<PathBuf>,
    /// Reranking service endpoint (POST, JSON)
    #[arg(long, env = "RERANKER_URL")]
    reranker_url: Option<String>,
    /// Use the built-in cosine reranker when no reranker URL is set
    #[arg(long, default_value_t = false)]
    local_rerank: bool,
    /// Deadline for one reranker round trip
    #[arg(long, env = "RERANK_TIMEOUT_MS", default_value_t = DEFAULT_RERANK_TIMEOUT_MS)]
    rerank_timeout_ms: u64,
    /// BM25 term-frequency saturation
    #[arg(long, default_value_t = BM25_K1)]
    k1: f64,
    /// BM25 length normalization
    #[arg(long, default_value_t = BM25_B)]
    b: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let index = Arc::new(InvertedIndex::new());
    if !args.seed.is_empty() {
        let added = seed_index(&index, &args.seed)?;
        tracing::info!(added, num_docs = index.len(), "seeded index");
    }

    let rerank_timeout = Duration::from_millis(args.rerank_timeout_ms);
    let reranker = select_reranker(args.reranker_url.as_deref(), args.local_rerank, rerank_timeout)?;
    let config = EngineConfig {
        bm25: Bm25Params { k1: args.k1, b: args.b },
        rerank_timeout,
        ..EngineConfig::default()
    };
    let engine = QueryEngine::new(index, reranker, config);
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    if admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, /index/batch will reject all requests");
    }
    let app: Router = build_app(AppState::new(engine, admin_token));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
