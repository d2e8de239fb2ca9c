use anyhow::{bail, Context, Result};
use auroraseek_core::ingest::{load_pages, parse_jsonl};
use auroraseek_core::Page;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Feed pages into a running search server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post pages from JSON/JSONL files, a directory, or stdin (`-`) to the server
    Feed {
        /// Input path (file or directory), or `-` for JSONL on stdin
        #[arg(long)]
        input: String,
        /// Base URL of the search server
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
        /// Pages per request
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        /// Token sent as X-ADMIN-TOKEN
        #[arg(long, env = "ADMIN_TOKEN")]
        admin_token: String,
    },
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    indexed: usize,
    dropped: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Feed { input, server, batch_size, admin_token } => {
            let pages = read_input(&input)?;
            feed(&pages, &server, batch_size, &admin_token).await
        }
    }
}

fn read_input(input: &str) -> Result<Vec<Page>> {
    if input == "-" {
        return parse_jsonl(io::stdin().lock()).context("reading pages from stdin");
    }
    let path = Path::new(input);
    if !path.exists() {
        bail!("input path does not exist: {input}");
    }
    load_pages(path)
}

async fn feed(pages: &[Page], server: &str, batch_size: usize, admin_token: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/index/batch", server.trim_end_matches('/'));
    let mut indexed = 0usize;
    let mut dropped = 0usize;

    for chunk in pages.chunks(batch_size.max(1)) {
        let resp = client
            .post(&url)
            .header("X-ADMIN-TOKEN", admin_token)
            .json(chunk)
            .send()
            .await
            .with_context(|| format!("posting batch to {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("server rejected batch ({status}): {text}");
        }
        let out: BatchResponse = resp.json().await?;
        indexed += out.indexed;
        dropped += out.dropped;
        tracing::info!(batch = chunk.len(), indexed, "batch accepted");
    }

    tracing::info!(indexed, dropped, total = pages.len(), "feed complete");
    Ok(())
}
