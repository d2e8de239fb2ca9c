//! Second-stage reordering of the BM25 head.
//!
//! A reranker receives the query and an ordered window of candidates and
//! answers with the identifiers in its preferred order. Callers treat every
//! error as "keep the BM25 order".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankCandidate {
    pub id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankRequest {
    pub query: String,
    pub candidates: Vec<RerankCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankResponse {
    pub order: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RerankError {
    #[error("reranker request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reranker answered with status {0}")]
    Status(u16),
    #[error("reranker returned an empty order")]
    EmptyOrder,
    #[error("reranker did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>, RerankError>;
}

/// Leaves the submitted order untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>, RerankError> {
        Ok(candidates.iter().map(|c| c.id.clone()).collect())
    }
}

/// Client for a reranking service speaking `RerankRequest` / `RerankResponse`
/// JSON over `POST`.
#[derive(Debug, Clone)]
pub struct HttpReranker {
    client: reqwest::Client,
    url: String,
}

impl HttpReranker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RerankError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("auroraseek/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>, RerankError> {
        let body = RerankRequest { query: query.to_string(), candidates: candidates.to_vec() };
        let resp = self.client.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(RerankError::Status(resp.status().as_u16()));
        }
        let out: RerankResponse = resp.json().await?;
        if out.order.is_empty() {
            return Err(RerankError::EmptyOrder);
        }
        Ok(out.order)
    }
}

/// In-process bag-of-words reranker: cosine similarity between the query and
/// `title + " " + body`, both split on whitespace and lowercased.
#[derive(Debug, Default, Clone, Copy)]
pub struct CosineReranker;

impl CosineReranker {
    pub fn order(&self, query: &str, candidates: &[RerankCandidate]) -> Vec<String> {
        let qv = embed(query);
        let mut scored: Vec<(&str, f64)> = candidates
            .iter()
            .map(|c| (c.id.as_str(), cosine(&qv, &embed(&format!("{} {}", c.title, c.body)))))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().map(|(id, _)| id.to_string()).collect()
    }
}

#[async_trait]
impl Reranker for CosineReranker {
    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>, RerankError> {
        Ok(self.order(query, candidates))
    }
}

fn embed(text: &str) -> HashMap<String, f64> {
    let mut v: HashMap<String, f64> = HashMap::new();
    for tok in text.split_whitespace() {
        *v.entry(tok.to_lowercase()).or_insert(0.0) += 1.0;
    }
    let norm = v.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm = if norm == 0.0 { 1.0 } else { norm };
    for x in v.values_mut() {
        *x /= norm;
    }
    v
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    a.iter().filter_map(|(k, x)| b.get(k).map(|y| x * y)).sum()
}
