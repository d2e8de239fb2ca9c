//! Query execution: BM25 over the candidate set, an optional rerank of the
//! head, and the merge of the two orders.
//!
//! Candidates and statistics come from two separate read locks. A document
//! indexed in between can show up as a candidate whose terms the snapshot does
//! not count yet (or the reverse); results converge on the next query. No lock
//! is held while the reranker runs.

use crate::bm25::{Bm25, Bm25Params, Scorer};
use crate::config::{DEFAULT_RERANK_TIMEOUT_MS, MIN_RERANK_WINDOW, RESULT_BODY_BYTES};
use crate::document::Document;
use crate::index::InvertedIndex;
use crate::rerank::{RerankCandidate, RerankError, Reranker};
use crate::tokenizer::tokenize;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
    pub min_rerank_window: usize,
    pub rerank_timeout: Duration,
    pub preview_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            min_rerank_window: MIN_RERANK_WINDOW,
            rerank_timeout: Duration::from_millis(DEFAULT_RERANK_TIMEOUT_MS),
            preview_bytes: RESULT_BODY_BYTES,
        }
    }
}

/// A candidate with its BM25 score.
#[derive(Debug, Clone)]
pub struct Scored {
    pub doc: Arc<Document>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// candidates matched before truncation to `k`
    pub total_hits: usize,
    pub reranked: bool,
}

pub struct QueryEngine {
    index: Arc<InvertedIndex>,
    reranker: Arc<dyn Reranker>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(index: Arc<InvertedIndex>, reranker: Arc<dyn Reranker>, config: EngineConfig) -> Self {
        Self { index, reranker, config }
    }

    pub fn index(&self) -> &Arc<InvertedIndex> {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Top `k` documents for `query`. Never fails; an unusable reranker only
    /// costs the second-stage reorder.
    pub async fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        self.search_detailed(query, k).await.hits
    }

    pub async fn search_detailed(&self, query: &str, k: usize) -> SearchOutcome {
        let terms = tokenize(query);
        if terms.is_empty() || k == 0 {
            return SearchOutcome { hits: vec![], total_hits: 0, reranked: false };
        }

        let candidates = self.index.candidates(&terms);
        let snapshot = self.index.snapshot();
        let scorer = Bm25::new(snapshot, self.config.bm25);
        let ranked = rank_candidates(&scorer, candidates, &terms);
        let total_hits = ranked.len();
        if ranked.is_empty() {
            return SearchOutcome { hits: vec![], total_hits: 0, reranked: false };
        }

        let window = rerank_window(ranked.len(), k, self.config.min_rerank_window);
        let records: Vec<RerankCandidate> = ranked[..window]
            .iter()
            .map(|s| RerankCandidate { id: s.doc.id.clone(), title: s.doc.title.clone(), body: s.doc.body.clone() })
            .collect();

        let answer = self.call_reranker(query, &records).await;
        let (order, from_reranker) = match answer {
            Ok(order) => (order, true),
            Err(err) => {
                tracing::warn!(%err, window, "rerank unavailable, keeping BM25 order");
                (records.into_iter().map(|r| r.id).collect(), false)
            }
        };

        let (merged, accepted) = merge_order(ranked, &order, window);
        // an order naming no id from the window leaves BM25 order in place
        let reranked = from_reranker && accepted > 0;
        if from_reranker && accepted == 0 {
            tracing::warn!(window, "rerank order matched no candidate, keeping BM25 order");
        }
        let hits = merged
            .into_iter()
            .take(k)
            .map(|s| SearchHit {
                id: s.doc.id.clone(),
                url: s.doc.url.clone(),
                title: s.doc.title.clone(),
                body: s.doc.preview(self.config.preview_bytes).to_string(),
                score: s.score,
            })
            .collect();
        SearchOutcome { hits, total_hits, reranked }
    }

    async fn call_reranker(&self, query: &str, records: &[RerankCandidate]) -> Result<Vec<String>, RerankError> {
        let timeout = self.config.rerank_timeout;
        let order = tokio::time::timeout(timeout, self.reranker.rerank(query, records))
            .await
            .map_err(|_| RerankError::Timeout(timeout))??;
        if order.is_empty() {
            return Err(RerankError::EmptyOrder);
        }
        Ok(order)
    }
}

/// Score every candidate and sort by score descending, document id ascending
/// on exact ties.
pub fn rank_candidates<S: Scorer>(scorer: &S, candidates: Vec<Arc<Document>>, terms: &[String]) -> Vec<Scored> {
    let mut list: Vec<Scored> = candidates
        .into_iter()
        .map(|doc| {
            let score = scorer.score(&doc, terms);
            Scored { doc, score }
        })
        .collect();
    list.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc.id.cmp(&b.doc.id))
    });
    list
}

/// Number of head candidates handed to the reranker.
pub fn rerank_window(candidates: usize, k: usize, min_window: usize) -> usize {
    candidates.min(min_window.max(k))
}

/// Reorder `ranked` (BM25 order) by the reranker's `order`.
///
/// Only ids from the first `window` entries of `ranked` count, each at its
/// first occurrence; the i-th accepted id weighs `window - i`. Everything else
/// weighs 0. The sort is by weight, then BM25 score, and is stable so exact
/// ties keep their BM25 position.
///
/// Also returns how many ids from `order` were accepted.
pub fn merge_order(mut ranked: Vec<Scored>, order: &[String], window: usize) -> (Vec<Scored>, usize) {
    let window = window.min(ranked.len());
    let mut weights: HashMap<String, usize> =
        ranked[..window].iter().map(|s| (s.doc.id.clone(), 0)).collect();
    let mut position = 0;
    for id in order {
        if let Some(w) = weights.get_mut(id) {
            if *w == 0 {
                *w = window - position;
                position += 1;
            }
        }
    }
    let weight_of = |s: &Scored| weights.get(&s.doc.id).copied().unwrap_or(0);
    ranked.sort_by(|a, b| {
        weight_of(b)
            .cmp(&weight_of(a))
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
    });
    (ranked, position)
}
