use crate::config::{BM25_B, BM25_K1};
use crate::document::Document;
use crate::index::IndexSnapshot;

/// Ranks one document against the query terms. Higher is better.
pub trait Scorer {
    fn score(&self, doc: &Document, terms: &[String]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, b: BM25_B }
    }
}

/// Okapi BM25 over a statistics snapshot.
#[derive(Debug, Clone)]
pub struct Bm25 {
    snapshot: IndexSnapshot,
    params: Bm25Params,
}

impl Bm25 {
    pub fn new(snapshot: IndexSnapshot, params: Bm25Params) -> Self {
        Self { snapshot, params }
    }

    /// `ln((N - df + 0.5) / (df + 0.5) + 1)`; a term the snapshot has not
    /// seen has df = 0.
    pub fn idf(&self, term: &str) -> f64 {
        let n = self.snapshot.num_docs as f64;
        let df = f64::from(self.snapshot.df(term));
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Scorer for Bm25 {
    fn score(&self, doc: &Document, terms: &[String]) -> f64 {
        let Bm25Params { k1, b } = self.params;
        let dl = f64::from(doc.length);
        let norm = k1 * (1.0 - b + b * dl / self.snapshot.avg_doc_len);
        let mut score = 0.0;
        for term in terms {
            let tf = f64::from(doc.tf(term));
            if tf == 0.0 {
                continue;
            }
            score += self.idf(term) * (tf * (k1 + 1.0)) / (tf + norm);
        }
        score
    }
}
