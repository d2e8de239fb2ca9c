//! In-memory full-text ranking: tokenizer, inverted index, BM25 scoring and
//! the query engine that merges BM25 with an optional reranker.

pub mod bm25;
pub mod config;
pub mod document;
pub mod index;
pub mod ingest;
pub mod rerank;
pub mod search;
pub mod tokenizer;

pub use bm25::{Bm25, Bm25Params, Scorer};
pub use document::Document;
pub use index::{IndexSnapshot, InvertedIndex};
pub use ingest::Page;
pub use rerank::{CosineReranker, HttpReranker, NoopReranker, RerankCandidate, RerankError, Reranker};
pub use search::{EngineConfig, QueryEngine, SearchHit, SearchOutcome};
