//! Compile-time defaults for ranking and result shaping.
//!
//! Runtime overrides come from the server's CLI flags and environment; these
//! values are what an unconfigured engine uses.

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.2;

/// BM25 document-length normalization.
pub const BM25_B: f64 = 0.75;

/// Smallest number of BM25 head candidates handed to the reranker.
///
/// The actual window is `min(candidates, max(MIN_RERANK_WINDOW, k))`.
pub const MIN_RERANK_WINDOW: usize = 20;

/// Byte limit applied to document bodies in search results.
pub const RESULT_BODY_BYTES: usize = 512;

/// Upper bound on a single reranker round trip.
pub const DEFAULT_RERANK_TIMEOUT_MS: u64 = 2_000;

/// Largest `k` the HTTP surface accepts; larger values are clamped.
pub const MAX_K: usize = 1_000;

/// Average document length reported for an empty index.
pub const EMPTY_INDEX_AVG_DOC_LEN: f64 = 1.0;
