//! Live in-memory inverted index.
//!
//! All maps sit behind one `RwLock`. Writers tokenize before taking the lock
//! and hold it only for the map updates; `snapshot` and `candidates` are
//! independent read acquisitions, so a document added between the two calls of
//! one query may be visible to one and not the other.

use crate::config::EMPTY_INDEX_AVG_DOC_LEN;
use crate::document::Document;
use crate::ingest::Page;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Corpus statistics copied out of the index at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub num_docs: usize,
    /// total tokens / num_docs, or 1.0 for an empty index
    pub avg_doc_len: f64,
    /// term -> number of distinct documents containing it
    pub doc_freqs: HashMap<String, u32>,
}

impl IndexSnapshot {
    /// Document frequency of `term`; 0 when the snapshot has never seen it.
    pub fn df(&self, term: &str) -> u32 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct IndexState {
    docs: HashMap<String, Arc<Document>>,
    /// term -> doc id -> tf
    postings: HashMap<String, HashMap<String, u32>>,
    doc_freqs: HashMap<String, u32>,
    total_length: u64,
}

impl IndexState {
    fn insert(&mut self, doc: Arc<Document>) {
        if let Some(previous) = self.docs.remove(&doc.id) {
            self.retract(&previous);
        }
        self.total_length += u64::from(doc.length);
        for (term, &tf) in &doc.term_freqs {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
            self.postings.entry(term.clone()).or_default().insert(doc.id.clone(), tf);
        }
        self.docs.insert(doc.id.clone(), doc);
    }

    /// Undo everything `insert` recorded for `doc`.
    fn retract(&mut self, doc: &Document) {
        self.total_length -= u64::from(doc.length);
        for term in doc.term_freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
            if let Some(plist) = self.postings.get_mut(term) {
                plist.remove(&doc.id);
                if plist.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }
}

/// Shared, concurrently readable inverted index.
///
/// Re-adding an existing id replaces the earlier document: its length and
/// term statistics are subtracted before the new version is counted, so
/// `num_docs` is always the number of distinct ids.
#[derive(Default)]
pub struct InvertedIndex {
    state: RwLock<IndexState>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&self, id: &str, url: &str, title: &str, body: &str) {
        let doc = Arc::new(Document::new(id, url, title, body));
        let (terms, length) = (doc.term_freqs.len(), doc.length);
        let replaced = {
            let mut state = self.state.write();
            let replaced = state.docs.contains_key(id);
            state.insert(doc);
            replaced
        };
        tracing::debug!(id, terms, length, replaced, "indexed document");
    }

    pub fn add_page(&self, page: &Page) {
        self.add_document(&page.id, &page.url, &page.title, &page.body);
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read();
        let num_docs = state.docs.len();
        if num_docs == 0 {
            return IndexSnapshot {
                num_docs: 0,
                avg_doc_len: EMPTY_INDEX_AVG_DOC_LEN,
                doc_freqs: HashMap::new(),
            };
        }
        IndexSnapshot {
            num_docs,
            avg_doc_len: state.total_length as f64 / num_docs as f64,
            doc_freqs: state.doc_freqs.clone(),
        }
    }

    /// Every document containing at least one of `terms`, each once, in order
    /// of the first query term that reaches it.
    pub fn candidates(&self, terms: &[String]) -> Vec<Arc<Document>> {
        let state = self.state.read();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for term in terms {
            let Some(plist) = state.postings.get(term) else { continue };
            for doc_id in plist.keys() {
                if seen.insert(doc_id.as_str()) {
                    if let Some(doc) = state.docs.get(doc_id) {
                        out.push(Arc::clone(doc));
                    }
                }
            }
        }
        out
    }

    pub fn get(&self, id: &str) -> Option<Arc<Document>> {
        self.state.read().docs.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
