//! In-memory knowledge store with type lookup and keyword search.

use std::collections::HashMap;
use std::sync::Arc;

use negotiator_types::{DocumentChunk, NegotiatorError, Result};

// ---------------------------------------------------------------------------
// Information need keywords
// ---------------------------------------------------------------------------

/// Static map from a named information need to the keywords that satisfy it.
const NEED_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "submission.risk_profile",
        &["risk", "profile", "high-risk", "facility", "flood zone"],
    ),
    (
        "submission.premium_structure",
        &["premium", "payment", "terms"],
    ),
    ("submission.deductible", &["deductible", "adjustment"]),
    ("submission.coverage_terms", &["coverage", "limit"]),
    (
        "client_history.prior_negotiations",
        &["negotiation", "strategy"],
    ),
];

/// Keywords searched for `query`.
///
/// Known information needs map through the keyword table; any other query is
/// split into lowercase whitespace tokens.
pub fn keywords_for(query: &str) -> Vec<String> {
    match NEED_KEYWORDS.iter().find(|(need, _)| *need == query) {
        Some((_, keywords)) => keywords.iter().map(|k| k.to_string()).collect(),
        None => query
            .split_whitespace()
            .map(|token| token.to_lowercase())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// KnowledgeStore
// ---------------------------------------------------------------------------

/// Ordered collection of knowledge chunks, indexed by chunk id.
///
/// Chunks are handed out as `Arc`s so downstream records reference the stored
/// chunk rather than copying it. Mutation takes `&mut self`; share a populated
/// store across runs behind an `Arc`.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    chunks: Vec<Arc<DocumentChunk>>,
    index: HashMap<String, usize>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with a handful of general negotiation guidelines.
    pub fn with_samples() -> Self {
        let mut store = Self::new();
        store.add(sample_chunks());
        store
    }

    /// Add chunks in order. A chunk whose id already exists replaces the old
    /// one in place, keeping its position.
    pub fn add(&mut self, chunks: impl IntoIterator<Item = DocumentChunk>) {
        for chunk in chunks {
            match self.index.get(&chunk.chunk_id) {
                Some(&pos) => {
                    tracing::debug!(chunk_id = %chunk.chunk_id, "replacing knowledge chunk");
                    self.chunks[pos] = Arc::new(chunk);
                }
                None => {
                    self.index.insert(chunk.chunk_id.clone(), self.chunks.len());
                    self.chunks.push(Arc::new(chunk));
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Arc<DocumentChunk>> {
        self.index.get(chunk_id).map(|&pos| &self.chunks[pos])
    }

    pub fn chunks(&self) -> &[Arc<DocumentChunk>] {
        &self.chunks
    }

    /// Document types carried by at least one chunk, in first-seen order.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for doc_type in self.chunks.iter().filter_map(|c| c.document_type()) {
            if !types.iter().any(|t| t == doc_type) {
                types.push(doc_type.to_string());
            }
        }
        types
    }

    /// All chunks tagged with `document_type`, in insertion order.
    pub fn get_by_type(&self, document_type: &str) -> Result<Vec<Arc<DocumentChunk>>> {
        let matches: Vec<_> = self
            .chunks
            .iter()
            .filter(|c| c.document_type() == Some(document_type))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(NegotiatorError::KnowledgeTypeNotFound {
                document_type: document_type.to_string(),
            });
        }
        Ok(matches)
    }

    /// Chunks whose text contains any keyword for `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<Arc<DocumentChunk>> {
        let keywords = keywords_for(query);
        if keywords.is_empty() {
            return Vec::new();
        }
        self.chunks
            .iter()
            .filter(|chunk| {
                let text = chunk.text.to_lowercase();
                keywords.iter().any(|k| text.contains(k.as_str()))
            })
            .cloned()
            .collect()
    }
}

/// General-purpose guideline chunks used to seed a store when no documents
/// are loaded.
pub fn sample_chunks() -> Vec<DocumentChunk> {
    vec![
        DocumentChunk::new(
            "sample_1",
            "Premium objections can be addressed by adjusting deductibles or payment terms.",
            "sample_doc",
            "negotiation_strategy",
        ),
        DocumentChunk::new(
            "sample_2",
            "Manufacturing facilities typically require higher coverage limits.",
            "sample_doc",
            "risk_guidelines",
        ),
        DocumentChunk::new(
            "sample_3",
            "Quarterly payments are preferred for premium amounts over $100K.",
            "sample_doc",
            "payment_guidelines",
        ),
        DocumentChunk::new(
            "sample_4",
            "Deductible adjustments should be proportional to premium changes.",
            "sample_doc",
            "negotiation_strategy",
        ),
        DocumentChunk::new(
            "sample_5",
            "Medium-risk facilities should maintain minimum $100K deductible.",
            "sample_doc",
            "risk_guidelines",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
