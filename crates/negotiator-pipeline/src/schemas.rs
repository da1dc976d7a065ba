//! Response schemas for the generation-backed stages.

use std::sync::Arc;

use serde::Deserialize;

use negotiator_types::{
    ClientSummary, ComparableDealsSummary, ContextSummary, DealSummary, DocumentChunk,
    DomainKnowledgeItem, InformationGap, NegotiationStrategy, NegotiationSummary,
    StrategyRationale,
};

use crate::parse::{Container, ResponseSchema};

// ---------------------------------------------------------------------------
// Knowledge citations
// ---------------------------------------------------------------------------

/// A chunk reference as written by the model: either a bare id or a chunk
/// object carrying one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChunkField {
    Id(String),
    Object { chunk_id: String },
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeCitation {
    #[serde(default)]
    chunk_id: Option<String>,
    #[serde(default)]
    chunk: Option<ChunkField>,
    #[serde(default)]
    relevance_reason: String,
    #[serde(default)]
    application_context: String,
}

impl KnowledgeCitation {
    fn cited_id(&self) -> Option<&str> {
        self.chunk_id.as_deref().or(match &self.chunk {
            Some(ChunkField::Id(id)) | Some(ChunkField::Object { chunk_id: id }) => Some(id.as_str()),
            None => None,
        })
    }
}

/// Resolve citations to stored chunks, keeping order. Unknown or missing ids
/// are returned separately.
fn resolve_citations(
    citations: Vec<KnowledgeCitation>,
    chunks: &[Arc<DocumentChunk>],
) -> (Vec<DomainKnowledgeItem>, Vec<String>) {
    let mut items = Vec::with_capacity(citations.len());
    let mut dropped = Vec::new();
    for citation in citations {
        let Some(id) = citation.cited_id().map(str::to_string) else {
            dropped.push(String::new());
            continue;
        };
        match chunks.iter().find(|c| c.chunk_id == id) {
            Some(chunk) => items.push(DomainKnowledgeItem {
                chunk: Arc::clone(chunk),
                relevance_reason: citation.relevance_reason,
                application_context: citation.application_context,
            }),
            None => dropped.push(id),
        }
    }
    (items, dropped)
}

// ---------------------------------------------------------------------------
// ContextSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ContextSummaryWire {
    deal_summary: DealSummary,
    client_summary: ClientSummary,
    negotiation_context: NegotiationSummary,
    comparable_deals: ComparableDealsSummary,
    #[serde(default)]
    relevant_domain_knowledge: Vec<KnowledgeCitation>,
    #[serde(default)]
    key_insights: Vec<String>,
}

impl ResponseSchema for ContextSummary {
    type Wire = ContextSummaryWire;
    const NAME: &'static str = "context_summary";
    const CONTAINER: Container = Container::Object;
    const REQUIRED_KEYS: &'static [&'static str] = &[
        "deal_summary",
        "client_summary",
        "negotiation_context",
        "comparable_deals",
    ];

    fn resolve(wire: Self::Wire, chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>) {
        let (relevant_domain_knowledge, dropped) =
            resolve_citations(wire.relevant_domain_knowledge, chunks);
        let summary = ContextSummary {
            deal_summary: wire.deal_summary,
            client_summary: wire.client_summary,
            negotiation_context: wire.negotiation_context,
            comparable_deals: wire.comparable_deals,
            relevant_domain_knowledge,
            key_insights: wire.key_insights,
        };
        (summary, dropped)
    }

    fn fallback() -> Self {
        ContextSummary::default()
    }
}

// ---------------------------------------------------------------------------
// Knowledge selection / information gaps
// ---------------------------------------------------------------------------

impl ResponseSchema for Vec<DomainKnowledgeItem> {
    type Wire = Vec<KnowledgeCitation>;
    const NAME: &'static str = "relevant_domain_knowledge";
    const CONTAINER: Container = Container::Array;
    const REQUIRED_KEYS: &'static [&'static str] = &[];
    const WRAPPER_KEY: Option<&'static str> = Some("relevant_domain_knowledge");

    fn resolve(wire: Self::Wire, chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>) {
        resolve_citations(wire, chunks)
    }

    fn fallback() -> Self {
        Vec::new()
    }
}

impl ResponseSchema for Vec<InformationGap> {
    type Wire = Vec<InformationGap>;
    const NAME: &'static str = "information_gaps";
    const CONTAINER: Container = Container::Array;
    const REQUIRED_KEYS: &'static [&'static str] = &["gap_description"];
    const WRAPPER_KEY: Option<&'static str> = Some("information_gaps");

    fn resolve(mut wire: Self::Wire, _chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>) {
        wire.sort_by_key(|gap| gap.priority);
        (wire, Vec::new())
    }

    fn fallback() -> Self {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Strategy / rationale
// ---------------------------------------------------------------------------

impl ResponseSchema for NegotiationStrategy {
    type Wire = NegotiationStrategy;
    const NAME: &'static str = "strategy";
    const CONTAINER: Container = Container::Object;
    const REQUIRED_KEYS: &'static [&'static str] = &["conservative", "moderate", "aggressive"];

    fn resolve(wire: Self::Wire, _chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>) {
        (wire, Vec::new())
    }

    fn fallback() -> Self {
        NegotiationStrategy::default()
    }
}

impl ResponseSchema for StrategyRationale {
    type Wire = StrategyRationale;
    const NAME: &'static str = "rationale";
    const CONTAINER: Container = Container::Object;
    const REQUIRED_KEYS: &'static [&'static str] = &[
        "conservative_rationale",
        "moderate_rationale",
        "aggressive_rationale",
    ];

    fn resolve(wire: Self::Wire, _chunks: &[Arc<DocumentChunk>]) -> (Self, Vec<String>) {
        (wire, Vec::new())
    }

    fn fallback() -> Self {
        StrategyRationale::default()
    }
}
