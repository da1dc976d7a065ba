//! Negotiation reasoning pipeline.
//!
//! A fixed sequence of stages turns a deal id into a negotiation strategy:
//! deal lookup, knowledge retrieval, context analysis, knowledge selection,
//! gap review, heuristic-guided strategy generation and rationale. Generated
//! responses are recovered by [`parse`](crate::parse::parse), which never fails.

pub mod engine;
pub mod events;
pub mod heuristics;
pub mod ingest;
pub mod knowledge;
pub mod parse;
pub mod prompts;
pub mod repository;
pub mod schemas;
pub mod stage;
pub mod stages;
pub mod trace;
pub mod validation;

pub use engine::{NegotiationPipeline, PipelineBuilder, RunOutcome};
pub use events::{EventEmitter, PipelineEvent};
pub use heuristics::{default_heuristics, evaluate, Heuristic};
pub use ingest::{
    document_type_for, load_domain_chunks, load_domain_documents, DocumentProcessor,
    DomainDocument,
};
pub use knowledge::{keywords_for, sample_chunks, KnowledgeStore};
pub use parse::{parse, Container, ParseReport, ParseStatus, ResponseSchema};
pub use repository::{
    load_submission_files, sample_deal_001, sample_deal_123, DealRepository,
    InMemoryDealRepository,
};
pub use stage::{DynStage, Stage, StageContract, StageOutput};
pub use stages::standard_stages;
pub use trace::{load_trace, save_trace, RunTrace, StageTrace, TraceStatus};
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
