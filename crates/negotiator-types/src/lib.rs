//! Shared types, errors, deal model, and pipeline state for the negotiation pipeline.
//!
//! This crate provides the foundational types used across all other crates:
//! - `NegotiatorError`: unified error taxonomy
//! - `DealContext`: the read-only deal record that seeds a run
//! - `DocumentChunk`: an immutable unit of domain knowledge
//! - output records (`ContextSummary`, `NegotiationStrategy`, ...) with shape-valid defaults
//! - `PipelineState`: the write-once state threaded through the stages

mod deal;
mod knowledge;
mod records;
mod state;

pub use deal::{
    ClientHistory, ComparableDealReference, DealContext, NegotiationContext, SubmissionDetails,
};
pub use knowledge::{DocumentChunk, DocumentType, DOCUMENT_TYPE_KEY};
pub use records::{
    ClientSummary, ComparableDeal, ComparableDealsSummary, Confidence, ContextSummary,
    DealSummary, DecisionBasis, DomainKnowledgeItem, InformationGap, NegotiationStrategy,
    NegotiationSummary, QuoteConstraints, StrategyRationale, StrategyRecommendation,
};
pub use state::{PipelineState, StateField, StateUpdate};

/// Unified error type for all negotiator subsystems.
#[derive(Debug, thiserror::Error)]
pub enum NegotiatorError {
    // === Generation Provider Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthError { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    // === Lookup Errors ===
    #[error("Deal '{deal_id}' not found")]
    DealNotFound { deal_id: String },

    #[error("No knowledge registered for document type '{document_type}'")]
    KnowledgeTypeNotFound { document_type: String },

    #[error("Invalid submission id '{submission_id}': must be a single directory name")]
    InvalidSubmissionId { submission_id: String },

    // === Pipeline Errors ===
    #[error("Stage '{stage}' requires field '{field}', which is missing or empty")]
    MissingField { stage: String, field: String },

    #[error("Stage '{stage}' attempted to rewrite field '{field}'")]
    FieldAlreadyWritten { stage: String, field: String },

    #[error("Stage '{stage}' does not own field '{field}'")]
    FieldNotOwned { stage: String, field: String },

    #[error("Pipeline validation failed: {0}")]
    ValidationError(String),

    #[error("Stage '{stage}' failed: {message}")]
    StageError { stage: String, message: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl NegotiatorError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NegotiatorError::RateLimited { .. }
                | NegotiatorError::RequestTimeout { .. }
                | NegotiatorError::ProviderError { retryable: true, .. }
        )
    }

    /// Returns `true` for lookup failures (unknown deal or knowledge type).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            NegotiatorError::DealNotFound { .. } | NegotiatorError::KnowledgeTypeNotFound { .. }
        )
    }

    /// Maps the error to an HTTP status code for a presentation layer.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            NegotiatorError::DealNotFound { .. }
            | NegotiatorError::KnowledgeTypeNotFound { .. } => Some(404),
            NegotiatorError::MissingField { .. } => Some(422),
            NegotiatorError::RateLimited { .. } => Some(429),
            NegotiatorError::AuthError { .. } => Some(401),
            NegotiatorError::ProviderError { status, .. } if *status != 0 => Some(*status),
            NegotiatorError::RequestTimeout { .. } => Some(504),
            NegotiatorError::ValidationError(_) | NegotiatorError::InvalidSubmissionId { .. } => {
                Some(400)
            }
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, NegotiatorError>`.
pub type Result<T> = std::result::Result<T, NegotiatorError>;
