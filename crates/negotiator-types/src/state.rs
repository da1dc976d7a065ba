use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::{
    ContextSummary, DealContext, DecisionBasis, DocumentChunk, DomainKnowledgeItem,
    InformationGap, NegotiationStrategy, NegotiatorError, Result, StrategyRationale,
};

// ---------------------------------------------------------------------------
// StateField
// ---------------------------------------------------------------------------

/// Names of every member of [`PipelineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateField {
    DealId,
    SubmissionId,
    DealContext,
    SubmissionFiles,
    DomainKnowledge,
    ContextSummary,
    RelevantDomainKnowledge,
    InformationGaps,
    DecisionBasis,
    Strategy,
    Rationale,
    ReasoningSteps,
}

impl StateField {
    /// Fields supplied by the caller when the state is created.
    pub const INPUTS: &'static [StateField] = &[StateField::DealId, StateField::SubmissionId];

    pub const ALL: &'static [StateField] = &[
        StateField::DealId,
        StateField::SubmissionId,
        StateField::DealContext,
        StateField::SubmissionFiles,
        StateField::DomainKnowledge,
        StateField::ContextSummary,
        StateField::RelevantDomainKnowledge,
        StateField::InformationGaps,
        StateField::DecisionBasis,
        StateField::Strategy,
        StateField::Rationale,
        StateField::ReasoningSteps,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::DealId => "deal_id",
            StateField::SubmissionId => "submission_id",
            StateField::DealContext => "deal_context",
            StateField::SubmissionFiles => "submission_files",
            StateField::DomainKnowledge => "domain_knowledge",
            StateField::ContextSummary => "context_summary",
            StateField::RelevantDomainKnowledge => "relevant_domain_knowledge",
            StateField::InformationGaps => "information_gaps",
            StateField::DecisionBasis => "decision_basis",
            StateField::Strategy => "strategy",
            StateField::Rationale => "rationale",
            StateField::ReasoningSteps => "reasoning_steps",
        }
    }

    pub fn is_input(&self) -> bool {
        Self::INPUTS.contains(self)
    }

    /// The error a stage reports when this field is required but absent.
    pub fn missing(&self, stage: &str) -> NegotiatorError {
        NegotiatorError::MissingField {
            stage: stage.to_string(),
            field: self.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// A single write produced by a stage. One variant per stage-owned field.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    DealContext(Arc<DealContext>),
    SubmissionFiles(BTreeMap<String, String>),
    DomainKnowledge(Vec<Arc<DocumentChunk>>),
    ContextSummary(ContextSummary),
    RelevantDomainKnowledge(Vec<DomainKnowledgeItem>),
    InformationGaps(Vec<InformationGap>),
    DecisionBasis(Vec<DecisionBasis>),
    Strategy(NegotiationStrategy),
    Rationale(StrategyRationale),
    ReasoningSteps(Vec<String>),
}

impl StateUpdate {
    pub fn field(&self) -> StateField {
        match self {
            StateUpdate::DealContext(_) => StateField::DealContext,
            StateUpdate::SubmissionFiles(_) => StateField::SubmissionFiles,
            StateUpdate::DomainKnowledge(_) => StateField::DomainKnowledge,
            StateUpdate::ContextSummary(_) => StateField::ContextSummary,
            StateUpdate::RelevantDomainKnowledge(_) => StateField::RelevantDomainKnowledge,
            StateUpdate::InformationGaps(_) => StateField::InformationGaps,
            StateUpdate::DecisionBasis(_) => StateField::DecisionBasis,
            StateUpdate::Strategy(_) => StateField::Strategy,
            StateUpdate::Rationale(_) => StateField::Rationale,
            StateUpdate::ReasoningSteps(_) => StateField::ReasoningSteps,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// State threaded through one pipeline run.
///
/// Apart from the inputs, every member starts unset and is written exactly
/// once, by the stage that owns it, through [`PipelineState::apply`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineState {
    deal_id: String,
    submission_id: Option<String>,
    deal_context: Option<Arc<DealContext>>,
    submission_files: Option<BTreeMap<String, String>>,
    domain_knowledge: Option<Vec<Arc<DocumentChunk>>>,
    context_summary: Option<ContextSummary>,
    relevant_domain_knowledge: Option<Vec<DomainKnowledgeItem>>,
    information_gaps: Option<Vec<InformationGap>>,
    decision_basis: Option<Vec<DecisionBasis>>,
    strategy: Option<NegotiationStrategy>,
    rationale: Option<StrategyRationale>,
    reasoning_steps: Option<Vec<String>>,
}

impl PipelineState {
    pub fn new(deal_id: impl Into<String>, submission_id: Option<String>) -> Self {
        Self {
            deal_id: deal_id.into(),
            submission_id,
            ..Default::default()
        }
    }

    pub fn deal_id(&self) -> &str {
        &self.deal_id
    }

    pub fn submission_id(&self) -> Option<&str> {
        self.submission_id.as_deref()
    }

    pub fn deal_context(&self) -> Option<&Arc<DealContext>> {
        self.deal_context.as_ref()
    }

    pub fn submission_files(&self) -> Option<&BTreeMap<String, String>> {
        self.submission_files.as_ref()
    }

    pub fn domain_knowledge(&self) -> Option<&[Arc<DocumentChunk>]> {
        self.domain_knowledge.as_deref()
    }

    pub fn context_summary(&self) -> Option<&ContextSummary> {
        self.context_summary.as_ref()
    }

    pub fn relevant_domain_knowledge(&self) -> Option<&[DomainKnowledgeItem]> {
        self.relevant_domain_knowledge.as_deref()
    }

    pub fn information_gaps(&self) -> Option<&[InformationGap]> {
        self.information_gaps.as_deref()
    }

    pub fn decision_basis(&self) -> Option<&[DecisionBasis]> {
        self.decision_basis.as_deref()
    }

    pub fn strategy(&self) -> Option<&NegotiationStrategy> {
        self.strategy.as_ref()
    }

    pub fn rationale(&self) -> Option<&StrategyRationale> {
        self.rationale.as_ref()
    }

    pub fn reasoning_steps(&self) -> Option<&[String]> {
        self.reasoning_steps.as_deref()
    }

    /// Whether `field` has been written at all, empty or not.
    pub fn is_written(&self, field: StateField) -> bool {
        match field {
            StateField::DealId => true,
            StateField::SubmissionId => self.submission_id.is_some(),
            StateField::DealContext => self.deal_context.is_some(),
            StateField::SubmissionFiles => self.submission_files.is_some(),
            StateField::DomainKnowledge => self.domain_knowledge.is_some(),
            StateField::ContextSummary => self.context_summary.is_some(),
            StateField::RelevantDomainKnowledge => self.relevant_domain_knowledge.is_some(),
            StateField::InformationGaps => self.information_gaps.is_some(),
            StateField::DecisionBasis => self.decision_basis.is_some(),
            StateField::Strategy => self.strategy.is_some(),
            StateField::Rationale => self.rationale.is_some(),
            StateField::ReasoningSteps => self.reasoning_steps.is_some(),
        }
    }

    /// Whether `field` is written and non-empty.
    ///
    /// Sequences and maps are empty when they have no elements, strings when
    /// they are blank. Structured records are never empty.
    pub fn is_present(&self, field: StateField) -> bool {
        match field {
            StateField::DealId => !self.deal_id.trim().is_empty(),
            StateField::SubmissionId => self
                .submission_id
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty()),
            StateField::SubmissionFiles => {
                self.submission_files.as_ref().is_some_and(|m| !m.is_empty())
            }
            StateField::DomainKnowledge => non_empty(&self.domain_knowledge),
            StateField::RelevantDomainKnowledge => non_empty(&self.relevant_domain_knowledge),
            StateField::InformationGaps => non_empty(&self.information_gaps),
            StateField::DecisionBasis => non_empty(&self.decision_basis),
            StateField::ReasoningSteps => non_empty(&self.reasoning_steps),
            other => self.is_written(other),
        }
    }

    /// Apply one stage write.
    ///
    /// Rejects writes to fields outside `owns` and second writes to any field.
    pub fn apply(&mut self, stage: &str, owns: &[StateField], update: StateUpdate) -> Result<()> {
        let field = update.field();
        if !owns.contains(&field) {
            return Err(NegotiatorError::FieldNotOwned {
                stage: stage.to_string(),
                field: field.as_str().to_string(),
            });
        }
        if self.is_written(field) {
            return Err(NegotiatorError::FieldAlreadyWritten {
                stage: stage.to_string(),
                field: field.as_str().to_string(),
            });
        }

        match update {
            StateUpdate::DealContext(v) => self.deal_context = Some(v),
            StateUpdate::SubmissionFiles(v) => self.submission_files = Some(v),
            StateUpdate::DomainKnowledge(v) => self.domain_knowledge = Some(v),
            StateUpdate::ContextSummary(v) => self.context_summary = Some(v),
            StateUpdate::RelevantDomainKnowledge(v) => self.relevant_domain_knowledge = Some(v),
            StateUpdate::InformationGaps(v) => self.information_gaps = Some(v),
            StateUpdate::DecisionBasis(v) => self.decision_basis = Some(v),
            StateUpdate::Strategy(v) => self.strategy = Some(v),
            StateUpdate::Rationale(v) => self.rationale = Some(v),
            StateUpdate::ReasoningSteps(v) => self.reasoning_steps = Some(v),
        }
        Ok(())
    }

    /// The state as a plain JSON mapping. Unwritten fields are `null`.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn non_empty<T>(value: &Option<Vec<T>>) -> bool {
    value.as_ref().is_some_and(|v| !v.is_empty())
}
