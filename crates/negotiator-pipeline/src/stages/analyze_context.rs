use std::sync::Arc;

use async_trait::async_trait;

use negotiator_llm::TextGenerator;
use negotiator_types::{ContextSummary, PipelineState, Result, StateField, StateUpdate};

use super::{generate_record, require};
use crate::prompts;
use crate::stage::{Stage, StageContract, StageOutput};

/// Summarizes the deal, client and negotiation history into a [`ContextSummary`].
pub struct AnalyzeContext {
    generator: Arc<dyn TextGenerator>,
}

impl AnalyzeContext {
    pub const NAME: &'static str = "analyze_context";

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for AnalyzeContext {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::DealContext, StateField::DomainKnowledge],
            optional: &[StateField::SubmissionFiles],
            owns: &[StateField::ContextSummary],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let deal = require(state.deal_context(), StateField::DealContext, Self::NAME)?;
        let knowledge = require(state.domain_knowledge(), StateField::DomainKnowledge, Self::NAME)?;

        let prompt = prompts::analyze_context(deal, knowledge, state.submission_files())?;
        let report =
            generate_record::<ContextSummary>(self.generator.as_ref(), Self::NAME, &prompt, knowledge)
                .await?;

        let metrics = report.metrics();
        let summary = report.value;
        Ok(StageOutput::new()
            .metrics(metrics)
            .metric("key_insights", summary.key_insights.len())
            .metric("cited_chunks", summary.relevant_domain_knowledge.len())
            .update(StateUpdate::ContextSummary(summary)))
    }
}
