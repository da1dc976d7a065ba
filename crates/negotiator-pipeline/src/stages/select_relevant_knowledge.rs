use std::sync::Arc;

use async_trait::async_trait;

use negotiator_llm::TextGenerator;
use negotiator_types::{DomainKnowledgeItem, PipelineState, Result, StateField, StateUpdate};

use super::{generate_record, require};
use crate::prompts;
use crate::stage::{Stage, StageContract, StageOutput};

/// Narrows the fetched knowledge to the chunks that bear on this deal.
pub struct SelectRelevantKnowledge {
    generator: Arc<dyn TextGenerator>,
}

impl SelectRelevantKnowledge {
    pub const NAME: &'static str = "select_relevant_knowledge";

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for SelectRelevantKnowledge {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::ContextSummary, StateField::DomainKnowledge],
            optional: &[],
            owns: &[StateField::RelevantDomainKnowledge],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let summary = require(state.context_summary(), StateField::ContextSummary, Self::NAME)?;
        let knowledge = require(state.domain_knowledge(), StateField::DomainKnowledge, Self::NAME)?;

        let prompt = prompts::select_knowledge(summary, knowledge)?;
        let report = generate_record::<Vec<DomainKnowledgeItem>>(
            self.generator.as_ref(),
            Self::NAME,
            &prompt,
            knowledge,
        )
        .await?;

        let metrics = report.metrics();
        let selected = report.value;
        tracing::info!(selected = selected.len(), available = knowledge.len(), "selected knowledge");
        Ok(StageOutput::new()
            .metrics(metrics)
            .metric("selected_chunks", selected.len())
            .update(StateUpdate::RelevantDomainKnowledge(selected)))
    }
}
