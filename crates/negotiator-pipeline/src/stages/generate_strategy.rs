use std::sync::Arc;

use async_trait::async_trait;

use negotiator_llm::TextGenerator;
use negotiator_types::{NegotiationStrategy, PipelineState, Result, StateField, StateUpdate};

use super::{generate_record, require};
use crate::stage::{Stage, StageContract, StageOutput};
use crate::{heuristics, prompts};

/// Evaluates the heuristic rules, then asks for strategies at three levels
/// with the triggered rules in the prompt.
pub struct GenerateStrategy {
    generator: Arc<dyn TextGenerator>,
}

impl GenerateStrategy {
    pub const NAME: &'static str = "generate_strategy";

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for GenerateStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::DealContext, StateField::ContextSummary],
            optional: &[
                StateField::RelevantDomainKnowledge,
                StateField::InformationGaps,
            ],
            owns: &[StateField::DecisionBasis, StateField::Strategy],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let deal = require(state.deal_context(), StateField::DealContext, Self::NAME)?;
        let summary = require(state.context_summary(), StateField::ContextSummary, Self::NAME)?;

        let decisions = heuristics::evaluate(deal);
        tracing::info!(
            deal_id = %deal.deal_id(),
            decisions = decisions.len(),
            "evaluated negotiation heuristics"
        );

        let prompt = prompts::strategy(
            deal,
            summary,
            state.relevant_domain_knowledge(),
            state.information_gaps(),
            &decisions,
        )?;
        let report =
            generate_record::<NegotiationStrategy>(self.generator.as_ref(), Self::NAME, &prompt, &[])
                .await?;

        let metrics = report.metrics();
        let strategy = report.value;
        let triggered: Vec<String> = decisions.iter().map(|d| d.heuristic.clone()).collect();
        Ok(StageOutput::new()
            .metrics(metrics)
            .metric("decisions_triggered", triggered)
            .metric("conservative_recommendations", strategy.conservative.len())
            .metric("moderate_recommendations", strategy.moderate.len())
            .metric("aggressive_recommendations", strategy.aggressive.len())
            .update(StateUpdate::DecisionBasis(decisions))
            .update(StateUpdate::Strategy(strategy)))
    }
}
