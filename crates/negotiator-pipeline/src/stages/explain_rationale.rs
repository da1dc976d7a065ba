use std::sync::Arc;

use async_trait::async_trait;

use negotiator_llm::TextGenerator;
use negotiator_types::{
    DecisionBasis, NegotiationStrategy, PipelineState, Result, StateField, StateUpdate,
    StrategyRationale, StrategyRecommendation,
};

use super::{generate_record, require};
use crate::prompts;
use crate::stage::{Stage, StageContract, StageOutput};

/// Explains the strategy and records a deterministic reasoning trail.
pub struct ExplainRationale {
    generator: Arc<dyn TextGenerator>,
}

impl ExplainRationale {
    pub const NAME: &'static str = "explain_rationale";

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Reasoning steps derived from the strategy and the triggered rules alone.
///
/// The same strategy and decisions always produce the same steps, whatever
/// the generated rationale says.
pub fn reasoning_steps(
    strategy: &NegotiationStrategy,
    decisions: Option<&[DecisionBasis]>,
) -> Vec<String> {
    let mut steps = vec![format!(
        "Proposed strategy: {} conservative, {} moderate and {} aggressive recommendations",
        strategy.conservative.len(),
        strategy.moderate.len(),
        strategy.aggressive.len()
    )];

    let levels: [(&str, &[StrategyRecommendation]); 3] = [
        ("Conservative", strategy.conservative.as_slice()),
        ("Moderate", strategy.moderate.as_slice()),
        ("Aggressive", strategy.aggressive.as_slice()),
    ];
    for (level, recommendations) in levels {
        for rec in recommendations.iter().filter(|r| !r.recommendation.is_empty()) {
            steps.push(format!("{level}: {}", rec.recommendation));
        }
    }

    match decisions.filter(|d| !d.is_empty()) {
        Some(decisions) => {
            steps.push("Decision basis:".into());
            steps.extend(decisions.iter().map(|d| {
                format!(
                    "{}: {} (Confidence: {})",
                    d.heuristic, d.justification, d.confidence
                )
            }));
        }
        None => steps.push("No specific decision rules were triggered.".into()),
    }
    steps
}

#[async_trait]
impl Stage for ExplainRationale {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::ContextSummary, StateField::Strategy],
            optional: &[
                StateField::DecisionBasis,
                StateField::RelevantDomainKnowledge,
            ],
            owns: &[StateField::Rationale, StateField::ReasoningSteps],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let summary = require(state.context_summary(), StateField::ContextSummary, Self::NAME)?;
        let strategy = require(state.strategy(), StateField::Strategy, Self::NAME)?;
        let decisions = state.decision_basis();

        let prompt =
            prompts::rationale(summary, strategy, decisions, state.relevant_domain_knowledge())?;
        let report =
            generate_record::<StrategyRationale>(self.generator.as_ref(), Self::NAME, &prompt, &[])
                .await?;

        let steps = reasoning_steps(strategy, decisions);
        let metrics = report.metrics();
        let rationale = report.value;
        Ok(StageOutput::new()
            .metrics(metrics)
            .metric("decision_factors", rationale.decision_factors.len())
            .metric("reasoning_steps", steps.len())
            .update(StateUpdate::Rationale(rationale))
            .update(StateUpdate::ReasoningSteps(steps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use negotiator_types::Confidence;

    fn rec(text: &str) -> StrategyRecommendation {
        StrategyRecommendation {
            recommendation: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn steps_cover_strategy_and_decisions() {
        let strategy = NegotiationStrategy {
            conservative: vec![rec("Hold premium at $250K")],
            moderate: vec![rec("Trade $25K premium for $150K deductible"), rec("")],
            aggressive: vec![],
            ..Default::default()
        };
        let decisions = vec![DecisionBasis::new(
            "Premium Objection → Deductible Trade",
            "Client objected to premium and has history of accepting deductible adjustments",
            Confidence::High,
        )];
        let steps = reasoning_steps(&strategy, Some(decisions.as_slice()));
        assert_eq!(
            steps,
            vec![
                "Proposed strategy: 1 conservative, 2 moderate and 0 aggressive recommendations",
                "Conservative: Hold premium at $250K",
                "Moderate: Trade $25K premium for $150K deductible",
                "Decision basis:",
                "Premium Objection → Deductible Trade: Client objected to premium and has history of accepting deductible adjustments (Confidence: High)",
            ]
        );
    }

    #[test]
    fn steps_note_when_no_rules_fired() {
        let steps = reasoning_steps(&NegotiationStrategy::default(), Some(&[][..]));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1], "No specific decision rules were triggered.");
        assert_eq!(reasoning_steps(&NegotiationStrategy::default(), None), steps);
    }
}
