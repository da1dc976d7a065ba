//! Canned responses for `--dry-run`, routed by prompt heading.

use negotiator_llm::RoutedGenerator;
use negotiator_pipeline::prompts;

const CONTEXT_SUMMARY: &str = r#"{
  "deal_summary": {
    "coverage_terms": "(dry run) coverage terms as submitted",
    "risk_profile": "(dry run) risk profile as submitted",
    "key_risk_factors": []
  },
  "client_summary": {"relationship_duration": "(dry run)", "payment_history": "(dry run)"},
  "negotiation_context": {"current_objections": []},
  "comparable_deals": {"similar_deals": []},
  "relevant_domain_knowledge": [],
  "key_insights": ["Dry run: no model was called"]
}"#;

const SELECTION: &str = r#"[]"#;

const GAPS: &str = r#"[
  {"gap_description": "Dry run: gaps are not assessed offline", "recommended_action": "Run with a model", "priority": 3}
]"#;

const STRATEGY: &str = r#"{
  "conservative": [{"recommendation": "Dry run: hold current terms", "confidence_level": "Low"}],
  "moderate": [],
  "aggressive": [],
  "quote_constraints": {"MFP": null, "RTP": null, "WAP": null}
}"#;

const RATIONALE: &str = r#"{
  "conservative_rationale": "Dry run: no rationale generated.",
  "moderate_rationale": "",
  "aggressive_rationale": "",
  "decision_factors": []
}"#;

/// A generator that answers each pipeline prompt with a fixed, well-formed
/// record and anything else with an empty object.
pub fn generator() -> RoutedGenerator {
    RoutedGenerator::new("{}")
        .route(prompts::ANALYZE_CONTEXT_HEADING, CONTEXT_SUMMARY)
        .route(prompts::SELECT_KNOWLEDGE_HEADING, SELECTION)
        .route(prompts::INFORMATION_GAPS_HEADING, GAPS)
        .route(prompts::STRATEGY_HEADING, STRATEGY)
        .route(prompts::RATIONALE_HEADING, RATIONALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use negotiator_pipeline::{InMemoryDealRepository, KnowledgeStore, NegotiationPipeline};

    #[tokio::test]
    async fn dry_run_completes_without_fallbacks() {
        let pipeline = NegotiationPipeline::standard(
            Arc::new(InMemoryDealRepository::with_samples()),
            None,
            Arc::new(KnowledgeStore::with_samples()),
            Arc::new(generator()),
        )
        .unwrap();
        let outcome = pipeline.execute("DEAL123", None).await;
        let state = outcome.result.unwrap();

        assert_eq!(state.strategy().unwrap().conservative.len(), 1);
        for stage in &outcome.trace.stages {
            if let Some(status) = stage.metrics.get("parse_status") {
                assert_eq!(status, "clean", "{}", stage.stage);
            }
        }
    }
}
