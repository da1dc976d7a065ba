use std::sync::Arc;

use async_trait::async_trait;

use negotiator_llm::TextGenerator;
use negotiator_types::{InformationGap, PipelineState, Result, StateField, StateUpdate};

use super::{generate_record, require};
use crate::prompts;
use crate::stage::{Stage, StageContract, StageOutput};

/// Lists information missing from the deal, most urgent first.
pub struct IdentifyInformationGaps {
    generator: Arc<dyn TextGenerator>,
}

impl IdentifyInformationGaps {
    pub const NAME: &'static str = "identify_information_gaps";

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for IdentifyInformationGaps {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::ContextSummary],
            optional: &[StateField::RelevantDomainKnowledge],
            owns: &[StateField::InformationGaps],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let summary = require(state.context_summary(), StateField::ContextSummary, Self::NAME)?;
        let relevant = state.relevant_domain_knowledge();
        if relevant.map_or(true, |r| r.is_empty()) {
            tracing::warn!("no relevant domain knowledge, gap review may be less informed");
        }

        let prompt = prompts::information_gaps(summary, relevant)?;
        let report =
            generate_record::<Vec<InformationGap>>(self.generator.as_ref(), Self::NAME, &prompt, &[])
                .await?;

        let metrics = report.metrics();
        let gaps = report.value;
        let urgent = gaps.iter().filter(|g| g.priority <= 1).count();
        Ok(StageOutput::new()
            .metrics(metrics)
            .metric("gaps_identified", gaps.len())
            .metric("high_priority_gaps", urgent)
            .update(StateUpdate::InformationGaps(gaps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::state_with;
    use negotiator_llm::ScriptedGenerator;
    use negotiator_types::ContextSummary;

    fn state() -> PipelineState {
        state_with(vec![StateUpdate::ContextSummary(ContextSummary::default())])
    }

    #[tokio::test]
    async fn counts_urgent_gaps() {
        let generator = Arc::new(ScriptedGenerator::new([r#"{"information_gaps": [
            {"gap_description": "Loss runs", "priority": 2},
            {"gap_description": "Flood elevation certificate", "priority": 1},
            {"gap_description": "Sprinkler survey", "priority": "1"}
        ]}"#]));
        let output = IdentifyInformationGaps::new(generator.clone())
            .execute(&state())
            .await
            .unwrap();

        assert!(generator.prompts()[0].starts_with(prompts::INFORMATION_GAPS_HEADING));
        assert_eq!(output.metrics["parse_status"], "clean");
        assert_eq!(output.metrics["gaps_identified"], 3);
        assert_eq!(output.metrics["high_priority_gaps"], 2);
        match &output.updates[..] {
            [StateUpdate::InformationGaps(gaps)] => {
                assert_eq!(gaps[2].gap_description, "Loss runs");
            }
            other => panic!("unexpected updates: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_response_writes_no_gaps() {
        let output = IdentifyInformationGaps::new(Arc::new(ScriptedGenerator::new(["n/a"])))
            .execute(&state())
            .await
            .unwrap();
        assert_eq!(output.metrics["parse_status"], "fallback");
        assert_eq!(output.metrics["gaps_identified"], 0);
        assert!(matches!(
            &output.updates[..],
            [StateUpdate::InformationGaps(gaps)] if gaps.is_empty()
        ));
    }
}
