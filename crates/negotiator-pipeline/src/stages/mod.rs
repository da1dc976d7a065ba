//! The seven stages of a negotiation run, in execution order.

mod analyze_context;
mod explain_rationale;
mod fetch_deal_context;
mod fetch_domain_knowledge;
mod generate_strategy;
mod identify_information_gaps;
mod select_relevant_knowledge;

pub use analyze_context::AnalyzeContext;
pub use explain_rationale::{reasoning_steps, ExplainRationale};
pub use fetch_deal_context::FetchDealContext;
pub use fetch_domain_knowledge::FetchDomainKnowledge;
pub use generate_strategy::GenerateStrategy;
pub use identify_information_gaps::IdentifyInformationGaps;
pub use select_relevant_knowledge::SelectRelevantKnowledge;

use std::path::PathBuf;
use std::sync::Arc;

use negotiator_llm::TextGenerator;
use negotiator_types::{DocumentChunk, Result, StateField};

use crate::knowledge::KnowledgeStore;
use crate::parse::{parse, ParseReport, ResponseSchema};
use crate::repository::DealRepository;
use crate::stage::DynStage;

/// The standard stage sequence sharing one repository, store and generator.
pub fn standard_stages(
    repository: Arc<dyn DealRepository>,
    submissions_dir: Option<PathBuf>,
    store: Arc<KnowledgeStore>,
    generator: Arc<dyn TextGenerator>,
) -> Vec<DynStage> {
    vec![
        DynStage::new(FetchDealContext::new(repository, submissions_dir)),
        DynStage::new(FetchDomainKnowledge::new(store)),
        DynStage::new(AnalyzeContext::new(generator.clone())),
        DynStage::new(SelectRelevantKnowledge::new(generator.clone())),
        DynStage::new(IdentifyInformationGaps::new(generator.clone())),
        DynStage::new(GenerateStrategy::new(generator.clone())),
        DynStage::new(ExplainRationale::new(generator)),
    ]
}

/// Unwrap a required state member. The executor checks required fields
/// before a stage runs, so this only fails for a stage run directly.
fn require<T>(value: Option<T>, field: StateField, stage: &str) -> Result<T> {
    value.ok_or_else(|| field.missing(stage))
}

/// One generation call, parsed against `T`. Generation errors propagate;
/// malformed output does not.
async fn generate_record<T: ResponseSchema>(
    generator: &dyn TextGenerator,
    stage: &str,
    prompt: &str,
    chunks: &[Arc<DocumentChunk>],
) -> Result<ParseReport<T>> {
    tracing::debug!(stage, prompt_chars = prompt.len(), "requesting generation");
    let raw = generator.generate(prompt).await?;
    let report = parse::<T>(&raw, chunks);
    tracing::debug!(
        stage,
        response_chars = raw.len(),
        parse_status = report.status.as_str(),
        "parsed generation"
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use negotiator_types::{DocumentChunk, PipelineState, StateUpdate};

    use crate::knowledge::sample_chunks;
    use crate::repository::sample_deal_123;

    pub fn knowledge() -> Vec<Arc<DocumentChunk>> {
        sample_chunks().into_iter().map(Arc::new).collect()
    }

    pub fn deal() -> StateUpdate {
        StateUpdate::DealContext(Arc::new(sample_deal_123()))
    }

    /// A DEAL123 state with `updates` already written.
    pub fn state_with(updates: Vec<StateUpdate>) -> PipelineState {
        let mut state = PipelineState::new("DEAL123", None);
        for update in updates {
            let field = update.field();
            state.apply("seed", &[field], update).unwrap();
        }
        state
    }
}
