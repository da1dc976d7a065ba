use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use negotiator_types::{PipelineState, Result, StateField, StateUpdate};

use crate::repository::{load_submission_files, DealRepository};
use crate::stage::{Stage, StageContract, StageOutput};

/// Looks up the deal and loads any submission documents.
pub struct FetchDealContext {
    repository: Arc<dyn DealRepository>,
    submissions_dir: Option<PathBuf>,
}

impl FetchDealContext {
    pub const NAME: &'static str = "fetch_deal_context";

    pub fn new(repository: Arc<dyn DealRepository>, submissions_dir: Option<PathBuf>) -> Self {
        Self {
            repository,
            submissions_dir,
        }
    }
}

#[async_trait]
impl Stage for FetchDealContext {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::DealId],
            optional: &[StateField::SubmissionId],
            owns: &[StateField::DealContext, StateField::SubmissionFiles],
        }
    }

    async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        let deal = self.repository.get(state.deal_id()).await?;

        let files = match (state.submission_id(), &self.submissions_dir) {
            (Some(submission_id), Some(dir)) => load_submission_files(dir, submission_id).await?,
            (Some(submission_id), None) => {
                tracing::warn!(
                    submission_id,
                    "submission id given but no submissions directory is configured"
                );
                BTreeMap::new()
            }
            (None, _) => BTreeMap::new(),
        };

        tracing::info!(
            deal_id = %deal.deal_id(),
            client_id = %deal.client_history.client_id,
            submission_files = files.len(),
            "fetched deal context"
        );

        Ok(StageOutput::new()
            .metric("client_id", deal.client_history.client_id.clone())
            .metric("objections", deal.negotiation_context.objections.len())
            .metric("comparable_deals", deal.comparable_deals.len())
            .metric("submission_files", files.len())
            .update(StateUpdate::DealContext(deal))
            .update(StateUpdate::SubmissionFiles(files)))
    }
}
