//! Pipeline executor: validates the stage sequence once, then drives each run
//! through it in order.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use negotiator_llm::TextGenerator;
use negotiator_types::{NegotiatorError, PipelineState, Result, StateField};

use crate::events::{EventEmitter, PipelineEvent};
use crate::knowledge::KnowledgeStore;
use crate::repository::DealRepository;
use crate::stage::{DynStage, Stage};
use crate::stages::standard_stages;
use crate::trace::{RunTrace, TraceStatus};
use crate::validation::{validate_or_raise, Severity};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A validated, ordered stage sequence.
///
/// Holds no per-run state; one pipeline can serve many runs.
pub struct NegotiationPipeline {
    stages: Vec<DynStage>,
    emitter: EventEmitter,
}

/// The result of one run together with its trace. On failure the partial
/// state is discarded.
#[derive(Debug)]
pub struct RunOutcome {
    pub trace: RunTrace,
    pub result: Result<PipelineState>,
}

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<DynStage>,
    emitter: Option<EventEmitter>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(DynStage::new(stage));
        self
    }

    pub fn stages(mut self, stages: impl IntoIterator<Item = DynStage>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Validate the sequence and build the pipeline.
    pub fn build(self) -> Result<NegotiationPipeline> {
        let diagnostics = validate_or_raise(&self.stages)?;
        for d in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
            tracing::warn!(rule = %d.rule, "{}", d.message);
        }
        Ok(NegotiationPipeline {
            stages: self.stages,
            emitter: self.emitter.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// NegotiationPipeline
// ---------------------------------------------------------------------------

impl NegotiationPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The standard seven-stage pipeline.
    pub fn standard(
        repository: Arc<dyn DealRepository>,
        submissions_dir: Option<PathBuf>,
        store: Arc<KnowledgeStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        Self::builder()
            .stages(standard_stages(repository, submissions_dir, store, generator))
            .build()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.emitter.subscribe()
    }

    /// Run one deal and return the final state as a JSON mapping.
    pub async fn run(&self, deal_id: &str, submission_id: Option<&str>) -> Result<Value> {
        self.execute(deal_id, submission_id).await.result?.to_value()
    }

    /// Run one deal, keeping the trace whether or not the run succeeds.
    pub async fn execute(&self, deal_id: &str, submission_id: Option<&str>) -> RunOutcome {
        let submission_id = submission_id.map(str::to_string);
        let mut trace = RunTrace::new(deal_id, submission_id.clone());
        let mut state = PipelineState::new(deal_id, submission_id);
        let run_id = trace.run_id.clone();

        tracing::info!(run_id = %run_id, deal_id, stages = self.stages.len(), "run started");
        self.emitter.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            deal_id: deal_id.to_string(),
            stage_count: self.stages.len(),
        });

        for stage in &self.stages {
            let name = stage.name().to_string();
            trace.start_stage(&name);
            self.emitter.emit(PipelineEvent::StageStarted {
                run_id: run_id.clone(),
                stage: name.clone(),
            });

            match run_stage(stage, &mut state).await {
                Ok((metrics, written)) => {
                    if let Some(status) = metrics
                        .get("parse_status")
                        .and_then(Value::as_str)
                        .filter(|s| *s != "clean")
                    {
                        self.emitter.emit(PipelineEvent::ResponseRecovered {
                            run_id: run_id.clone(),
                            stage: name.clone(),
                            parse_status: status.to_string(),
                        });
                    }
                    let duration_ms = trace.finish_stage(metrics, None);
                    tracing::info!(stage = %name, duration_ms, "stage completed");
                    self.emitter.emit(PipelineEvent::StageCompleted {
                        run_id: run_id.clone(),
                        stage: name,
                        duration_ms,
                        fields_written: written.iter().map(|f| f.as_str().to_string()).collect(),
                    });
                }
                Err(err) => {
                    let message = err.to_string();
                    trace.finish_stage(Map::new(), Some(message.clone()));
                    trace.finish(TraceStatus::Failed);
                    tracing::error!(run_id = %run_id, stage = %name, error = %message, "stage failed");
                    self.emitter.emit(PipelineEvent::StageFailed {
                        run_id: run_id.clone(),
                        stage: name.clone(),
                        error: message.clone(),
                    });
                    self.emitter.emit(PipelineEvent::RunFailed {
                        run_id,
                        deal_id: deal_id.to_string(),
                        stage: Some(name),
                        error: message,
                    });
                    return RunOutcome {
                        trace,
                        result: Err(err),
                    };
                }
            }
        }

        let duration_ms = trace.finish(TraceStatus::Success);
        tracing::info!(run_id = %run_id, deal_id, duration_ms, "run completed");
        self.emitter.emit(PipelineEvent::RunCompleted {
            run_id,
            deal_id: deal_id.to_string(),
            duration_ms,
        });
        RunOutcome {
            trace,
            result: Ok(state),
        }
    }
}

/// Check preconditions, execute, and apply the stage's writes.
async fn run_stage(
    stage: &DynStage,
    state: &mut PipelineState,
) -> Result<(Map<String, Value>, Vec<StateField>)> {
    stage.check_required(state)?;
    let output = stage.execute(state).await?;

    let contract = stage.contract();
    let mut written = Vec::with_capacity(output.updates.len());
    for update in output.updates {
        let field = update.field();
        state.apply(stage.name(), contract.owns, update)?;
        written.push(field);
    }

    if let Some(field) = contract.owns.iter().find(|f| !state.is_written(**f)) {
        return Err(NegotiatorError::StageError {
            stage: stage.name().to_string(),
            message: format!("finished without writing '{field}'"),
        });
    }
    Ok((output.metrics, written))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
