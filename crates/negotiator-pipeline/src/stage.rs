//! Stage trait, declared field contract, and dynamic dispatch wrapper.

use async_trait::async_trait;
use serde_json::{Map, Value};

use negotiator_types::{PipelineState, Result, StateField, StateUpdate};

// ---------------------------------------------------------------------------
// StageContract
// ---------------------------------------------------------------------------

/// The state fields a stage reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct StageContract {
    /// Must be present (written and non-empty) before the stage runs.
    pub required: &'static [StateField],
    /// Read when present.
    pub optional: &'static [StateField],
    /// Written by this stage and no other.
    pub owns: &'static [StateField],
}

impl StageContract {
    /// Every field the stage reads, required first.
    pub fn reads(&self) -> impl Iterator<Item = StateField> + '_ {
        self.required.iter().chain(self.optional).copied()
    }
}

// ---------------------------------------------------------------------------
// StageOutput
// ---------------------------------------------------------------------------

/// Writes produced by one stage plus metrics for its trace entry.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub updates: Vec<StateUpdate>,
    pub metrics: Map<String, Value>,
}

impl StageOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, update: StateUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn metric(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    pub fn metrics(mut self, metrics: Map<String, Value>) -> Self {
        self.metrics.extend(metrics);
        self
    }
}

// ---------------------------------------------------------------------------
// Stage trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn contract(&self) -> StageContract;

    /// Run the stage against the current state. The executor has already
    /// checked the required fields.
    async fn execute(&self, state: &PipelineState) -> Result<StageOutput>;
}

// ---------------------------------------------------------------------------
// DynStage
// ---------------------------------------------------------------------------

pub struct DynStage(Box<dyn Stage>);

impl DynStage {
    pub fn new(stage: impl Stage + 'static) -> Self {
        Self(Box::new(stage))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn contract(&self) -> StageContract {
        self.0.contract()
    }

    /// The first required field that is missing or empty in `state`.
    pub fn check_required(&self, state: &PipelineState) -> Result<()> {
        match self
            .contract()
            .required
            .iter()
            .find(|f| !state.is_present(**f))
        {
            Some(field) => Err(field.missing(self.name())),
            None => Ok(()),
        }
    }

    pub async fn execute(&self, state: &PipelineState) -> Result<StageOutput> {
        self.0.execute(state).await
    }
}

impl std::fmt::Debug for DynStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynStage").field("name", &self.name()).finish()
    }
}
