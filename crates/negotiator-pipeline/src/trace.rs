//! Per-run trace: timing, outcome and metrics for every stage.
//!
//! The executor records one [`StageTrace`] per stage it starts. A finished
//! [`RunTrace`] can be written to disk as pretty JSON with [`save_trace`].

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use negotiator_types::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrace {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub status: TraceStatus,
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: String,
    pub deal_id: String,
    pub submission_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub status: TraceStatus,
    pub stages: Vec<StageTrace>,
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0)
}

impl RunTrace {
    pub fn new(deal_id: impl Into<String>, submission_id: Option<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal_id.into(),
            submission_id,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            status: TraceStatus::Running,
            stages: Vec::new(),
        }
    }

    pub fn start_stage(&mut self, stage: &str) {
        self.stages.push(StageTrace {
            stage: stage.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            status: TraceStatus::Running,
            metrics: Map::new(),
            error: None,
        });
    }

    /// Close the most recently started stage. Returns its duration.
    pub fn finish_stage(&mut self, metrics: Map<String, Value>, error: Option<String>) -> u64 {
        let Some(entry) = self.stages.last_mut() else {
            return 0;
        };
        let now = Utc::now();
        entry.finished_at = Some(now);
        entry.duration_ms = elapsed_ms(entry.started_at, now);
        entry.status = if error.is_some() {
            TraceStatus::Failed
        } else {
            TraceStatus::Success
        };
        entry.metrics = metrics;
        entry.error = error;
        entry.duration_ms
    }

    pub fn finish(&mut self, status: TraceStatus) -> u64 {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.duration_ms = elapsed_ms(self.started_at, now);
        self.status = status;
        self.duration_ms
    }

    pub fn stage(&self, name: &str) -> Option<&StageTrace> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Write `trace` to `path` as pretty JSON, creating parent directories.
pub async fn save_trace(trace: &RunTrace, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(trace)?;
    tokio::fs::write(path, json).await?;
    tracing::debug!(path = %path.display(), run_id = %trace.run_id, "trace saved");
    Ok(())
}

pub async fn load_trace(path: &Path) -> Result<RunTrace> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_lifecycle() {
        let mut trace = RunTrace::new("DEAL123", None);
        trace.start_stage("fetch_deal_context");
        let mut metrics = Map::new();
        metrics.insert("objections".into(), 2.into());
        trace.finish_stage(metrics, None);
        trace.start_stage("fetch_domain_knowledge");
        trace.finish_stage(Map::new(), Some("store unavailable".into()));
        trace.finish(TraceStatus::Failed);

        let first = trace.stage("fetch_deal_context").unwrap();
        assert_eq!(first.status, TraceStatus::Success);
        assert_eq!(first.metrics["objections"], 2);
        assert!(first.finished_at.unwrap() >= first.started_at);

        let second = trace.stage("fetch_domain_knowledge").unwrap();
        assert_eq!(second.status, TraceStatus::Failed);
        assert_eq!(second.error.as_deref(), Some("store unavailable"));
        assert_eq!(trace.status, TraceStatus::Failed);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunTrace::new("D", None).run_id, RunTrace::new("D", None).run_id);
    }

    #[test]
    fn finish_stage_without_start_is_harmless() {
        let mut trace = RunTrace::new("D", None);
        assert_eq!(trace.finish_stage(Map::new(), None), 0);
        assert!(trace.stages.is_empty());
    }

    #[tokio::test]
    async fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces").join("run.json");
        let mut trace = RunTrace::new("DEAL001", Some("SUB1".into()));
        trace.start_stage("fetch_deal_context");
        trace.finish_stage(Map::new(), None);
        trace.finish(TraceStatus::Success);

        save_trace(&trace, &path).await.unwrap();
        let loaded = load_trace(&path).await.unwrap();
        assert_eq!(loaded.run_id, trace.run_id);
        assert_eq!(loaded.submission_id.as_deref(), Some("SUB1"));
        assert_eq!(loaded.stages.len(), 1);
        assert_eq!(loaded.status, TraceStatus::Success);
    }
}
