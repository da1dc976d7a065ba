//! Run progress events.
//!
//! The executor emits [`PipelineEvent`]s on a [`tokio::sync::broadcast`]
//! channel; observers subscribe without touching the executor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        run_id: String,
        deal_id: String,
        stage_count: usize,
    },
    RunCompleted {
        run_id: String,
        deal_id: String,
        duration_ms: u64,
    },
    RunFailed {
        run_id: String,
        deal_id: String,
        stage: Option<String>,
        error: String,
    },
    StageStarted {
        run_id: String,
        stage: String,
    },
    StageCompleted {
        run_id: String,
        stage: String,
        duration_ms: u64,
        fields_written: Vec<String>,
    },
    StageFailed {
        run_id: String,
        stage: String,
        error: String,
    },
    /// A stage's generated response was repaired or replaced by its fallback.
    ResponseRecovered {
        run_id: String,
        stage: String,
        parse_status: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to all current subscribers. Dropped when nobody listens.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let emitter = EventEmitter::new(16);
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();

        emitter.emit(PipelineEvent::StageStarted {
            run_id: "r1".into(),
            stage: "analyze_context".into(),
        });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                PipelineEvent::StageStarted { stage, .. } => assert_eq!(stage, "analyze_context"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        EventEmitter::new(4).emit(PipelineEvent::RunFailed {
            run_id: "r1".into(),
            deal_id: "DEAL404".into(),
            stage: Some("fetch_deal_context".into()),
            error: "Deal 'DEAL404' not found".into(),
        });
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(PipelineEvent::ResponseRecovered {
            run_id: "r1".into(),
            stage: "generate_strategy".into(),
            parse_status: "repaired".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "response_recovered");
        assert_eq!(json["parse_status"], "repaired");
    }
}
