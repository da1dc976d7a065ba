use std::sync::Arc;

use async_trait::async_trait;

use negotiator_types::{PipelineState, Result, StateField, StateUpdate};

use crate::knowledge::KnowledgeStore;
use crate::stage::{Stage, StageContract, StageOutput};

/// Collects every stored chunk, grouped by document type in registration order.
pub struct FetchDomainKnowledge {
    store: Arc<KnowledgeStore>,
}

impl FetchDomainKnowledge {
    pub const NAME: &'static str = "fetch_domain_knowledge";

    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for FetchDomainKnowledge {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn contract(&self) -> StageContract {
        StageContract {
            required: &[StateField::DealContext],
            optional: &[],
            owns: &[StateField::DomainKnowledge],
        }
    }

    async fn execute(&self, _state: &PipelineState) -> Result<StageOutput> {
        let types = self.store.registered_types();
        let mut chunks = Vec::with_capacity(self.store.len());
        for doc_type in &types {
            let found = self.store.get_by_type(doc_type)?;
            tracing::debug!(document_type = %doc_type, chunks = found.len(), "fetched knowledge");
            chunks.extend(found);
        }
        if chunks.is_empty() {
            tracing::warn!("knowledge store is empty");
        }

        Ok(StageOutput::new()
            .metric("total_chunks_fetched", chunks.len())
            .metric("document_types", types)
            .update(StateUpdate::DomainKnowledge(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use negotiator_types::DocumentChunk;

    #[tokio::test]
    async fn groups_chunks_by_type() {
        let mut store = KnowledgeStore::new();
        store.add([
            DocumentChunk::new("a", "one", "d", "negotiation_framework"),
            DocumentChunk::new("b", "two", "d", "best_practices"),
            DocumentChunk::new("c", "three", "d", "negotiation_framework"),
        ]);
        let output = FetchDomainKnowledge::new(Arc::new(store))
            .execute(&PipelineState::new("DEAL001", None))
            .await
            .unwrap();
        match &output.updates[0] {
            StateUpdate::DomainKnowledge(chunks) => {
                let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
                assert_eq!(ids, vec!["a", "c", "b"]);
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(
            output.metrics["document_types"],
            serde_json::json!(["negotiation_framework", "best_practices"])
        );
    }

    #[tokio::test]
    async fn empty_store_writes_empty_knowledge() {
        let output = FetchDomainKnowledge::new(Arc::new(KnowledgeStore::new()))
            .execute(&PipelineState::new("DEAL001", None))
            .await
            .unwrap();
        assert!(matches!(&output.updates[0], StateUpdate::DomainKnowledge(c) if c.is_empty()));
        assert_eq!(output.metrics["total_chunks_fetched"], 0);
    }
}
