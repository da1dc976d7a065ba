use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key carrying a chunk's document type tag.
pub const DOCUMENT_TYPE_KEY: &str = "document_type";

/// Known document types produced by the ingestion loader.
///
/// Chunks may carry any type tag; these are the ones the loader assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NegotiationFramework,
    UnderwritingGuideline,
    RegulatoryRequirement,
    BestPractices,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::NegotiationFramework => "negotiation_framework",
            DocumentType::UnderwritingGuideline => "underwriting_guideline",
            DocumentType::RegulatoryRequirement => "regulatory_requirement",
            DocumentType::BestPractices => "best_practices",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable unit of domain knowledge text with type metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub source_doc_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DocumentChunk {
    /// Create a chunk tagged with the given document type.
    pub fn new(
        chunk_id: impl Into<String>,
        text: impl Into<String>,
        source_doc_id: impl Into<String>,
        document_type: impl Into<String>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            DOCUMENT_TYPE_KEY.to_string(),
            serde_json::Value::String(document_type.into()),
        );
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            source_doc_id: source_doc_id.into(),
            metadata,
        }
    }

    /// The `document_type` tag, when present and a string.
    pub fn document_type(&self) -> Option<&str> {
        self.metadata.get(DOCUMENT_TYPE_KEY).and_then(|v| v.as_str())
    }

    /// Insert an extra metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
