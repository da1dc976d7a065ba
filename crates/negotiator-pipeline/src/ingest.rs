//! Domain document loading and paragraph chunking.

use std::path::Path;

use regex::Regex;

use negotiator_types::{DocumentChunk, DocumentType, Result};

/// A domain knowledge document read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainDocument {
    pub doc_id: String,
    pub document_type: DocumentType,
    pub source_name: String,
    pub content: String,
}

/// Splits documents into paragraph chunks.
pub struct DocumentProcessor {
    paragraph_splitter: Regex,
}

impl DocumentProcessor {
    pub fn new() -> Self {
        Self {
            paragraph_splitter: Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"),
        }
    }

    /// One chunk per non-blank paragraph, ids `<doc_id>_chunk_<i>`.
    pub fn parse(&self, document: &DomainDocument) -> Vec<DocumentChunk> {
        self.paragraph_splitter
            .split(&document.content)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .enumerate()
            .map(|(i, para)| {
                DocumentChunk::new(
                    format!("{}_chunk_{i}", document.doc_id),
                    para,
                    &document.doc_id,
                    document.document_type.as_str(),
                )
                .with_metadata("source_name", document.source_name.clone().into())
                .with_metadata("paragraph_index", i.into())
            })
            .collect()
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Document type assigned to a file by its name.
pub fn document_type_for(file_name: &str) -> DocumentType {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    match stem {
        "coverage_limits" => DocumentType::UnderwritingGuideline,
        "negotiation_framework" => DocumentType::NegotiationFramework,
        "regulatory_requirements" => DocumentType::RegulatoryRequirement,
        _ => DocumentType::BestPractices,
    }
}

/// Read every `*.md` and `*.txt` file in `dir`, sorted by file name.
pub async fn load_domain_documents(dir: &Path) -> Result<Vec<DomainDocument>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"));
        if supported && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc_id = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = tokio::fs::read_to_string(&path).await?;
        documents.push(DomainDocument {
            doc_id,
            document_type: document_type_for(&source_name),
            source_name,
            content,
        });
    }
    tracing::debug!(dir = %dir.display(), count = documents.len(), "loaded domain documents");
    Ok(documents)
}

/// Load and chunk every document in `dir`.
pub async fn load_domain_chunks(dir: &Path) -> Result<Vec<DocumentChunk>> {
    let processor = DocumentProcessor::new();
    let documents = load_domain_documents(dir).await?;
    Ok(documents.iter().flat_map(|d| processor.parse(d)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> DomainDocument {
        DomainDocument {
            doc_id: "guide".into(),
            document_type: DocumentType::NegotiationFramework,
            source_name: "guide.md".into(),
            content: content.into(),
        }
    }

    #[test]
    fn splits_on_blank_lines_and_skips_empty_paragraphs() {
        let processor = DocumentProcessor::new();
        let chunks = processor.parse(&doc(
            "\n   High-Risk Strategy\n\n  Begin with mitigation.\n   \n\n\nTiered premiums.\n\n",
        ));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["High-Risk Strategy", "Begin with mitigation.", "Tiered premiums."]
        );
        assert_eq!(chunks[2].chunk_id, "guide_chunk_2");
        assert_eq!(chunks[2].source_doc_id, "guide");
    }

    #[test]
    fn chunks_carry_metadata() {
        let chunks = DocumentProcessor::new().parse(&doc("one\n\ntwo"));
        let second = &chunks[1];
        assert_eq!(second.document_type(), Some("negotiation_framework"));
        assert_eq!(second.metadata["source_name"], "guide.md");
        assert_eq!(second.metadata["paragraph_index"], 1);
    }

    #[test]
    fn single_newlines_stay_in_one_paragraph() {
        let chunks = DocumentProcessor::new().parse(&doc("line one\nline two"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "line one\nline two");
    }

    #[test]
    fn file_names_map_to_document_types() {
        assert_eq!(
            document_type_for("coverage_limits.md"),
            DocumentType::UnderwritingGuideline
        );
        assert_eq!(
            document_type_for("negotiation_framework.md"),
            DocumentType::NegotiationFramework
        );
        assert_eq!(
            document_type_for("regulatory_requirements.txt"),
            DocumentType::RegulatoryRequirement
        );
        assert_eq!(document_type_for("notes.md"), DocumentType::BestPractices);
    }

    #[tokio::test]
    async fn loads_supported_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("negotiation_framework.md"), "A\n\nB").unwrap();
        std::fs::write(dir.path().join("best_practices.txt"), "C").unwrap();
        std::fs::write(dir.path().join("image.png"), "not text").unwrap();

        let documents = load_domain_documents(dir.path()).await.unwrap();
        let names: Vec<_> = documents.iter().map(|d| d.source_name.as_str()).collect();
        assert_eq!(names, vec!["best_practices.txt", "negotiation_framework.md"]);
        assert_eq!(documents[1].doc_id, "negotiation_framework");

        let chunks = load_domain_chunks(dir.path()).await.unwrap();
        let ids: Vec<_> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "best_practices_chunk_0",
                "negotiation_framework_chunk_0",
                "negotiation_framework_chunk_1"
            ]
        );
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_domain_documents(&dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, negotiator_types::NegotiatorError::Io(_)));
    }
}
