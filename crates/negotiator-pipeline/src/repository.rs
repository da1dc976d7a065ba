//! Deal lookup and submission file loading.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;

use negotiator_types::{
    ClientHistory, ComparableDealReference, DealContext, NegotiationContext, NegotiatorError,
    Result, SubmissionDetails,
};

// ---------------------------------------------------------------------------
// DealRepository
// ---------------------------------------------------------------------------

/// Source of deal records. Lookups never mutate the repository.
#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn get(&self, deal_id: &str) -> Result<Arc<DealContext>>;
}

// ---------------------------------------------------------------------------
// InMemoryDealRepository
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryDealRepository {
    deals: HashMap<String, Arc<DealContext>>,
}

impl InMemoryDealRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository holding the two reference deals, `DEAL001` and `DEAL123`.
    pub fn with_samples() -> Self {
        let mut repo = Self::new();
        repo.insert(sample_deal_001());
        repo.insert(sample_deal_123());
        repo
    }

    /// Insert or replace a deal, keyed by its submission deal id.
    pub fn insert(&mut self, deal: DealContext) {
        self.deals.insert(deal.deal_id().to_string(), Arc::new(deal));
    }

    /// Known deal ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.deals.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    /// Load every `*.json` file in `dir` as one deal record.
    ///
    /// A file that fails to parse aborts the load; a partially valid deal
    /// directory is a configuration error.
    pub async fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let json = tokio::fs::read_to_string(path).await?;
            let deal: DealContext = serde_json::from_str(&json).map_err(|e| {
                NegotiatorError::Other(format!("Invalid deal file {}: {e}", path.display()))
            })?;
            tracing::debug!(deal_id = %deal.deal_id(), path = %path.display(), "loaded deal");
            self.insert(deal);
        }
        Ok(paths.len())
    }
}

#[async_trait]
impl DealRepository for InMemoryDealRepository {
    async fn get(&self, deal_id: &str) -> Result<Arc<DealContext>> {
        self.deals
            .get(deal_id)
            .cloned()
            .ok_or_else(|| NegotiatorError::DealNotFound {
                deal_id: deal_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Submission files
// ---------------------------------------------------------------------------

/// Read the non-empty UTF-8 text files under `<submissions_dir>/<submission_id>`.
///
/// Keys are file names, values trimmed contents. A missing submission
/// directory yields an empty map with a warning; binary files are skipped.
/// The id must name a directory directly under `submissions_dir`.
pub async fn load_submission_files(
    submissions_dir: &Path,
    submission_id: &str,
) -> Result<BTreeMap<String, String>> {
    let mut components = Path::new(submission_id).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(NegotiatorError::InvalidSubmissionId {
            submission_id: submission_id.to_string(),
        });
    }

    let dir = submissions_dir.join(submission_id);
    let mut files = BTreeMap::new();
    if !tokio::fs::try_exists(&dir).await? {
        tracing::warn!(submission_id, dir = %dir.display(), "submission directory not found");
        return Ok(files);
    }

    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let bytes = tokio::fs::read(entry.path()).await?;
        match String::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => {
                files.insert(name, text.trim().to_string());
            }
            Ok(_) => {}
            Err(_) => tracing::debug!(file = %name, "skipping non-text submission file"),
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Reference deals
// ---------------------------------------------------------------------------

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn sample_deal_001() -> DealContext {
    DealContext {
        submission: SubmissionDetails {
            deal_id: "DEAL001".into(),
            coverage_terms: "Commercial Property: $10M limit, $100K deductible".into(),
            risk_profile: "Medium-risk manufacturing facility".into(),
            premium_structure: "Annual premium: $500K, Quarterly payments".into(),
            line_of_business: Some("Manufacturing".into()),
            territory: Some("Northeast".into()),
        },
        client_history: ClientHistory {
            client_id: "CLIENT001".into(),
            prior_negotiations: strings(&[
                "2022: Accepted 10% premium increase with deductible adjustment",
                "2021: Requested additional coverage for business interruption",
            ]),
            relationship_notes: Some("Client since 2018, good payment history".into()),
            claim_summary: Some("No major claims in past 3 years".into()),
        },
        negotiation_context: NegotiationContext {
            deal_id: "DEAL001".into(),
            discussion_notes: strings(&[
                "Client concerned about premium increase",
                "Interested in exploring deductible options",
            ]),
            offers: strings(&[
                "Initial offer: $500K premium, $100K deductible",
                "Counter offer: $450K premium, $150K deductible",
            ]),
            objections: strings(&[
                "Premium increase is too high",
                "Would like to explore higher deductible options",
            ]),
        },
        comparable_deals: vec![
            ComparableDealReference {
                reference_deal_id: "REF001".into(),
                similarity_reason: "Similar manufacturing facility".into(),
                outcome_summary: "$480K premium, $125K deductible, quarterly payments".into(),
            },
            ComparableDealReference {
                reference_deal_id: "REF002".into(),
                similarity_reason: "Similar risk profile".into(),
                outcome_summary: "$460K premium, $150K deductible, quarterly payments".into(),
            },
        ],
    }
}

pub fn sample_deal_123() -> DealContext {
    DealContext {
        submission: SubmissionDetails {
            deal_id: "DEAL123".into(),
            coverage_terms: "Commercial Property: $10M limit, $100K deductible".into(),
            risk_profile: "High-risk manufacturing facility in flood zone".into(),
            premium_structure: "Annual premium: $250K, Quarterly payments".into(),
            line_of_business: Some("Commercial Property".into()),
            territory: Some("Northeast".into()),
        },
        client_history: ClientHistory {
            client_id: "CLIENT456".into(),
            prior_negotiations: strings(&[
                "2023 Renewal: Negotiated 15% premium reduction",
                "2022 New Business: Accepted initial terms with minor modifications",
                "2021 Mid-term: accepted deductible adjustment",
            ]),
            relationship_notes: Some("Long-term client since 2018, good payment history".into()),
            claim_summary: Some("One major claim in 2021 ($2.5M), no other claims".into()),
        },
        negotiation_context: NegotiationContext {
            deal_id: "DEAL123".into(),
            discussion_notes: strings(&[
                "Initial meeting: Client concerned about flood coverage",
                "Follow-up: Discussed risk mitigation options",
            ]),
            offers: strings(&[
                "Initial offer: $250K premium, $100K deductible",
                "Revised offer: $225K premium, $150K deductible",
            ]),
            objections: strings(&[
                "Premium too high compared to market",
                "Deductible increase not acceptable",
            ]),
        },
        comparable_deals: vec![
            ComparableDealReference {
                reference_deal_id: "DEAL789".into(),
                similarity_reason: "Similar manufacturing facility in same flood zone".into(),
                outcome_summary: "Successfully renewed with 10% premium increase".into(),
            },
            ComparableDealReference {
                reference_deal_id: "DEAL101".into(),
                similarity_reason: "Similar coverage limits and risk profile".into(),
                outcome_summary: "Negotiated to $200K premium with $125K deductible".into(),
            },
        ],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn samples_are_retrievable() {
        let repo = InMemoryDealRepository::with_samples();
        assert_eq!(repo.ids(), vec!["DEAL001", "DEAL123"]);
        let deal = repo.get("DEAL123").await.unwrap();
        assert_eq!(deal.client_history.client_id, "CLIENT456");
    }

    #[tokio::test]
    async fn unknown_deal_is_not_found() {
        let repo = InMemoryDealRepository::with_samples();
        let err = repo.get("NOPE").await.unwrap_err();
        assert!(matches!(err, NegotiatorError::DealNotFound { ref deal_id } if deal_id == "NOPE"));
    }

    #[tokio::test]
    async fn lookups_share_the_stored_record() {
        let repo = InMemoryDealRepository::with_samples();
        let a = repo.get("DEAL001").await.unwrap();
        let b = repo.get("DEAL001").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn load_dir_reads_json_deals() {
        let dir = tempfile::tempdir().unwrap();
        let mut deal = sample_deal_001();
        deal.submission.deal_id = "DEAL777".into();
        std::fs::write(
            dir.path().join("deal777.json"),
            serde_json::to_string_pretty(&deal).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let mut repo = InMemoryDealRepository::new();
        assert_eq!(repo.load_dir(dir.path()).await.unwrap(), 1);
        let loaded = repo.get("DEAL777").await.unwrap();
        assert_eq!(loaded.submission.risk_profile, "Medium-risk manufacturing facility");
    }

    #[tokio::test]
    async fn load_dir_rejects_malformed_deal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), r#"{"submission": {}}"#).unwrap();
        let mut repo = InMemoryDealRepository::new();
        let err = repo.load_dir(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[tokio::test]
    async fn submission_id_cannot_leave_the_submissions_dir() {
        let base = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("secret.txt"), "TOP SECRET").unwrap();
        std::fs::create_dir(base.path().join("SUB1")).unwrap();

        let escaping = [
            other.path().to_string_lossy().into_owned(),
            "../outside".to_string(),
            "SUB1/../../outside".to_string(),
            "SUB1/nested".to_string(),
            "..".to_string(),
            ".".to_string(),
            String::new(),
        ];
        for id in &escaping {
            let err = load_submission_files(base.path(), id).await.unwrap_err();
            assert!(
                matches!(err, NegotiatorError::InvalidSubmissionId { ref submission_id } if submission_id == id),
                "{id:?} was accepted"
            );
        }
        assert!(load_submission_files(base.path(), "SUB1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_files_skip_blank_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("SUB1");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("notes.txt"), "  Broker wants BI cover.  \n").unwrap();
        std::fs::write(sub.join("empty.txt"), "   \n").unwrap();
        std::fs::write(sub.join("scan.bin"), [0xff_u8, 0xfe, 0x00]).unwrap();

        let files = load_submission_files(dir.path(), "SUB1").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["notes.txt"], "Broker wants BI cover.");
    }

    #[tokio::test]
    async fn missing_submission_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = load_submission_files(dir.path(), "NOPE").await.unwrap();
        assert!(files.is_empty());
    }
}
