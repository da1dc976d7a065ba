use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DealContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetails {
    pub deal_id: String,
    pub coverage_terms: String,
    pub risk_profile: String,
    pub premium_structure: String,
    #[serde(default)]
    pub line_of_business: Option<String>,
    #[serde(default)]
    pub territory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientHistory {
    pub client_id: String,
    #[serde(default)]
    pub prior_negotiations: Vec<String>,
    #[serde(default)]
    pub relationship_notes: Option<String>,
    #[serde(default)]
    pub claim_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationContext {
    pub deal_id: String,
    #[serde(default)]
    pub discussion_notes: Vec<String>,
    #[serde(default)]
    pub offers: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableDealReference {
    pub reference_deal_id: String,
    pub similarity_reason: String,
    pub outcome_summary: String,
}

/// Everything known about a deal at the start of a run.
///
/// Owned by the deal repository and handed to the pipeline behind an `Arc`;
/// stages only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealContext {
    pub submission: SubmissionDetails,
    pub client_history: ClientHistory,
    pub negotiation_context: NegotiationContext,
    #[serde(default)]
    pub comparable_deals: Vec<ComparableDealReference>,
}

impl DealContext {
    /// The deal identifier recorded on the submission.
    pub fn deal_id(&self) -> &str {
        &self.submission.deal_id
    }
}
