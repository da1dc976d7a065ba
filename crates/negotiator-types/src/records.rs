//! Stage output records.
//!
//! Every record here has a `Default` that is shape-valid: it carries the same
//! keys as a successfully parsed record, only empty. Downstream stages can
//! therefore read these fields without branching on parse failures.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::DocumentChunk;

// ---------------------------------------------------------------------------
// DecisionBasis
// ---------------------------------------------------------------------------

/// Ordinal confidence attached to a triggered heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
            Confidence::Low => "Low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionBasis {
    pub heuristic: String,
    pub justification: String,
    pub confidence: Confidence,
}

impl DecisionBasis {
    pub fn new(
        heuristic: impl Into<String>,
        justification: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            heuristic: heuristic.into(),
            justification: justification.into(),
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// ContextSummary
// ---------------------------------------------------------------------------

/// A knowledge chunk cited by a generated record, resolved to the stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainKnowledgeItem {
    pub chunk: Arc<DocumentChunk>,
    pub relevance_reason: String,
    pub application_context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealSummary {
    pub coverage_terms: String,
    pub risk_profile: String,
    pub premium_structure: String,
    pub line_of_business: String,
    pub territory: String,
    pub key_risk_factors: Vec<String>,
    pub current_offer_details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSummary {
    pub relationship_duration: String,
    pub prior_negotiation_history: Vec<String>,
    pub claim_history: String,
    pub payment_history: String,
    pub negotiation_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationSummary {
    pub current_objections: Vec<String>,
    pub discussion_progress: Vec<String>,
    pub offer_history: Vec<String>,
    pub client_priorities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparableDeal {
    pub reference_deal_id: String,
    pub similarity_reason: String,
    pub outcome_summary: String,
    pub key_learnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparableDealsSummary {
    pub similar_deals: Vec<ComparableDeal>,
    pub market_trends: String,
    pub benchmark_insights: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSummary {
    pub deal_summary: DealSummary,
    pub client_summary: ClientSummary,
    pub negotiation_context: NegotiationSummary,
    pub comparable_deals: ComparableDealsSummary,
    pub relevant_domain_knowledge: Vec<DomainKnowledgeItem>,
    pub key_insights: Vec<String>,
}

// ---------------------------------------------------------------------------
// NegotiationStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyRecommendation {
    pub recommendation: String,
    pub rationale: String,
    pub impact: String,
    pub confidence_level: String,
    pub risk_level: String,
}

/// Pricing guard rails for the quote. All three keys are always serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteConstraints {
    /// Minimum floor premium.
    #[serde(rename = "MFP", default, deserialize_with = "loose_string")]
    pub mfp: Option<String>,
    /// Recommended target premium.
    #[serde(rename = "RTP", default, deserialize_with = "loose_string")]
    pub rtp: Option<String>,
    /// Walk-away point.
    #[serde(rename = "WAP", default, deserialize_with = "loose_string")]
    pub wap: Option<String>,
}

/// Accept a string, a number, or null; models are inconsistent about quoting figures.
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegotiationStrategy {
    pub conservative: Vec<StrategyRecommendation>,
    pub moderate: Vec<StrategyRecommendation>,
    pub aggressive: Vec<StrategyRecommendation>,
    #[serde(default)]
    pub quote_constraints: QuoteConstraints,
}

impl NegotiationStrategy {
    /// Total number of recommendations across all three levels.
    pub fn recommendation_count(&self) -> usize {
        self.conservative.len() + self.moderate.len() + self.aggressive.len()
    }
}

// ---------------------------------------------------------------------------
// InformationGap / StrategyRationale
// ---------------------------------------------------------------------------

fn default_priority() -> u32 {
    1
}

/// Accept an integer, a numeric string or a whole float. Anything else is
/// read as the default priority rather than rejecting the record.
fn loose_priority<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let priority = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(priority
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or_else(default_priority))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationGap {
    pub gap_description: String,
    #[serde(default)]
    pub recommended_action: String,
    /// 1 is the highest priority.
    #[serde(default = "default_priority", deserialize_with = "loose_priority")]
    pub priority: u32,
    #[serde(default)]
    pub impact_on_strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyRationale {
    pub conservative_rationale: String,
    pub moderate_rationale: String,
    pub aggressive_rationale: String,
    #[serde(default)]
    pub decision_factors: Vec<String>,
    #[serde(default)]
    pub client_history_impact: String,
    #[serde(default)]
    pub comparable_deals_impact: String,
    #[serde(default)]
    pub risk_profile_considerations: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&Confidence::High).unwrap(), "\"High\"");
        let c: Confidence = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(c, Confidence::Medium);
    }

    #[test]
    fn gap_priority_is_read_leniently() {
        let gaps: Vec<InformationGap> = serde_json::from_str(
            r#"[
                {"gap_description": "Loss runs", "priority": "2"},
                {"gap_description": "Payroll", "priority": 3.0},
                {"gap_description": "Fleet list", "priority": "high"},
                {"gap_description": "Valuation", "priority": null},
                {"gap_description": "Survey"}
            ]"#,
        )
        .unwrap();
        let priorities: Vec<u32> = gaps.iter().map(|g| g.priority).collect();
        assert_eq!(priorities, vec![2, 3, 1, 1, 1]);
    }

    #[test]
    fn default_quote_constraints_keep_all_keys() {
        let json = serde_json::to_value(QuoteConstraints::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        for key in ["MFP", "RTP", "WAP"] {
            assert!(obj[key].is_null(), "{key} should be null");
        }
    }

    #[test]
    fn quote_constraints_accept_numbers() {
        let qc: QuoteConstraints =
            serde_json::from_str(r#"{"MFP": 200000, "RTP": "$225K"}"#).unwrap();
        assert_eq!(qc.mfp.as_deref(), Some("200000"));
        assert_eq!(qc.rtp.as_deref(), Some("$225K"));
        assert_eq!(qc.wap, None);
    }

    #[test]
    fn default_strategy_is_shape_valid() {
        let json = serde_json::to_value(NegotiationStrategy::default()).unwrap();
        let obj = json.as_object().unwrap();
        for key in ["conservative", "moderate", "aggressive", "quote_constraints"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(NegotiationStrategy::default().recommendation_count(), 0);
    }

    #[test]
    fn default_context_summary_is_shape_valid() {
        let json = serde_json::to_value(ContextSummary::default()).unwrap();
        let deal = json["deal_summary"].as_object().unwrap();
        assert_eq!(deal["coverage_terms"], "");
        assert!(deal["key_risk_factors"].as_array().unwrap().is_empty());
        assert!(json["relevant_domain_knowledge"].as_array().unwrap().is_empty());
    }

    #[test]
    fn information_gap_priority_defaults_to_one() {
        let gap: InformationGap =
            serde_json::from_str(r#"{"gap_description": "No loss runs"}"#).unwrap();
        assert_eq!(gap.priority, 1);
        assert!(gap.recommended_action.is_empty());
    }
}
