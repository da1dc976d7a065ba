//! Deterministic negotiation heuristics.
//!
//! Each rule inspects the deal context and emits zero or more
//! [`DecisionBasis`] entries. Rules are independent; [`evaluate`] runs them
//! all in declaration order and keeps every match. Matching is
//! case-insensitive substring search.

use negotiator_types::{Confidence, DealContext, DecisionBasis};

// ---------------------------------------------------------------------------
// Heuristic trait
// ---------------------------------------------------------------------------

pub trait Heuristic: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, deal: &DealContext) -> Vec<DecisionBasis>;
}

fn mentions(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}

fn any_mentions(items: &[String], needle: &str) -> bool {
    items.iter().any(|item| mentions(item, needle))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A premium objection from a client who has traded deductibles before.
pub struct PremiumDeductibleTrade;

impl Heuristic for PremiumDeductibleTrade {
    fn name(&self) -> &str {
        "premium_deductible_trade"
    }

    fn evaluate(&self, deal: &DealContext) -> Vec<DecisionBasis> {
        let premium_objection = any_mentions(&deal.negotiation_context.objections, "premium");
        let deductible_history =
            any_mentions(&deal.client_history.prior_negotiations, "deductible");
        if premium_objection && deductible_history {
            vec![DecisionBasis::new(
                "Premium Objection → Deductible Trade",
                "Client objected to premium and has history of accepting deductible adjustments",
                Confidence::High,
            )]
        } else {
            vec![]
        }
    }
}

/// Coverage objections: one general decision, plus one specific decision per
/// objection naming business interruption or flood.
pub struct CoverageRequest;

impl Heuristic for CoverageRequest {
    fn name(&self) -> &str {
        "coverage_request"
    }

    fn evaluate(&self, deal: &DealContext) -> Vec<DecisionBasis> {
        let objections = &deal.negotiation_context.objections;
        if !any_mentions(objections, "coverage") {
            return vec![];
        }

        let mut decisions = vec![DecisionBasis::new(
            "Coverage Request → Evaluate Against Limits",
            "Client raised a coverage concern that should be weighed against current limits",
            Confidence::Medium,
        )];
        for objection in objections {
            if mentions(objection, "business interruption") {
                decisions.push(DecisionBasis::new(
                    "Coverage Request → Business Interruption",
                    "Client requested additional business interruption coverage",
                    Confidence::High,
                ));
            } else if mentions(objection, "flood") {
                decisions.push(DecisionBasis::new(
                    "Coverage Request → Flood Coverage",
                    "Client requested flood coverage consideration",
                    Confidence::High,
                ));
            }
        }
        decisions
    }
}

pub struct HighRiskProfile;

impl Heuristic for HighRiskProfile {
    fn name(&self) -> &str {
        "high_risk_profile"
    }

    fn evaluate(&self, deal: &DealContext) -> Vec<DecisionBasis> {
        if mentions(&deal.submission.risk_profile, "high-risk") {
            vec![DecisionBasis::new(
                "High Risk → Enhanced Coverage",
                "High-risk profile suggests need for enhanced coverage options",
                Confidence::Medium,
            )]
        } else {
            vec![]
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn default_heuristics() -> Vec<Box<dyn Heuristic>> {
    vec![
        Box::new(PremiumDeductibleTrade),
        Box::new(CoverageRequest),
        Box::new(HighRiskProfile),
    ]
}

/// Run every built-in heuristic against `deal`.
pub fn evaluate(deal: &DealContext) -> Vec<DecisionBasis> {
    let mut decisions = Vec::new();
    for rule in default_heuristics() {
        let matched = rule.evaluate(deal);
        if !matched.is_empty() {
            tracing::debug!(rule = rule.name(), matches = matched.len(), "heuristic triggered");
        }
        decisions.extend(matched);
    }
    decisions
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
