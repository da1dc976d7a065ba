//! Prompt assembly for the generation-backed stages.
//!
//! Every prompt opens with a distinct heading so a routed generator can
//! recognise which stage is asking.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use negotiator_types::{
    ContextSummary, DealContext, DecisionBasis, DocumentChunk, DomainKnowledgeItem,
    InformationGap, NegotiationStrategy, Result,
};

pub const ANALYZE_CONTEXT_HEADING: &str = "# Deal Context Analysis";
pub const SELECT_KNOWLEDGE_HEADING: &str = "# Knowledge Selection";
pub const INFORMATION_GAPS_HEADING: &str = "# Information Gap Review";
pub const STRATEGY_HEADING: &str = "# Negotiation Strategy";
pub const RATIONALE_HEADING: &str = "# Strategy Rationale";

const JSON_ONLY: &str = "Respond with JSON only. Do not wrap it in prose.";

// ---------------------------------------------------------------------------
// Shared sections
// ---------------------------------------------------------------------------

fn knowledge_lines(chunks: &[Arc<DocumentChunk>]) -> String {
    if chunks.is_empty() {
        return "No domain knowledge available.".into();
    }
    chunks
        .iter()
        .map(|c| {
            format!(
                "- [{}] {} (Source: {})",
                c.chunk_id,
                c.text,
                c.document_type().unwrap_or("unknown")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn relevant_lines(items: &[DomainKnowledgeItem]) -> String {
    if items.is_empty() {
        return "No relevant domain knowledge available.".into();
    }
    items
        .iter()
        .map(|item| format!("- {} (Relevance: {})", item.chunk.text, item.relevance_reason))
        .collect::<Vec<_>>()
        .join("\n")
}

fn gap_lines(gaps: &[InformationGap]) -> String {
    if gaps.is_empty() {
        return "No information gaps identified.".into();
    }
    gaps.iter()
        .map(|gap| {
            format!(
                "- {} (Priority: {}, Action: {})",
                gap.gap_description, gap.priority, gap.recommended_action
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Triggered heuristics as prompt lines.
pub fn decision_lines(decisions: &[DecisionBasis]) -> String {
    if decisions.is_empty() {
        return "No specific decision rules were triggered.".into();
    }
    decisions
        .iter()
        .map(|d| format!("- {}: {} (Confidence: {})", d.heuristic, d.justification, d.confidence))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Stage prompts
// ---------------------------------------------------------------------------

pub fn analyze_context(
    deal: &DealContext,
    knowledge: &[Arc<DocumentChunk>],
    submission_files: Option<&BTreeMap<String, String>>,
) -> Result<String> {
    let mut prompt = format!(
        "{ANALYZE_CONTEXT_HEADING}\n\n\
         You are an insurance underwriting assistant. Summarize the deal below \
         for a negotiation strategist.\n\n\
         ## Deal\n{}\n\n\
         ## Domain knowledge\n{}\n",
        serde_json::to_string_pretty(deal)?,
        knowledge_lines(knowledge),
    );

    if let Some(files) = submission_files.filter(|f| !f.is_empty()) {
        prompt.push_str("\n## Submission documents\n");
        for (name, text) in files {
            let _ = write!(prompt, "\n### {name}\n{text}\n");
        }
    }

    let _ = write!(
        prompt,
        "\nReturn a JSON object with the keys `deal_summary`, `client_summary`, \
         `negotiation_context`, `comparable_deals`, `relevant_domain_knowledge` \
         (a list of {{\"chunk_id\", \"relevance_reason\", \"application_context\"}} \
         citing the bracketed ids above) and `key_insights`. {JSON_ONLY}\n"
    );
    Ok(prompt)
}

pub fn select_knowledge(
    summary: &ContextSummary,
    knowledge: &[Arc<DocumentChunk>],
) -> Result<String> {
    Ok(format!(
        "{SELECT_KNOWLEDGE_HEADING}\n\n\
         Pick the domain knowledge that bears on this negotiation.\n\n\
         ## Deal summary\n{}\n\n\
         ## Available knowledge\n{}\n\n\
         Return a JSON array of objects with `chunk_id`, `relevance_reason` and \
         `application_context`. Only cite the bracketed ids above. {JSON_ONLY}\n",
        serde_json::to_string_pretty(summary)?,
        knowledge_lines(knowledge),
    ))
}

pub fn information_gaps(
    summary: &ContextSummary,
    relevant: Option<&[DomainKnowledgeItem]>,
) -> Result<String> {
    Ok(format!(
        "{INFORMATION_GAPS_HEADING}\n\n\
         Identify information missing from this deal that would change the \
         negotiation strategy.\n\n\
         ## Deal summary\n{}\n\n\
         ## Relevant knowledge\n{}\n\n\
         Return a JSON array of objects with `gap_description`, \
         `recommended_action`, `priority` (1 is most urgent) and \
         `impact_on_strategy`. {JSON_ONLY}\n",
        serde_json::to_string_pretty(summary)?,
        relevant_lines(relevant.unwrap_or_default()),
    ))
}

pub fn strategy(
    deal: &DealContext,
    summary: &ContextSummary,
    relevant: Option<&[DomainKnowledgeItem]>,
    gaps: Option<&[InformationGap]>,
    decisions: &[DecisionBasis],
) -> Result<String> {
    Ok(format!(
        "{STRATEGY_HEADING}\n\n\
         Propose negotiation strategies for deal {} at three levels of \
         assertiveness.\n\n\
         ## Deal summary\n{}\n\n\
         ## Decision rules\n{}\n\n\
         ## Relevant knowledge\n{}\n\n\
         ## Information gaps\n{}\n\n\
         Return a JSON object with the keys `conservative`, `moderate` and \
         `aggressive`, each a list of objects with `recommendation`, \
         `rationale`, `impact`, `confidence_level` and `risk_level`, plus \
         `quote_constraints` with `MFP` (minimum floor premium), `RTP` \
         (recommended target premium) and `WAP` (walk-away point). {JSON_ONLY}\n",
        deal.deal_id(),
        serde_json::to_string_pretty(summary)?,
        decision_lines(decisions),
        relevant_lines(relevant.unwrap_or_default()),
        gap_lines(gaps.unwrap_or_default()),
    ))
}

pub fn rationale(
    summary: &ContextSummary,
    strategy: &NegotiationStrategy,
    decisions: Option<&[DecisionBasis]>,
    relevant: Option<&[DomainKnowledgeItem]>,
) -> Result<String> {
    Ok(format!(
        "{RATIONALE_HEADING}\n\n\
         Explain why each strategy level fits this deal.\n\n\
         ## Deal summary\n{}\n\n\
         ## Proposed strategy\n{}\n\n\
         ## Decision rules\n{}\n\n\
         ## Relevant knowledge\n{}\n\n\
         Return a JSON object with `conservative_rationale`, \
         `moderate_rationale`, `aggressive_rationale`, `decision_factors` (a \
         list), `client_history_impact`, `comparable_deals_impact` and \
         `risk_profile_considerations`. {JSON_ONLY}\n",
        serde_json::to_string_pretty(summary)?,
        serde_json::to_string_pretty(strategy)?,
        decision_lines(decisions.unwrap_or_default()),
        relevant_lines(relevant.unwrap_or_default()),
    ))
}
