//! End-to-end runs of the standard pipeline against the sample deals and
//! knowledge store, with scripted generation.

use std::sync::Arc;

use negotiator_llm::{FixedGenerator, RoutedGenerator, ScriptedGenerator, TextGenerator};
use negotiator_pipeline::{
    prompts, InMemoryDealRepository, KnowledgeStore, NegotiationPipeline, PipelineEvent,
    TraceStatus,
};
use negotiator_types::NegotiatorError;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const CONTEXT_SUMMARY: &str = r#"Here is the analysis:
{
  "deal_summary": {
    "coverage_terms": "Commercial Property: $10M limit, $100K deductible",
    "risk_profile": "High-risk manufacturing facility in flood zone",
    "key_risk_factors": ["flood zone", "2021 major claim"]
  },
  "client_summary": {"relationship_duration": "Since 2018", "payment_history": "Good"},
  "negotiation_context": {"current_objections": ["Premium too high compared to market"]},
  "comparable_deals": {"similar_deals": [{"reference_deal_id": "DEAL101", "outcome_summary": "$200K premium"}]},
  "relevant_domain_knowledge": [{"chunk_id": "sample_1", "relevance_reason": "premium objection"}],
  "key_insights": ["Client has accepted deductible trades before"]
}"#;

const SELECTION: &str = r#"[
  {"chunk_id": "sample_1", "relevance_reason": "Premium objection", "application_context": "Counter offer"},
  {"chunk_id": "sample_4", "relevance_reason": "Deductible proportionality", "application_context": "Deductible trade"},
  {"chunk_id": "sample_99", "relevance_reason": "Invented"}
]"#;

const GAPS: &str = r#"{"information_gaps": [
  {"gap_description": "Flood elevation certificate", "recommended_action": "Request from broker", "priority": 1},
  {"gap_description": "Updated property valuation", "priority": 2}
]}"#;

const STRATEGY: &str = r#"{
  "conservative": [{"recommendation": "Hold premium, offer quarterly payments", "confidence_level": "High"}],
  "moderate": [{"recommendation": "Reduce premium to $235K with $150K deductible"}],
  "aggressive": [{"recommendation": "Reduce premium to $215K with $200K deductible"}],
  "quote_constraints": {"MFP": "$200K", "RTP": "$235K", "WAP": "$210K"}
}"#;

const RATIONALE: &str = r#"{
  "conservative_rationale": "Protects margin given the 2021 claim.",
  "moderate_rationale": "Uses the client's history of deductible trades.",
  "aggressive_rationale": "Matches DEAL101 outcome.",
  "decision_factors": ["premium objection", "flood exposure"]
}"#;

fn script() -> Vec<&'static str> {
    vec![CONTEXT_SUMMARY, SELECTION, GAPS, STRATEGY, RATIONALE]
}

fn pipeline_with(generator: Arc<dyn TextGenerator>, store: KnowledgeStore) -> NegotiationPipeline {
    NegotiationPipeline::standard(
        Arc::new(InMemoryDealRepository::with_samples()),
        None,
        Arc::new(store),
        generator,
    )
    .expect("standard pipeline is valid")
}

fn pipeline(generator: Arc<dyn TextGenerator>) -> NegotiationPipeline {
    pipeline_with(generator, KnowledgeStore::with_samples())
}

const OWNED_FIELDS: &[&str] = &[
    "deal_context",
    "submission_files",
    "domain_knowledge",
    "context_summary",
    "relevant_domain_knowledge",
    "information_gaps",
    "decision_basis",
    "strategy",
    "rationale",
    "reasoning_steps",
];

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deal123_runs_all_stages_with_premium_heuristic() {
    let generator = Arc::new(ScriptedGenerator::new(script()));
    let p = pipeline(generator.clone());
    assert_eq!(
        p.stage_names(),
        vec![
            "fetch_deal_context",
            "fetch_domain_knowledge",
            "analyze_context",
            "select_relevant_knowledge",
            "identify_information_gaps",
            "generate_strategy",
            "explain_rationale",
        ]
    );

    let state = p.run("DEAL123", None).await.unwrap();

    for field in OWNED_FIELDS {
        assert!(!state[*field].is_null(), "{field} should be written");
    }
    assert_eq!(state["deal_context"]["submission"]["deal_id"], "DEAL123");
    assert_eq!(state["domain_knowledge"].as_array().unwrap().len(), 5);

    let decisions = state["decision_basis"].as_array().unwrap();
    assert_eq!(decisions[0]["heuristic"], "Premium Objection → Deductible Trade");
    assert_eq!(decisions[0]["confidence"], "High");
    assert_eq!(decisions[1]["heuristic"], "High Risk → Enhanced Coverage");

    let strategy_prompt = &generator.prompts()[3];
    assert!(strategy_prompt.starts_with(prompts::STRATEGY_HEADING));
    assert!(strategy_prompt.contains(
        "- Premium Objection → Deductible Trade: Client objected to premium and has history of accepting deductible adjustments (Confidence: High)"
    ));
    assert!(strategy_prompt.contains("Flood elevation certificate (Priority: 1"));

    assert_eq!(state["strategy"]["quote_constraints"]["RTP"], "$235K");
    assert_eq!(state["rationale"]["decision_factors"][1], "flood exposure");
    assert_eq!(
        state["context_summary"]["relevant_domain_knowledge"][0]["chunk"]["chunk_id"],
        "sample_1"
    );

    let steps: Vec<&str> = state["reasoning_steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert_eq!(
        steps[0],
        "Proposed strategy: 1 conservative, 1 moderate and 1 aggressive recommendations"
    );
    assert!(steps.contains(&"Decision basis:"));
    assert_eq!(generator.call_count(), 5);
}

#[tokio::test]
async fn invented_citations_are_dropped_and_traced() {
    let generator = Arc::new(ScriptedGenerator::new(script()));
    let outcome = pipeline(generator).execute("DEAL123", None).await;
    let state = outcome.result.unwrap();

    let relevant = state.relevant_domain_knowledge().unwrap();
    let ids: Vec<_> = relevant.iter().map(|i| i.chunk.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["sample_1", "sample_4"]);

    // Selected items share the chunk fetched earlier in the run.
    let fetched = state
        .domain_knowledge()
        .unwrap()
        .iter()
        .find(|c| c.chunk_id == "sample_1")
        .unwrap();
    assert!(Arc::ptr_eq(&relevant[0].chunk, fetched));

    let trace = outcome.trace.stage("select_relevant_knowledge").unwrap();
    assert_eq!(trace.metrics["dropped_references"][0], "sample_99");
    assert_eq!(trace.metrics["selected_chunks"], 2);
    assert_eq!(outcome.trace.status, TraceStatus::Success);
    assert_eq!(outcome.trace.stages.len(), 7);
}

#[tokio::test]
async fn identical_generation_gives_identical_state() {
    let first = pipeline(Arc::new(ScriptedGenerator::new(script())))
        .run("DEAL123", None)
        .await
        .unwrap();
    let second = pipeline(Arc::new(ScriptedGenerator::new(script())))
        .run("DEAL123", None)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn garbage_responses_give_shape_valid_records() {
    let generator = Arc::new(FixedGenerator::new("I'm sorry, I can't help with that."));
    let p = pipeline(generator.clone());
    let outcome = p.execute("DEAL001", None).await;
    let state = outcome.result.unwrap().to_value().unwrap();

    for level in ["conservative", "moderate", "aggressive"] {
        assert_eq!(state["strategy"][level], serde_json::json!([]));
    }
    for key in ["MFP", "RTP", "WAP"] {
        assert!(state["strategy"]["quote_constraints"][key].is_null());
    }
    for key in [
        "conservative_rationale",
        "moderate_rationale",
        "aggressive_rationale",
    ] {
        assert_eq!(state["rationale"][key], "");
    }
    for key in [
        "deal_summary",
        "client_summary",
        "negotiation_context",
        "comparable_deals",
    ] {
        assert!(state["context_summary"][key].is_object(), "{key}");
    }
    assert_eq!(state["information_gaps"], serde_json::json!([]));
    // Heuristics do not depend on generation.
    assert_eq!(
        state["decision_basis"][0]["heuristic"],
        "Premium Objection → Deductible Trade"
    );
    assert_eq!(generator.call_count(), 5);

    let fallbacks = outcome
        .trace
        .stages
        .iter()
        .filter(|s| s.metrics.get("parse_status").and_then(|v| v.as_str()) == Some("fallback"))
        .count();
    assert_eq!(fallbacks, 5);
}

#[tokio::test]
async fn truncated_strategy_is_repaired() {
    let truncated = r#"{"conservative": [], "moderate": [], "aggressive": [], "quote_constraints": {"MFP": "$190K""#;
    let generator = Arc::new(ScriptedGenerator::new(vec![
        CONTEXT_SUMMARY,
        SELECTION,
        GAPS,
        truncated,
        RATIONALE,
    ]));
    let p = pipeline(generator);
    let mut events = p.subscribe();
    let outcome = p.execute("DEAL123", None).await;
    let state = outcome.result.unwrap();
    assert_eq!(
        state.strategy().unwrap().quote_constraints.mfp.as_deref(),
        Some("$190K")
    );

    let mut recovered = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::ResponseRecovered {
            stage, parse_status, ..
        } = event
        {
            recovered.push((stage, parse_status));
        }
    }
    assert_eq!(
        recovered,
        vec![("generate_strategy".to_string(), "repaired".to_string())]
    );
}

#[tokio::test]
async fn routed_generation_by_prompt_heading() {
    let generator = RoutedGenerator::new("{}")
        .route(prompts::ANALYZE_CONTEXT_HEADING, CONTEXT_SUMMARY)
        .route(prompts::SELECT_KNOWLEDGE_HEADING, SELECTION)
        .route(prompts::INFORMATION_GAPS_HEADING, GAPS)
        .route(prompts::STRATEGY_HEADING, STRATEGY)
        .route(prompts::RATIONALE_HEADING, RATIONALE);
    let state = pipeline(Arc::new(generator))
        .run("DEAL001", None)
        .await
        .unwrap();
    assert_eq!(state["information_gaps"][0]["priority"], 1);
    assert_eq!(
        state["rationale"]["aggressive_rationale"],
        "Matches DEAL101 outcome."
    );
}

#[tokio::test]
async fn submission_documents_reach_the_analysis_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("SUB42");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(sub.join("broker_note.txt"), "Insured installed flood barriers in 2024.").unwrap();

    let generator = Arc::new(ScriptedGenerator::new(script()));
    let p = NegotiationPipeline::standard(
        Arc::new(InMemoryDealRepository::with_samples()),
        Some(dir.path().to_path_buf()),
        Arc::new(KnowledgeStore::with_samples()),
        generator.clone(),
    )
    .unwrap();

    let state = p.run("DEAL123", Some("SUB42")).await.unwrap();
    assert_eq!(state["submission_id"], "SUB42");
    assert_eq!(
        state["submission_files"]["broker_note.txt"],
        "Insured installed flood barriers in 2024."
    );
    assert!(generator.prompts()[0].contains("### broker_note.txt"));
}

#[tokio::test]
async fn every_stage_reports_completion() {
    let p = pipeline(Arc::new(ScriptedGenerator::new(script())));
    let mut events = p.subscribe();
    p.run("DEAL123", None).await.unwrap();

    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::StageCompleted {
            stage,
            fields_written,
            ..
        } = event
        {
            completed.push((stage, fields_written));
        }
    }
    assert_eq!(completed.len(), 7);
    assert_eq!(completed[5].0, "generate_strategy");
    assert_eq!(completed[5].1, vec!["decision_basis", "strategy"]);
}

// ---------------------------------------------------------------------------
// Failed runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_deal_aborts_before_generation() {
    let generator = Arc::new(ScriptedGenerator::new(script()));
    let outcome = pipeline(generator.clone()).execute("DEAL404", None).await;

    let err = outcome.result.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, NegotiatorError::DealNotFound { ref deal_id } if deal_id == "DEAL404"));
    assert_eq!(generator.call_count(), 0);
    assert_eq!(outcome.trace.status, TraceStatus::Failed);
    assert_eq!(outcome.trace.stages.len(), 1);
}

#[tokio::test]
async fn empty_knowledge_store_stops_at_analysis() {
    let generator = Arc::new(ScriptedGenerator::new(script()));
    let err = pipeline_with(generator.clone(), KnowledgeStore::new())
        .run("DEAL123", None)
        .await
        .unwrap_err();
    match err {
        NegotiatorError::MissingField { stage, field } => {
            assert_eq!(stage, "analyze_context");
            assert_eq!(field, "domain_knowledge");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn generation_errors_abort_the_run() {
    let generator = Arc::new(ScriptedGenerator::new(vec![CONTEXT_SUMMARY, SELECTION]));
    let outcome = pipeline(generator).execute("DEAL123", None).await;
    let err = outcome.result.unwrap_err();
    assert!(err.to_string().contains("exhausted"));

    let statuses: Vec<_> = outcome.trace.stages.iter().map(|s| s.status).collect();
    assert_eq!(statuses.len(), 5);
    assert!(statuses[..4].iter().all(|s| *s == TraceStatus::Success));
    assert_eq!(statuses[4], TraceStatus::Failed);
    assert_eq!(outcome.trace.stages[4].stage, "identify_information_gaps");
}
