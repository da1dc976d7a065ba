//! Stage sequence validation: lint rules and diagnostics.
//!
//! A sequence is checked once, when the pipeline is built. Call [`validate`]
//! for advisory diagnostics or [`validate_or_raise`] to fail on the first
//! `Error`-severity issue.

use std::collections::{HashMap, HashSet};

use negotiator_types::{NegotiatorError, Result, StateField};

use crate::stage::DynStage;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub stage: Option<String>,
    pub field: Option<StateField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic>;
}

fn error(rule: &dyn LintRule, stage: Option<&str>, field: Option<StateField>, message: String) -> Diagnostic {
    Diagnostic {
        rule: rule.name().into(),
        severity: Severity::Error,
        message,
        stage: stage.map(str::to_string),
        field,
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct NonEmptyRule;
impl LintRule for NonEmptyRule {
    fn name(&self) -> &str {
        "non_empty"
    }

    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic> {
        if stages.is_empty() {
            vec![error(self, None, None, "Pipeline has no stages".into())]
        } else {
            vec![]
        }
    }
}

struct UniqueNamesRule;
impl LintRule for UniqueNamesRule {
    fn name(&self) -> &str {
        "unique_names"
    }

    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        stages
            .iter()
            .filter(|s| !seen.insert(s.name()))
            .map(|s| {
                error(
                    self,
                    Some(s.name()),
                    None,
                    format!("Stage name '{}' is used more than once", s.name()),
                )
            })
            .collect()
    }
}

/// Each non-input field has at most one owning stage; inputs have none.
struct SingleOwnerRule;
impl LintRule for SingleOwnerRule {
    fn name(&self) -> &str {
        "single_owner"
    }

    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic> {
        let mut owners: HashMap<StateField, &str> = HashMap::new();
        let mut diags = Vec::new();
        for stage in stages {
            for &field in stage.contract().owns {
                if field.is_input() {
                    diags.push(error(
                        self,
                        Some(stage.name()),
                        Some(field),
                        format!(
                            "Stage '{}' claims input field '{field}', which only the caller sets",
                            stage.name()
                        ),
                    ));
                } else if let Some(previous) = owners.insert(field, stage.name()) {
                    diags.push(error(
                        self,
                        Some(stage.name()),
                        Some(field),
                        format!(
                            "Field '{field}' is owned by both '{previous}' and '{}'",
                            stage.name()
                        ),
                    ));
                }
            }
        }
        diags
    }
}

/// Every field a stage reads is an input or owned by an earlier stage.
struct ReadsAvailableRule;
impl LintRule for ReadsAvailableRule {
    fn name(&self) -> &str {
        "reads_available"
    }

    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic> {
        let mut available: HashSet<StateField> = StateField::INPUTS.iter().copied().collect();
        let mut diags = Vec::new();
        for stage in stages {
            let contract = stage.contract();
            for field in contract.reads() {
                if !available.contains(&field) {
                    diags.push(error(
                        self,
                        Some(stage.name()),
                        Some(field),
                        format!(
                            "Stage '{}' reads '{field}', which no earlier stage writes",
                            stage.name()
                        ),
                    ));
                }
            }
            available.extend(contract.owns.iter().copied());
        }
        diags
    }
}

/// Fields no stage writes stay empty in every result.
struct UnwrittenFieldsRule;
impl LintRule for UnwrittenFieldsRule {
    fn name(&self) -> &str {
        "unwritten_fields"
    }

    fn apply(&self, stages: &[DynStage]) -> Vec<Diagnostic> {
        let owned: HashSet<StateField> = stages
            .iter()
            .flat_map(|s| s.contract().owns.iter().copied())
            .collect();
        StateField::ALL
            .iter()
            .filter(|f| !f.is_input() && !owned.contains(f))
            .map(|&field| Diagnostic {
                rule: self.name().into(),
                severity: Severity::Warning,
                message: format!("No stage writes '{field}'"),
                stage: None,
                field: Some(field),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all built-in lint rules and return collected diagnostics.
pub fn validate(stages: &[DynStage]) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(NonEmptyRule),
        Box::new(UniqueNamesRule),
        Box::new(SingleOwnerRule),
        Box::new(ReadsAvailableRule),
        Box::new(UnwrittenFieldsRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(stages));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(stages: &[DynStage]) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(stages);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.as_str())
        .collect();
    if !errors.is_empty() {
        return Err(NegotiatorError::ValidationError(errors.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{Stage, StageContract, StageOutput};
    use async_trait::async_trait;
    use negotiator_types::PipelineState;

    struct StubStage {
        name: &'static str,
        contract: StageContract,
    }

    #[async_trait]
    impl Stage for StubStage {
        fn name(&self) -> &str {
            self.name
        }

        fn contract(&self) -> StageContract {
            self.contract
        }

        async fn execute(&self, _state: &PipelineState) -> Result<StageOutput> {
            Ok(StageOutput::new())
        }
    }

    fn stub(
        name: &'static str,
        required: &'static [StateField],
        owns: &'static [StateField],
    ) -> DynStage {
        DynStage::new(StubStage {
            name,
            contract: StageContract {
                required,
                optional: &[],
                owns,
            },
        })
    }

    fn errors(diags: &[Diagnostic]) -> Vec<&Diagnostic> {
        diags.iter().filter(|d| d.severity == Severity::Error).collect()
    }

    #[test]
    fn standard_sequence_is_valid() {
        use crate::{InMemoryDealRepository, KnowledgeStore};
        use negotiator_llm::FixedGenerator;
        use std::sync::Arc;

        let stages = crate::stages::standard_stages(
            Arc::new(InMemoryDealRepository::new()),
            None,
            Arc::new(KnowledgeStore::new()),
            Arc::new(FixedGenerator::new("{}")),
        );
        let diags = validate_or_raise(&stages).unwrap();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn empty_sequence_is_an_error() {
        let err = validate_or_raise(&[]).unwrap_err();
        assert!(err.to_string().contains("no stages"));
    }

    #[test]
    fn reading_a_later_field_is_an_error() {
        let stages = vec![
            stub("a", &[StateField::Strategy], &[StateField::DealContext]),
            stub("b", &[StateField::DealContext], &[StateField::Strategy]),
        ];
        let diags = validate(&stages);
        let errs = errors(&diags);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].rule, "reads_available");
        assert_eq!(errs[0].stage.as_deref(), Some("a"));
        assert_eq!(errs[0].field, Some(StateField::Strategy));
    }

    #[test]
    fn reading_own_output_is_an_error() {
        let stages = vec![stub("a", &[StateField::DealContext], &[StateField::DealContext])];
        let diags = validate(&stages);
        assert!(errors(&diags).iter().any(|d| d.rule == "reads_available"));
    }

    #[test]
    fn two_owners_is_an_error() {
        let stages = vec![
            stub("a", &[StateField::DealId], &[StateField::DealContext]),
            stub("b", &[StateField::DealId], &[StateField::DealContext]),
        ];
        let err = validate_or_raise(&stages).unwrap_err();
        assert!(err
            .to_string()
            .contains("Field 'deal_context' is owned by both 'a' and 'b'"));
    }

    #[test]
    fn owning_an_input_is_an_error() {
        let stages = vec![stub("a", &[], &[StateField::DealId])];
        let diags = validate(&stages);
        assert!(errors(&diags).iter().any(|d| d.rule == "single_owner"));
    }

    #[test]
    fn duplicate_names_are_an_error() {
        let stages = vec![
            stub("same", &[StateField::DealId], &[StateField::DealContext]),
            stub("same", &[StateField::DealContext], &[StateField::Strategy]),
        ];
        let diags = validate(&stages);
        let errs = errors(&diags);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].rule, "unique_names");
    }

    #[test]
    fn unwritten_fields_are_warnings() {
        let stages = vec![stub("a", &[StateField::DealId], &[StateField::DealContext])];
        let diags = validate_or_raise(&stages).unwrap();
        assert!(diags.iter().all(|d| d.severity == Severity::Warning));
        assert!(diags
            .iter()
            .any(|d| d.field == Some(StateField::ReasoningSteps)));
        assert!(!diags.iter().any(|d| d.field == Some(StateField::DealContext)));
    }
}
