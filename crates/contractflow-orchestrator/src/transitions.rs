//! Phase transition table.
//!
//! ```text
//! INIT → PLANNING → SPEC_GENERATION → BACKEND_GENERATION → FRONTEND_GENERATION → VALIDATION → COMPLETED
//!                ↑                ↑                                                    │
//!                └────────────────┴──────────────── regeneration ──────────────────────┘
//! any non-terminal phase → FAILED
//! ```
//!
//! `COMPLETED` and `FAILED` are absorbing. The only way into `COMPLETED` is
//! the validation-pass edge.

use contractflow_utils::error::FlowError;
use contractflow_utils::types::{Phase, TransitionKind};

/// Classify the edge `from → to`, or `None` if the table has no such edge.
#[must_use]
pub fn edge_kind(from: Phase, to: Phase) -> Option<TransitionKind> {
    if from.is_terminal() {
        return None;
    }
    if to == Phase::Failed {
        return Some(TransitionKind::Failure);
    }
    if from.forward() == Some(to) {
        return Some(TransitionKind::Forward);
    }
    match (from, to) {
        (Phase::Validation, Phase::SpecGeneration | Phase::Planning) => {
            Some(TransitionKind::Regeneration)
        }
        _ => None,
    }
}

/// Like [`edge_kind`], as an error for callers that must not proceed.
pub fn check_transition(from: Phase, to: Phase) -> Result<TransitionKind, FlowError> {
    if from.is_terminal() {
        return Err(FlowError::RunTerminated {
            phase: from.as_str().to_string(),
        });
    }
    edge_kind(from, to).ok_or_else(|| FlowError::InvalidTransition {
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    })
}

/// Phase whose completion makes `phase` the next one to run.
#[must_use]
pub const fn predecessor(phase: Phase) -> Phase {
    match phase {
        Phase::Init | Phase::Planning => Phase::Init,
        Phase::SpecGeneration => Phase::Planning,
        Phase::BackendGeneration => Phase::SpecGeneration,
        Phase::FrontendGeneration => Phase::BackendGeneration,
        Phase::Validation | Phase::Completed | Phase::Failed => Phase::FrontendGeneration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_forward_chain() {
        let mut phase = Phase::Init;
        let mut seen = vec![phase];
        while let Some(next) = phase.forward() {
            assert_eq!(edge_kind(phase, next), Some(TransitionKind::Forward));
            phase = next;
            seen.push(phase);
        }
        assert_eq!(phase, Phase::Completed);
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_no_skipping_phases() {
        assert!(check_transition(Phase::Planning, Phase::BackendGeneration).is_err());
        assert!(check_transition(Phase::Init, Phase::SpecGeneration).is_err());
        assert!(check_transition(Phase::BackendGeneration, Phase::Validation).is_err());
    }

    #[test]
    fn test_completed_only_from_validation() {
        for from in Phase::iter() {
            let allowed = edge_kind(from, Phase::Completed).is_some();
            assert_eq!(allowed, from == Phase::Validation, "{from} -> COMPLETED");
        }
    }

    #[test]
    fn test_regeneration_edges() {
        assert_eq!(
            edge_kind(Phase::Validation, Phase::SpecGeneration),
            Some(TransitionKind::Regeneration)
        );
        assert_eq!(
            edge_kind(Phase::Validation, Phase::Planning),
            Some(TransitionKind::Regeneration)
        );
        assert_eq!(edge_kind(Phase::FrontendGeneration, Phase::SpecGeneration), None);
    }

    #[test]
    fn test_failed_reachable_and_terminals_absorbing() {
        for from in Phase::iter() {
            for to in Phase::iter() {
                if from.is_terminal() {
                    assert!(matches!(
                        check_transition(from, to),
                        Err(FlowError::RunTerminated { .. })
                    ));
                } else if to == Phase::Failed {
                    assert_eq!(edge_kind(from, to), Some(TransitionKind::Failure));
                }
            }
        }
    }

    #[test]
    fn test_predecessor_forward_roundtrip() {
        for phase in [
            Phase::Planning,
            Phase::SpecGeneration,
            Phase::BackendGeneration,
            Phase::FrontendGeneration,
            Phase::Validation,
        ] {
            assert_eq!(predecessor(phase).forward(), Some(phase));
        }
    }

    fn phase() -> impl proptest::strategy::Strategy<Value = Phase> {
        proptest::sample::select(Phase::iter().collect::<Vec<_>>())
    }

    proptest::proptest! {
        #[test]
        fn prop_check_agrees_with_table(from in phase(), to in phase()) {
            let checked = check_transition(from, to).ok();
            proptest::prop_assert_eq!(checked, edge_kind(from, to));
        }

        #[test]
        fn prop_random_walks_stay_on_the_table(choices in proptest::collection::vec(0usize..8, 1..30)) {
            let mut phase = Phase::Init;
            for choice in choices {
                let targets: Vec<Phase> = Phase::iter().filter(|to| edge_kind(phase, *to).is_some()).collect();
                let Some(next) = targets.get(choice % targets.len().max(1)).copied() else {
                    proptest::prop_assert!(phase.is_terminal());
                    break;
                };
                proptest::prop_assert!(!phase.is_terminal());
                phase = next;
            }
        }
    }
}
