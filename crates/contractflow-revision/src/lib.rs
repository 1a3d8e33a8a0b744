//! Contract revision arithmetic.
//!
//! A contract revision is a `MAJOR.MINOR.PATCH` string. The next revision is a
//! pure function of the current one and the kind of change that produced the
//! new contract:
//!
//! | Change | Effect |
//! |--------|--------|
//! | `bug_fix` | patch + 1 |
//! | `spec_regen` | minor + 1, patch = 0 |
//! | `planner_regen` | major + 1, minor = 0, patch = 0 |
//!
//! Nothing in this crate touches shared state; the coordinator computes the
//! revision here and commits it through its normal write path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;

/// Revision assigned to the first contract of a run.
pub const INITIAL_REVISION: &str = "1.0.0";

/// Classification of a contract change.
///
/// ```rust
/// use contractflow_revision::ChangeKind;
///
/// assert_eq!(ChangeKind::SpecRegen.to_string(), "spec_regen");
/// assert_eq!("planner_regen".parse::<ChangeKind>().unwrap(), ChangeKind::PlannerRegen);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    /// Corrective amendment of an otherwise unchanged contract.
    BugFix,
    /// Contract-only regeneration against the same plan.
    SpecRegen,
    /// Business-level regeneration: the plan changed and the contract was rebuilt.
    PlannerRegen,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("Invalid revision format '{value}': expected MAJOR.MINOR.PATCH")]
    InvalidFormat { value: String },

    #[error("Revision '{value}' cannot be incremented without overflow")]
    Overflow { value: String },

    #[error("Revision regressed from '{previous}' to '{next}'")]
    Regressed { previous: String, next: String },
}

/// A parsed `MAJOR.MINOR.PATCH` revision.
///
/// Ordering is numeric per component, most significant first.
///
/// ```rust
/// use contractflow_revision::Revision;
///
/// let a: Revision = "1.9.0".parse().unwrap();
/// let b: Revision = "1.10.0".parse().unwrap();
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Revision {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    #[must_use]
    pub const fn initial() -> Self {
        Self::new(1, 0, 0)
    }

    /// Apply a change to this revision.
    pub fn bump(self, change: ChangeKind) -> Result<Self, RevisionError> {
        let overflow = || RevisionError::Overflow {
            value: self.to_string(),
        };
        let next = match change {
            ChangeKind::BugFix => Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            ),
            ChangeKind::SpecRegen => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            ChangeKind::PlannerRegen => {
                Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0)
            }
        };
        Ok(next)
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RevisionError::InvalidFormat {
            value: s.to_string(),
        };

        let mut parts = s.split('.');
        let mut next_component = || -> Result<u64, RevisionError> {
            let part = parts.next().ok_or_else(invalid)?;
            // u64::from_str accepts a leading '+', which is not a revision digit
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u64>().map_err(|_| invalid())
        };

        let major = next_component()?;
        let minor = next_component()?;
        let patch = next_component()?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }
}

impl Serialize for Revision {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the revision that follows `revision` for the given change.
///
/// ```rust
/// use contractflow_revision::{ChangeKind, increment};
///
/// assert_eq!(increment("1.2.3", ChangeKind::BugFix).unwrap(), "1.2.4");
/// assert_eq!(increment("1.0.5", ChangeKind::SpecRegen).unwrap(), "1.1.0");
/// assert_eq!(increment("1.2.3", ChangeKind::PlannerRegen).unwrap(), "2.0.0");
/// assert!(increment("1.2", ChangeKind::BugFix).is_err());
/// ```
pub fn increment(revision: &str, change: ChangeKind) -> Result<String, RevisionError> {
    let current: Revision = revision.parse()?;
    Ok(current.bump(change)?.to_string())
}

/// Fail with [`RevisionError::Regressed`] when `next` orders before `previous`.
pub fn ensure_monotonic(previous: &str, next: &str) -> Result<(), RevisionError> {
    let prev: Revision = previous.parse()?;
    let nxt: Revision = next.parse()?;
    if nxt < prev {
        return Err(RevisionError::Regressed {
            previous: previous.to_string(),
            next: next.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rule_table() {
        assert_eq!(increment("1.2.3", ChangeKind::BugFix).unwrap(), "1.2.4");
        assert_eq!(increment("1.0.5", ChangeKind::SpecRegen).unwrap(), "1.1.0");
        assert_eq!(increment("1.2.3", ChangeKind::PlannerRegen).unwrap(), "2.0.0");
        assert_eq!(increment("0.0.0", ChangeKind::BugFix).unwrap(), "0.0.1");
    }

    #[test]
    fn test_rejects_malformed_revisions() {
        for bad in [
            "1.2", "1.2.3.4", "", "1..3", "a.b.c", "1.2.x", "-1.2.3", "+1.2.3", " 1.2.3", "1.2.3 ",
            "1.2.3-beta", "v1.2.3", "99999999999999999999.0.0",
        ] {
            let err = increment(bad, ChangeKind::BugFix).unwrap_err();
            assert_eq!(
                err,
                RevisionError::InvalidFormat {
                    value: bad.to_string()
                },
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_overflow_is_reported() {
        let max = format!("1.2.{}", u64::MAX);
        assert!(matches!(
            increment(&max, ChangeKind::BugFix),
            Err(RevisionError::Overflow { .. })
        ));
        // spec_regen resets patch, so a saturated patch is fine
        assert_eq!(increment(&max, ChangeKind::SpecRegen).unwrap(), "1.3.0");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let rev = Revision::new(3, 1, 4);
        assert_eq!(serde_json::to_string(&rev).unwrap(), r#""3.1.4""#);
        let back: Revision = serde_json::from_str(r#""3.1.4""#).unwrap();
        assert_eq!(back, rev);
        assert!(serde_json::from_str::<Revision>(r#""3.1""#).is_err());
    }

    #[test]
    fn test_ensure_monotonic() {
        assert!(ensure_monotonic("1.0.0", "1.0.0").is_ok());
        assert!(ensure_monotonic("1.9.9", "2.0.0").is_ok());
        assert!(matches!(
            ensure_monotonic("1.10.0", "1.9.0"),
            Err(RevisionError::Regressed { .. })
        ));
    }

    fn change_kind() -> impl Strategy<Value = ChangeKind> {
        prop_oneof![
            Just(ChangeKind::BugFix),
            Just(ChangeKind::SpecRegen),
            Just(ChangeKind::PlannerRegen),
        ]
    }

    proptest! {
        #[test]
        fn prop_increment_strictly_increases(
            major in 0u64..1000,
            minor in 0u64..1000,
            patch in 0u64..1000,
            change in change_kind(),
        ) {
            let current = Revision::new(major, minor, patch);
            let next = current.bump(change).unwrap();
            prop_assert!(next > current);
        }

        #[test]
        fn prop_sequences_never_regress(changes in proptest::collection::vec(change_kind(), 1..40)) {
            let mut revision = INITIAL_REVISION.to_string();
            for change in changes {
                let next = increment(&revision, change).unwrap();
                prop_assert!(ensure_monotonic(&revision, &next).is_ok());
                revision = next;
            }
        }

        #[test]
        fn prop_display_parse_agree(major in any::<u64>(), minor in any::<u64>(), patch in any::<u64>()) {
            let rev = Revision::new(major, minor, patch);
            let parsed: Revision = rev.to_string().parse().unwrap();
            prop_assert_eq!(parsed, rev);
        }
    }
}
