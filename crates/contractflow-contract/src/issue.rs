use serde::{Deserialize, Serialize};
use strum::Display;

/// Severity of a drift finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    /// Hard drift: blocks progress.
    Error,
    /// Soft drift: recorded, never blocks.
    Warning,
}

/// Which upstream document a hard-drift finding implicates.
///
/// Routing from `VALIDATION` follows this: requirements findings go back to
/// `PLANNING`, contract findings to `SPEC_GENERATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Attribution {
    #[default]
    Contract,
    Requirements,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub rule: String,
    pub level: Level,
    pub message: String,
    pub location: String,
    #[serde(default)]
    pub attribution: Attribution,
}

impl Issue {
    pub fn error(rule: &str, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            level: Level::Error,
            message: message.into(),
            location: location.into(),
            attribution: Attribution::Contract,
        }
    }

    pub fn warning(rule: &str, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            ..Self::error(rule, location, message)
        }
    }

    #[must_use]
    pub fn attributed_to(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
}

/// Outcome of a validation pass.
///
/// `status` is derived from `issues` on every construction and mutation,
/// including deserialization: a persisted `"status": "pass"` next to an
/// error-level issue reads back as `fail`.
///
/// ```rust
/// use contractflow_contract::{Issue, ReportStatus, ValidationReport};
///
/// let mut report = ValidationReport::default();
/// assert_eq!(report.status(), ReportStatus::Pass);
///
/// report.push(Issue::warning("undeclared_endpoint", "/health", "not in contract"));
/// assert_eq!(report.status(), ReportStatus::Pass);
///
/// report.push(Issue::error("missing_endpoint", "/users", "GET /users not implemented"));
/// assert_eq!(report.status(), ReportStatus::Fail);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    status: ReportStatus,
    issues: Vec<Issue>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(issues: Vec<Issue>) -> Self {
        let status = Self::derive_status(&issues);
        Self { status, issues }
    }

    fn derive_status(issues: &[Issue]) -> ReportStatus {
        if issues.iter().any(Issue::is_error) {
            ReportStatus::Fail
        } else {
            ReportStatus::Pass
        }
    }

    #[must_use]
    pub const fn status(&self) -> ReportStatus {
        self.status
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ReportStatus::Pass
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
        self.status = Self::derive_status(&self.issues);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
        self.status = Self::derive_status(&self.issues);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Warning)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    #[must_use]
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Wire form. `status` is accepted and discarded. The legacy
/// `{errors: [..], warnings: [..]}` string-list form is folded into issues.
#[derive(Deserialize)]
struct RawValidationReport {
    #[serde(default)]
    #[allow(dead_code)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl<'de> Deserialize<'de> for ValidationReport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawValidationReport::deserialize(deserializer)?;
        let mut issues = raw.issues;
        issues.extend(
            raw.errors
                .into_iter()
                .map(|message| Issue::error("contract_error", "api_spec", message)),
        );
        issues.extend(
            raw.warnings
                .into_iter()
                .map(|message| Issue::warning("contract_warning", "api_spec", message)),
        );
        Ok(Self::new(issues))
    }
}

/// Output of the optional validator stage (`validation_findings`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFindings {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}
