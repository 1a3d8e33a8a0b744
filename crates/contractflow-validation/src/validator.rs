//! Contract-driven compliance checking.
//!
//! The validator enumerates what the contract requires of a report and looks
//! for it in the report's declared coverage. It never infers requirements
//! from the report. Matching runs in passes over the unmatched remainder:
//!
//! 1. exact `METHOD path` match
//! 2. same path, different method → `method_mismatch` (error)
//! 3. same logical name (operation id, or normalized path + method) →
//!    `renamed_or_missing` (one error instead of a missing/extra pair)
//! 4. nothing found → `missing_endpoint` / `missing_integration` (error)
//!
//! Declared coverage left over after all passes is undeclared drift, a
//! warning by default.

use contractflow_contract::{
    ApiIntegration, Attribution, BackendReport, ComplianceStatus, Contract, ContractOperation,
    FrontendReport, ImplementedEndpoint, Issue, Level, ProjectPlan, ValidationReport,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use strum::{Display, EnumString};

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}/]*\}|:[A-Za-z_][A-Za-z0-9_]*").expect("static path regex"));

/// Collapse parameter names, case and trailing slashes so that renamed
/// endpoints compare equal.
///
/// ```rust
/// use contractflow_validation::normalize_path;
///
/// assert_eq!(normalize_path("/Users/{userId}/"), "/users/{}");
/// assert_eq!(normalize_path("/users/:id"), "/users/{}");
/// assert_eq!(normalize_path("/"), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let collapsed = PATH_PARAM.replace_all(path.trim(), "{}");
    let lowered = collapsed.to_ascii_lowercase();
    let stripped = lowered.trim_end_matches('/');
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

/// One unit of coverage a report claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageEntry {
    pub path: String,
    /// Uppercased
    pub method: String,
    pub operation_id: Option<String>,
}

impl CoverageEntry {
    fn new(path: &str, method: &str, operation_id: Option<&String>) -> Self {
        Self {
            path: path.to_string(),
            method: method.trim().to_ascii_uppercase(),
            operation_id: operation_id.cloned(),
        }
    }

    fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

impl From<&ImplementedEndpoint> for CoverageEntry {
    fn from(e: &ImplementedEndpoint) -> Self {
        Self::new(&e.path, &e.method, e.operation_id.as_ref())
    }
}

impl From<&ApiIntegration> for CoverageEntry {
    fn from(i: &ApiIntegration) -> Self {
        Self::new(&i.path, &i.method, i.operation_id.as_ref())
    }
}

/// A report the validator can check against a contract.
pub trait CoverageReport {
    /// `missing_endpoint`, `missing_integration`, ...
    fn missing_rule(&self) -> &'static str;
    fn undeclared_rule(&self) -> &'static str;
    /// Contract operations this kind of report must cover.
    fn required(&self, contract: &Contract) -> Vec<ContractOperation>;
    /// What the report declares it covers.
    fn coverage(&self) -> Vec<CoverageEntry>;
    fn compliance_status(&self) -> ComplianceStatus;
    /// Raw report entries, for rules that inspect extension fields.
    fn raw_entries(&self) -> Vec<(CoverageEntry, &serde_json::Map<String, Value>)>;
}

impl CoverageReport for BackendReport {
    fn missing_rule(&self) -> &'static str {
        "missing_endpoint"
    }

    fn undeclared_rule(&self) -> &'static str {
        "undeclared_endpoint"
    }

    fn required(&self, contract: &Contract) -> Vec<ContractOperation> {
        contract.operations()
    }

    fn coverage(&self) -> Vec<CoverageEntry> {
        self.implemented_endpoints.iter().map(CoverageEntry::from).collect()
    }

    fn compliance_status(&self) -> ComplianceStatus {
        self.compliance_status
    }

    fn raw_entries(&self) -> Vec<(CoverageEntry, &serde_json::Map<String, Value>)> {
        self.implemented_endpoints
            .iter()
            .map(|e| (CoverageEntry::from(e), &e.extra))
            .collect()
    }
}

impl CoverageReport for FrontendReport {
    fn missing_rule(&self) -> &'static str {
        "missing_integration"
    }

    fn undeclared_rule(&self) -> &'static str {
        "undeclared_integration"
    }

    fn required(&self, contract: &Contract) -> Vec<ContractOperation> {
        contract.operations().into_iter().filter(|op| op.frontend).collect()
    }

    fn coverage(&self) -> Vec<CoverageEntry> {
        self.api_integrations.iter().map(CoverageEntry::from).collect()
    }

    fn compliance_status(&self) -> ComplianceStatus {
        self.compliance_status
    }

    fn raw_entries(&self) -> Vec<(CoverageEntry, &serde_json::Map<String, Value>)> {
        self.api_integrations
            .iter()
            .map(|i| (CoverageEntry::from(i), &i.extra))
            .collect()
    }
}

/// Additional drift classification plugged into the validator.
pub trait DriftRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, contract: &Contract, entries: &[(CoverageEntry, &serde_json::Map<String, Value>)]) -> Vec<Issue>;
}

/// Stricter schema checking beyond presence and method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SchemaDiff {
    /// Presence and method only.
    #[default]
    Off,
    /// Schema names referenced by report entries must exist in the contract (warning).
    Reference,
    /// As `reference`, but unknown schema names are hard drift.
    Strict,
}

/// Flags report entries whose `request_schema` / `response_schema` name a
/// schema the contract does not define.
#[derive(Debug, Clone, Copy)]
pub struct SchemaReferenceRule {
    level: Level,
}

impl SchemaReferenceRule {
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl DriftRule for SchemaReferenceRule {
    fn name(&self) -> &'static str {
        "schema_reference"
    }

    fn check(&self, contract: &Contract, entries: &[(CoverageEntry, &serde_json::Map<String, Value>)]) -> Vec<Issue> {
        let known = contract.openapi_spec.schema_names();
        let mut issues = Vec::new();
        for (entry, extra) in entries {
            for field in ["request_schema", "response_schema"] {
                let Some(name) = extra.get(field).and_then(Value::as_str) else {
                    continue;
                };
                if !known.iter().any(|k| k == name) {
                    let message = format!(
                        "{} references schema '{name}' in {field}, which the contract does not define",
                        entry.label()
                    );
                    issues.push(Issue {
                        rule: "unknown_schema".to_string(),
                        level: self.level,
                        message,
                        location: entry.path.clone(),
                        attribution: Attribution::Contract,
                    });
                }
            }
        }
        issues
    }
}

/// Checks implementation reports and plan traceability against a contract.
pub struct ContractValidator {
    undeclared_level: Level,
    rules: Vec<Box<dyn DriftRule>>,
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContractValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rules: Vec<&str> = self.rules.iter().map(|r| r.name()).collect();
        f.debug_struct("ContractValidator")
            .field("undeclared_level", &self.undeclared_level)
            .field("rules", &rules)
            .finish()
    }
}

impl ContractValidator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            undeclared_level: Level::Warning,
            rules: Vec::new(),
        }
    }

    /// Level for coverage the contract does not declare.
    #[must_use]
    pub fn with_undeclared_level(mut self, level: Level) -> Self {
        self.undeclared_level = level;
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: Box<dyn DriftRule>) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_schema_diff(self, mode: SchemaDiff) -> Self {
        match mode {
            SchemaDiff::Off => self,
            SchemaDiff::Reference => self.with_rule(Box::new(SchemaReferenceRule::new(Level::Warning))),
            SchemaDiff::Strict => self.with_rule(Box::new(SchemaReferenceRule::new(Level::Error))),
        }
    }

    /// Validate a report against the contract.
    pub fn validate<R: CoverageReport>(&self, report: &R, contract: &Contract) -> ValidationReport {
        let required = report.required(contract);
        let declared = report.coverage();
        let mut used = vec![false; declared.len()];
        let mut issues = Vec::new();

        let unmatched: Vec<&ContractOperation> = required
            .iter()
            .filter(|op| {
                let method = op.method.as_str();
                match declared
                    .iter()
                    .enumerate()
                    .position(|(i, d)| !used[i] && d.path == op.path && d.method == method)
                {
                    Some(i) => {
                        used[i] = true;
                        false
                    }
                    None => true,
                }
            })
            .collect();

        let mut still_missing = Vec::new();
        for op in unmatched {
            if let Some(i) = Self::take(&declared, &mut used, |d| d.path == op.path) {
                issues.push(Issue::error(
                    "method_mismatch",
                    op.path.clone(),
                    format!(
                        "contract declares {} but the report implements {}",
                        op.id(),
                        declared[i].label()
                    ),
                ));
            } else {
                still_missing.push(op);
            }
        }

        for op in still_missing {
            if let Some(i) = Self::take(&declared, &mut used, |d| Self::same_logical_name(op, d)) {
                issues.push(Issue::error(
                    "renamed_or_missing",
                    op.path.clone(),
                    format!(
                        "contract declares {} but the report implements {} under the same name",
                        op.id(),
                        declared[i].label()
                    ),
                ));
            } else {
                issues.push(Issue::error(
                    report.missing_rule(),
                    op.path.clone(),
                    format!("{} is declared by the contract but not implemented", op.id()),
                ));
            }
        }

        for (entry, _) in declared.iter().zip(&used).filter(|(_, u)| !**u) {
            issues.push(Issue {
                rule: report.undeclared_rule().to_string(),
                level: self.undeclared_level,
                message: format!("{} is implemented but not declared by the contract", entry.label()),
                location: entry.path.clone(),
                attribution: Attribution::Contract,
            });
        }

        if !self.rules.is_empty() {
            let entries = report.raw_entries();
            for rule in &self.rules {
                issues.extend(rule.check(contract, &entries));
            }
        }

        let mut result = ValidationReport::new(issues);
        if report.compliance_status() == ComplianceStatus::Pass && !result.passed() {
            result.push(Issue::warning(
                "compliance_status_mismatch",
                "compliance_status",
                "report claims compliance but the contract check failed",
            ));
        }
        result
    }

    /// Every contract operation tracing to a plan feature must name a feature
    /// the plan actually has. Violations are attributed to requirements.
    pub fn validate_requirements(&self, contract: &Contract, plan: &ProjectPlan) -> ValidationReport {
        let issues = contract
            .operations()
            .into_iter()
            .filter_map(|op| {
                let feature = op.requirement.as_deref()?;
                if plan.feature(feature).is_some() {
                    return None;
                }
                Some(
                    Issue::error(
                        "missing_requirement",
                        op.path.clone(),
                        format!(
                            "{} traces to feature '{feature}', which the project plan does not define",
                            op.id()
                        ),
                    )
                    .attributed_to(Attribution::Requirements),
                )
            })
            .collect();
        ValidationReport::new(issues)
    }

    fn take(
        declared: &[CoverageEntry],
        used: &mut [bool],
        pred: impl Fn(&CoverageEntry) -> bool,
    ) -> Option<usize> {
        let i = declared
            .iter()
            .enumerate()
            .position(|(i, d)| !used[i] && pred(d))?;
        used[i] = true;
        Some(i)
    }

    fn same_logical_name(op: &ContractOperation, entry: &CoverageEntry) -> bool {
        if let (Some(a), Some(b)) = (&op.operation_id, &entry.operation_id)
            && a.eq_ignore_ascii_case(b)
        {
            return true;
        }
        op.method.as_str() == entry.method && normalize_path(&op.path) == normalize_path(&entry.path)
    }
}
