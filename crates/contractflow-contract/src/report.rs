use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

/// Self-reported compliance of an implementation stage.
///
/// Informational only; the contract validator decides compliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplianceStatus {
    #[serde(alias = "compliant")]
    Pass,
    Partial,
    #[serde(alias = "non_compliant")]
    Fail,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Complexity {
    #[serde(alias = "Simple")]
    Simple,
    #[serde(alias = "Moderate")]
    Moderate,
    #[serde(alias = "Complex")]
    Complex,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Reference to a generated artifact, as declared by a stage.
///
/// The coordinator never reads or writes artifact contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementedEndpoint {
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the backend stage says it implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendReport {
    pub implemented_endpoints: Vec<ImplementedEndpoint>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendComponent {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A contract operation the frontend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiIntegration {
    pub path: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the frontend stage says it implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendReport {
    pub implemented_components: Vec<FrontendComponent>,
    #[serde(default)]
    pub api_integrations: Vec<ApiIntegration>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default)]
    pub compliance_status: ComplianceStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
