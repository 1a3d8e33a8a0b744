use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::issue::ValidationReport;

/// HTTP methods that may appear as operation keys under an OpenAPI path item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "HEAD" => Ok(Self::Head),
            "PATCH" => Ok(Self::Patch),
            "TRACE" => Ok(Self::Trace),
            other => Err(format!("unknown HTTP method '{other}'")),
        }
    }
}

/// `METHOD path`, the identity of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    pub path: String,
    pub method: String,
}

impl EndpointId {
    pub fn new(path: impl Into<String>, method: impl AsRef<str>) -> Self {
        Self {
            path: path.into(),
            method: method.as_ref().trim().to_ascii_uppercase(),
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// One operation declared by the contract, flattened out of its path item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractOperation {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    /// `x-frontend`: whether a frontend must integrate this operation (default true)
    pub frontend: bool,
    /// `x-requirement`: plan feature this operation traces to
    pub requirement: Option<String>,
}

impl ContractOperation {
    #[must_use]
    pub fn id(&self) -> EndpointId {
        EndpointId::new(self.path.clone(), self.method.as_str())
    }
}

/// The structural body of a contract: an OpenAPI-style document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractBody {
    #[serde(default)]
    pub paths: BTreeMap<String, Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub components: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub security: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContractBody {
    /// Every declared operation, in path then method order.
    ///
    /// Path-item keys that are not HTTP methods (`parameters`, `summary`, ...)
    /// are skipped.
    #[must_use]
    pub fn operations(&self) -> Vec<ContractOperation> {
        let mut ops = Vec::new();
        for (path, item) in &self.paths {
            let mut methods: Vec<(HttpMethod, &Value)> = item
                .iter()
                .filter_map(|(key, op)| key.parse::<HttpMethod>().ok().map(|m| (m, op)))
                .collect();
            methods.sort_by_key(|(m, _)| *m);
            for (method, op) in methods {
                ops.push(ContractOperation {
                    path: path.clone(),
                    method,
                    operation_id: op
                        .get("operationId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    frontend: op.get("x-frontend").and_then(Value::as_bool).unwrap_or(true),
                    requirement: op
                        .get("x-requirement")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        ops
    }

    /// Names of schemas under `components.schemas`.
    #[must_use]
    pub fn schema_names(&self) -> Vec<String> {
        self.components
            .get("schemas")
            .and_then(Value::as_object)
            .map(|schemas| schemas.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// The versioned contract (`api_spec`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Assigned by the coordinator on commit; stage-supplied values are replaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub openapi_spec: ContractBody,
    #[serde(default)]
    pub validation_report: ValidationReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contract {
    #[must_use]
    pub fn operations(&self) -> Vec<ContractOperation> {
        self.openapi_spec.operations()
    }
}
