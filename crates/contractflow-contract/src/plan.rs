use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Business-level plan produced by the planning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub project_name: String,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub business_goals: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub api_surface: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub auth_policy: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub tech_stack: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub fields: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectPlan {
    /// Look up a feature by name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        let wanted = name.trim();
        self.features
            .iter()
            .find(|f| f.name.trim().eq_ignore_ascii_case(wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_plan_parses() {
        let plan: ProjectPlan = serde_json::from_value(json!({"project_name": "todo"})).unwrap();
        assert_eq!(plan.project_name, "todo");
        assert!(plan.features.is_empty());
    }

    #[test]
    fn test_feature_lookup_is_case_insensitive() {
        let plan: ProjectPlan = serde_json::from_value(json!({
            "project_name": "todo",
            "features": [{"name": "User Accounts", "priority": "High", "acceptance_criteria": ["a", "b"]}],
            "deliverables_milestones": ["mvp"]
        }))
        .unwrap();
        assert!(plan.feature("  user accounts ").is_some());
        assert!(plan.feature("Billing").is_none());
        assert_eq!(plan.extra["deliverables_milestones"], json!(["mvp"]));
        assert!(plan.features[0].extra.contains_key("acceptance_criteria"));
    }

    #[test]
    fn test_missing_project_name_is_rejected() {
        assert!(serde_json::from_value::<ProjectPlan>(json!({"features": []})).is_err());
    }
}
