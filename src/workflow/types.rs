/// Core workflow type definitions
///
/// Defines workflows, steps and links in the shape the editor stores them.
/// These types are serialized/deserialized from JSON for persistence; step
/// configuration stays in its wire form here and is parsed into a typed
/// [`StepKind`](crate::workflow::step::StepKind) at dispatch time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complete workflow definition containing steps and their connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier, generated on create when absent
    #[serde(default)]
    pub id: String,
    /// Human-readable workflow name
    #[serde(default = "default_workflow_name")]
    pub name: String,
    /// Owning user; webhook runs execute on this user's behalf
    #[serde(default = "default_owner", alias = "createdBy")]
    pub owner_id: String,
    /// Steps in editor order
    #[serde(rename = "nodes")]
    pub steps: Vec<Step>,
    /// Links in editor order; the order decides which successor is followed
    #[serde(rename = "edges")]
    pub links: Vec<Link>,
}

fn default_workflow_name() -> String {
    "Untitled Workflow".to_string()
}

fn default_owner() -> String {
    "default-user".to_string()
}

/// A single step in the workflow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique step identifier within the workflow (e.g., "httpRequest-1")
    pub id: String,
    /// Type tag (e.g., "manualTrigger", "httpRequest")
    #[serde(rename = "type")]
    pub step_type: String,
    /// Type-specific configuration as the editor saved it
    #[serde(default)]
    pub data: Value,
    /// Canvas position, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
}

impl Step {
    /// Which trigger kind this step starts, if any
    ///
    /// The editor sometimes stores the real type inside `data.type`, and older
    /// manual triggers are only recognisable by their label.
    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        let data_type = self.data.get("type").and_then(Value::as_str);
        let is = |tag: &str| self.step_type == tag || data_type == Some(tag);

        if is("webhookTrigger") {
            Some(TriggerKind::Webhook)
        } else if is("manualTrigger")
            || self.data.get("label").and_then(Value::as_str) == Some("Manual Trigger")
        {
            Some(TriggerKind::Manual)
        } else {
            None
        }
    }
}

/// Directed connection between two steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub id: String,
    /// Source step ID
    pub source: String,
    /// Target step ID
    pub target: String,
    /// Editor decorations (animated, labels...), ignored by execution
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// How a run was invoked; selects the entry step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Manual,
    Webhook,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::Manual => write!(f, "manual"),
            TriggerKind::Webhook => write!(f, "webhook"),
        }
    }
}

impl Workflow {
    /// First step, in editor order, that starts runs of the given kind
    pub fn entry_step(&self, kind: TriggerKind) -> Option<&Step> {
        self.steps.iter().find(|s| s.trigger_kind() == Some(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, step_type: &str, data: Value) -> Step {
        Step { id: id.into(), step_type: step_type.into(), data, position: None }
    }

    #[test]
    fn trigger_detection_honours_data_type_and_label() {
        assert_eq!(step("a", "manualTrigger", json!({})).trigger_kind(), Some(TriggerKind::Manual));
        assert_eq!(step("b", "custom", json!({"type": "webhookTrigger"})).trigger_kind(), Some(TriggerKind::Webhook));
        assert_eq!(step("c", "custom", json!({"label": "Manual Trigger"})).trigger_kind(), Some(TriggerKind::Manual));
        assert_eq!(step("d", "httpRequest", json!({"url": "x"})).trigger_kind(), None);
    }

    #[test]
    fn entry_step_picks_first_matching_kind() {
        let wf = Workflow {
            id: "wf".into(),
            name: "n".into(),
            owner_id: "u".into(),
            steps: vec![
                step("hook", "webhookTrigger", json!({})),
                step("m1", "manualTrigger", json!({})),
                step("m2", "manualTrigger", json!({})),
            ],
            links: vec![],
        };
        assert_eq!(wf.entry_step(TriggerKind::Manual).map(|s| s.id.as_str()), Some("m1"));
        assert_eq!(wf.entry_step(TriggerKind::Webhook).map(|s| s.id.as_str()), Some("hook"));
    }

    #[test]
    fn editor_json_deserializes() {
        let wf: Workflow = serde_json::from_value(json!({
            "name": "Demo",
            "createdBy": "user-1",
            "nodes": [{"id": "t", "type": "manualTrigger", "data": {}, "position": {"x": 0, "y": 0}}],
            "edges": [{"id": "e1", "source": "t", "target": "x", "animated": true}]
        }))
        .unwrap();
        assert_eq!(wf.owner_id, "user-1");
        assert_eq!(wf.links[0].extra.get("animated"), Some(&json!(true)));
        assert!(wf.id.is_empty());
    }
}
