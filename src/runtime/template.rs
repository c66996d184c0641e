/// Variable resolution for templated step fields
///
/// Substitutes `{{token}}` placeholders with values from the current item or
/// from earlier steps' outputs. Supported token shapes:
///
/// - `{{input}}`, `{{input.field}}`, `{{input[0].field}}` - the current item
/// - `{{stepId}}`, `{{stepId.path.to.field}}`, `{{stepId[2].rows[0].Email}}`
///
/// `{{stepId.response}}` on a step whose output is a plain string (an AI
/// completion) resolves to that string.
///
/// Anything that cannot be resolved (unknown step, index out of range, missing
/// field, null) is left in the output verbatim. Resolution never fails and
/// never performs I/O.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Run-scoped map from step ID to that step's latest output
pub type NodeOutputs = HashMap<String, Value>;

/// Reserved identifier for the item currently being processed
pub const INPUT: &str = "input";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([a-zA-Z0-9_-]+)(\[(\d+)\])?(?:\.([a-zA-Z0-9_.\[\]]+))?\}\}")
        .expect("token pattern is valid")
});

static SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\]]*)((?:\[\d+\])*)$").expect("segment pattern is valid")
});

/// Resolve every token in `template` against `input` and `outputs`
pub fn resolve(template: &str, input: &Value, outputs: &NodeOutputs) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    let mut unresolved = Vec::new();
    let resolved = TOKEN.replace_all(template, |caps: &Captures| match lookup(caps, input, outputs) {
        Some(value) => stringify(value),
        None => {
            unresolved.push(caps[0].to_string());
            caps[0].to_string()
        }
    });

    if !unresolved.is_empty() {
        tracing::warn!(
            "⚠️ {} placeholder(s) could not be resolved: {} (available steps: [{}])",
            unresolved.len(),
            unresolved.join(", "),
            outputs.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
        );
    }

    resolved.into_owned()
}

/// Resolve an optional field, treating an absent field as an empty template
pub fn resolve_opt(template: Option<&str>, input: &Value, outputs: &NodeOutputs) -> String {
    template.map(|t| resolve(t, input, outputs)).unwrap_or_default()
}

fn lookup<'a>(caps: &Captures, input: &'a Value, outputs: &'a NodeOutputs) -> Option<&'a Value> {
    let identifier = &caps[1];
    let mut value = if identifier == INPUT {
        input
    } else {
        outputs.get(identifier)?
    };

    if let Some(index) = caps.get(3) {
        value = value.as_array()?.get(index.as_str().parse::<usize>().ok()?)?;
    }

    if let Some(path) = caps.get(4) {
        value = match (path.as_str(), value) {
            // AI steps output a bare string; `.response` on it means the string itself
            ("response", Value::String(_)) if identifier != INPUT => value,
            (path, value) => field_path(value, path)?,
        };
    }

    (!value.is_null()).then_some(value)
}

/// Walk a dotted path whose segments may carry `[index]` suffixes
fn field_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let parts = SEGMENT.captures(segment)?;
        let name = &parts[1];
        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name)?,
                Value::Array(items) => items.get(name.parse::<usize>().ok()?)?,
                _ => return None,
            };
        } else if parts[2].is_empty() {
            return None;
        }

        for index in parts[2]
            .split(|c: char| c == '[' || c == ']')
            .filter(|s| !s.is_empty())
        {
            current = current.as_array()?.get(index.parse::<usize>().ok()?)?;
        }
    }
    Some(current)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(pairs: &[(&str, Value)]) -> NodeOutputs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn template_without_tokens_is_unchanged() {
        let text = "Hello there, {not a token} and }} {{";
        assert_eq!(resolve(text, &json!({}), &NodeOutputs::new()), text);
    }

    #[test]
    fn input_field_resolves() {
        assert_eq!(resolve("{{input.x}}", &json!({"x": "v"}), &NodeOutputs::new()), "v");
    }

    #[test]
    fn missing_step_leaves_token() {
        assert_eq!(resolve("{{missing.x}}", &json!({}), &NodeOutputs::new()), "{{missing.x}}");
    }

    #[test]
    fn indexed_step_output_resolves() {
        let ctx = outputs(&[("stepA", json!([{"name": "a"}, {"name": "b"}]))]);
        assert_eq!(resolve("{{stepA[1].name}}", &Value::Null, &ctx), "b");
        assert_eq!(resolve("{{stepA[5].name}}", &Value::Null, &ctx), "{{stepA[5].name}}");
    }

    #[test]
    fn indexed_input_resolves() {
        let input = json!([{"email": "a@x.io"}, {"email": "b@x.io"}]);
        assert_eq!(resolve("{{input[1].email}}", &input, &NodeOutputs::new()), "b@x.io");
        assert_eq!(resolve("{{input[2].email}}", &input, &NodeOutputs::new()), "{{input[2].email}}");
        assert_eq!(resolve("{{input[0].email}}", &json!({"email": "x"}), &NodeOutputs::new()), "{{input[0].email}}");
    }

    #[test]
    fn response_on_a_string_output_is_the_string() {
        let ctx = outputs(&[("aiModel-1", json!("Summary text")), ("http", json!({"response": "field"}))]);
        assert_eq!(resolve("{{aiModel-1.response}}", &Value::Null, &ctx), "Summary text");
        assert_eq!(resolve("{{http.response}}", &Value::Null, &ctx), "field");
        assert_eq!(resolve("{{input.response}}", &json!("raw"), &ctx), "{{input.response}}");
    }

    #[test]
    fn nested_path_with_embedded_index() {
        let ctx = outputs(&[("excel-1", json!({"rows": [{"Email": "a@x.io"}, {"Email": "b@x.io"}]}))]);
        assert_eq!(resolve("to: {{excel-1.rows[1].Email}}", &Value::Null, &ctx), "to: b@x.io");
    }

    #[test]
    fn non_string_values_are_json_encoded() {
        let input = json!({"n": 3, "ok": true, "tags": ["a"]});
        assert_eq!(resolve("{{input.n}}/{{input.ok}}/{{input.tags}}", &input, &NodeOutputs::new()), "3/true/[\"a\"]");
    }

    #[test]
    fn null_and_missing_fields_stay_unresolved() {
        let input = json!({"a": null});
        assert_eq!(resolve("{{input.a}}|{{input.b}}", &input, &NodeOutputs::new()), "{{input.a}}|{{input.b}}");
    }

    #[test]
    fn input_is_reserved_even_when_a_step_is_named_input() {
        let ctx = outputs(&[("input", json!({"x": "from-step"}))]);
        assert_eq!(resolve("{{input.x}}", &json!({"x": "current"}), &ctx), "current");
    }

    #[test]
    fn mixed_tokens_resolve_independently() {
        let ctx = outputs(&[("ai", json!("Summary text"))]);
        let out = resolve("Dear {{input.name}}, {{ai}} {{nope}}", &json!({"name": "Ada"}), &ctx);
        assert_eq!(out, "Dear Ada, Summary text {{nope}}");
    }

    #[test]
    fn resolution_is_deterministic() {
        let ctx = outputs(&[("s", json!({"k": [1, 2]}))]);
        let first = resolve("{{s.k[1]}} {{s.k}}", &Value::Null, &ctx);
        assert_eq!(first, resolve("{{s.k[1]}} {{s.k}}", &Value::Null, &ctx));
        assert_eq!(first, "2 [1,2]");
    }
}
