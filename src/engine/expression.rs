// Expression Evaluator (C2)
//
// Supports exactly the six reference forms the component design enumerates.
// Missing lookups resolve to an empty string in template mode and `null` in
// single-expression mode; they never raise, so a node with an unresolved
// reference degrades gracefully instead of failing the whole execution.

use regex::Regex;
use serde_json::Value;

use crate::models::{NodeExecutionContext, NodeId};

pub struct ExpressionEvaluator {
    pattern: Regex,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        ExpressionEvaluator {
            pattern: Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("expression pattern is valid"),
        }
    }
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        ExpressionEvaluator::default()
    }

    pub fn contains_expression(&self, s: &str) -> bool {
        self.pattern.is_match(s)
    }

    pub fn evaluate(&self, expr: &str, ctx: &NodeExecutionContext) -> Value {
        let trimmed = expr.trim();

        if trimmed == "$json" {
            return Value::Object(ctx.input.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }
        if let Some(path) = trimmed.strip_prefix("$json.") {
            return dotted_lookup(&Value::Object(ctx.input.iter().map(|(k, v)| (k.clone(), v.clone())).collect()), path);
        }
        if let Some(rest) = trimmed.strip_prefix("$node[") {
            return evaluate_node_ref(rest, ctx);
        }
        if let Some(name) = trimmed.strip_prefix("$env.") {
            return std::env::var(name).map(Value::from).unwrap_or(Value::Null);
        }
        if trimmed == "$execution.id" {
            return Value::from(ctx.execution_id.as_str());
        }
        if trimmed == "$workflow.id" {
            return Value::from(ctx.flow_id.as_str());
        }
        if trimmed == "$now" {
            return Value::from(chrono::Utc::now().to_rfc3339());
        }

        Value::Null
    }

    pub fn evaluate_template(&self, template: &str, ctx: &NodeExecutionContext) -> String {
        self.pattern
            .replace_all(template, |caps: &regex::Captures| {
                let value = self.evaluate(&caps[1], ctx);
                value_to_template_string(&value)
            })
            .into_owned()
    }

    pub fn evaluate_config(&self, config: &Value, ctx: &NodeExecutionContext) -> Value {
        match config {
            Value::String(s) => {
                if self.contains_expression(s) {
                    Value::String(self.evaluate_template(s, ctx))
                } else {
                    Value::String(s.clone())
                }
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.evaluate_config(v, ctx)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.evaluate_config(v, ctx)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn validate_expression(&self, expr: &str) -> Result<(), String> {
        let balanced = expr.matches("{{").count() == expr.matches("}}").count();
        if balanced {
            Ok(())
        } else {
            Err(format!("unbalanced expression braces in '{}'", expr))
        }
    }
}

fn evaluate_node_ref(rest: &str, ctx: &NodeExecutionContext) -> Value {
    // rest looks like: `"nodeId"].json` or `"nodeId"].json.path`
    let end_quote = match rest.find("\"]") {
        Some(idx) => idx,
        None => return Value::Null,
    };
    let node_name = rest[1..end_quote].to_string();
    let remainder = &rest[end_quote + 2..];

    let output = match ctx.output_of(&NodeId::from(node_name)) {
        Some(v) => v,
        None => return Value::Null,
    };

    if let Some(path) = remainder.strip_prefix(".json.") {
        return dotted_lookup(output, path);
    }
    if remainder == ".json" || remainder.is_empty() {
        return output.clone();
    }
    Value::Null
}

fn dotted_lookup(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn value_to_template_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::models::{ExecutionId, FlowId, UserId, VersionId};

    fn ctx() -> NodeExecutionContext {
        let mut input = HashMap::new();
        input.insert("field".to_string(), Value::from("hello"));
        let mut previous = HashMap::new();
        previous.insert(NodeId::from("a"), serde_json::json!({"x": 42}));
        NodeExecutionContext {
            execution_id: ExecutionId::from("e1"),
            node_id: NodeId::from("n1"),
            flow_id: FlowId::from("f1"),
            version_id: VersionId::from("v1"),
            user_id: UserId::from("u1"),
            config: Value::Null,
            input,
            global_context: Value::Null,
            previous_outputs: previous,
        }
    }

    #[test]
    fn plain_text_is_idempotent() {
        let eval = ExpressionEvaluator::new();
        let text = "just a plain string";
        assert_eq!(eval.evaluate_template(text, &ctx()), text);
    }

    #[test]
    fn json_field_path_resolves() {
        let eval = ExpressionEvaluator::new();
        assert_eq!(eval.evaluate_template("{{ $json.field }}", &ctx()), "hello");
    }

    #[test]
    fn node_reference_resolves_nested_path() {
        let eval = ExpressionEvaluator::new();
        assert_eq!(eval.evaluate_template("{{ $node[\"a\"].json.x }}", &ctx()), "42");
    }

    #[test]
    fn missing_lookup_is_empty_string_in_template_mode() {
        let eval = ExpressionEvaluator::new();
        assert_eq!(eval.evaluate_template("{{ $json.missing }}", &ctx()), "");
    }

    #[test]
    fn missing_lookup_is_null_in_expression_mode() {
        let eval = ExpressionEvaluator::new();
        assert_eq!(eval.evaluate("$json.missing", &ctx()), Value::Null);
    }

    #[test]
    fn config_recursion_only_substitutes_string_leaves() {
        let eval = ExpressionEvaluator::new();
        let config = serde_json::json!({"url": "{{ $json.field }}", "count": 3, "flag": true});
        let result = eval.evaluate_config(&config, &ctx());
        assert_eq!(result["url"], Value::from("hello"));
        assert_eq!(result["count"], Value::from(3));
        assert_eq!(result["flag"], Value::from(true));
    }
}
