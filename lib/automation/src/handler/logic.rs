//! Branching nodes: `condition` and `split_path`.
//!
//! A condition compares a variable from the template scope with a value.
//! `condition` leaves through `"yes"` or `"no"`; `split_path` evaluates
//! its paths in order and leaves through the index of the first matching
//! one (`"0"`, `"1"`, ...) or `"else"`.
//!
//! Comparisons are textual and ignore case; `greater_than` and `less_than`
//! compare numerically and are false when either side is not a number.

use crate::context::{ActionResult, Contact, ExecutionContext};
use crate::error::HandlerError;
use crate::handler::{ActionHandler, parse_config};
use crate::node::Node;
use crate::resolver::{resolve_path, resolve_template};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Handle taken by `split_path` when no path matches.
pub const ELSE_HANDLE: &str = "else";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
    HasTag,
}

/// One comparison.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    /// Path into the template scope, with or without braces.
    #[serde(default)]
    pub variable: String,
    pub operator: Operator,
    /// Expected value; strings may contain placeholders.
    #[serde(default)]
    pub value: JsonValue,
}

/// How the conditions of a group combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

/// A set of conditions. An empty `all` group is true, an empty `any`
/// group is false.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,
}

fn text_of(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn is_empty(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(JsonValue::Array(items)) => items.is_empty(),
        Some(JsonValue::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn number_of(value: Option<&JsonValue>) -> Option<f64> {
    match value? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Condition {
    /// Evaluates the condition against a template scope.
    #[must_use]
    pub fn evaluate(&self, scope: &JsonValue, contact: Option<&Contact>) -> bool {
        let actual = resolve_path(scope, &self.variable);
        let expected = match &self.value {
            JsonValue::String(s) => JsonValue::String(resolve_template(s, scope)),
            other => other.clone(),
        };
        let actual_text = text_of(actual).trim().to_lowercase();
        let expected_text = text_of(Some(&expected)).trim().to_lowercase();

        match self.operator {
            Operator::Equals => equals(actual, &expected, &actual_text, &expected_text),
            Operator::NotEquals => !equals(actual, &expected, &actual_text, &expected_text),
            Operator::Contains => actual_text.contains(&expected_text),
            Operator::NotContains => !actual_text.contains(&expected_text),
            Operator::StartsWith => actual_text.starts_with(&expected_text),
            Operator::EndsWith => actual_text.ends_with(&expected_text),
            Operator::IsEmpty => is_empty(actual),
            Operator::IsNotEmpty => !is_empty(actual),
            Operator::GreaterThan => match (number_of(actual), number_of(Some(&expected))) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            Operator::LessThan => match (number_of(actual), number_of(Some(&expected))) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            Operator::HasTag => match actual {
                Some(JsonValue::Array(items)) => items
                    .iter()
                    .any(|item| text_of(Some(item)).trim().to_lowercase() == expected_text),
                _ => contact.is_some_and(|c| c.has_tag(&expected_text)),
            },
        }
    }
}

fn equals(actual: Option<&JsonValue>, expected: &JsonValue, actual_text: &str, expected_text: &str) -> bool {
    match (number_of(actual), number_of(Some(expected))) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => actual_text == expected_text,
    }
}

impl ConditionGroup {
    #[must_use]
    pub fn evaluate(&self, scope: &JsonValue, contact: Option<&Contact>) -> bool {
        let mut results = self.conditions.iter().map(|c| c.evaluate(scope, contact));
        match self.match_mode {
            MatchMode::All => results.all(|r| r),
            MatchMode::Any => results.any(|r| r),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SplitPathConfig {
    #[serde(default)]
    paths: Vec<ConditionGroup>,
}

pub struct ConditionHandler;

#[async_trait]
impl ActionHandler for ConditionHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let group: ConditionGroup = parse_config(node)?;
        let passed = group.evaluate(&ctx.template_scope(), ctx.contact.as_ref());
        let handle = if passed { "yes" } else { "no" };
        Ok(ActionResult::branch(handle).with_detail(format!("condition -> {handle}")))
    }
}

pub struct SplitPathHandler;

#[async_trait]
impl ActionHandler for SplitPathHandler {
    async fn execute(
        &self,
        node: &Node,
        ctx: &ExecutionContext,
    ) -> Result<ActionResult, HandlerError> {
        let config: SplitPathConfig = parse_config(node)?;
        let scope = ctx.template_scope();
        let handle = config
            .paths
            .iter()
            .position(|path| path.evaluate(&scope, ctx.contact.as_ref()))
            .map_or_else(|| ELSE_HANDLE.to_string(), |index| index.to_string());
        Ok(ActionResult::branch(handle.clone()).with_detail(format!("split -> {handle}")))
    }
}
