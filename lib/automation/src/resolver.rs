//! `{{path}}` placeholder resolution.
//!
//! Paths are dot-separated keys into the run's template scope
//! (`contact.name`, `trigger.body`, `profile.business_name`). Numeric
//! segments also index into arrays.
//!
//! Two flavours exist:
//! - [`resolve_template`] for message text: unresolved placeholders are left
//!   as they are, so a broken template is visible rather than silently blank
//! - [`resolve_json_template`] for JSON request bodies: every placeholder
//!   becomes a JSON token, so the result stays parseable

use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::ops::Range;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder pattern is valid"));

/// Walks a dotted path into a JSON value.
///
/// Surrounding `{{ }}` are tolerated. Returns `None` as soon as a segment
/// is missing or the current value cannot be descended into.
#[must_use]
pub fn resolve_path<'a>(root: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.trim();
    let path = path
        .strip_prefix("{{")
        .and_then(|p| p.strip_suffix("}}"))
        .unwrap_or(path)
        .trim();
    if path.is_empty() {
        return None;
    }

    path.split('.').try_fold(root, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Replaces every `{{path}}` in `text` with the value's text form.
///
/// Strings are inserted as-is, other values as compact JSON. Placeholders
/// that do not resolve (or resolve to `null`) are left untouched.
#[must_use]
pub fn resolve_template(text: &str, scope: &JsonValue) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            match resolve_path(scope, &caps[1]).filter(|v| !v.is_null()) {
                Some(value) => text_form(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolves placeholders in a JSON document template.
///
/// - A string literal consisting of exactly one placeholder
///   (`"{{contact.age}}"`) is replaced by the value's JSON token, quotes
///   included, so numbers stay numbers and objects stay objects.
/// - A placeholder outside any string literal is replaced by the JSON
///   token directly.
/// - A placeholder inside a longer string literal is replaced by the
///   escaped text form of the value.
///
/// Unresolved placeholders become `null`, or nothing inside a longer
/// string. The result is valid JSON whenever the template is valid JSON
/// with placeholders in value positions.
#[must_use]
pub fn resolve_json_template(template: &str, scope: &JsonValue) -> String {
    let literals = string_literals(template);
    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(found) = caps.get(0) else {
            continue;
        };
        let value = resolve_path(scope, &caps[1]);
        let enclosing = literals
            .iter()
            .find(|lit| lit.start < found.start() && found.start() < lit.end);

        let (range, replacement) = match enclosing {
            None => (found.range(), json_token(value)),
            Some(lit) if lit.start + 1 == found.start() && found.end() + 1 == lit.end => {
                (lit.clone(), json_token(value))
            }
            Some(lit) if found.end() < lit.end => (found.range(), escaped_text(value)),
            // straddles a literal boundary; leave as written
            Some(_) => continue,
        };

        out.push_str(&template[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }

    out.push_str(&template[cursor..]);
    out
}

fn text_form(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_token(value: Option<&JsonValue>) -> String {
    value.map_or_else(|| "null".to_string(), JsonValue::to_string)
}

fn escaped_text(value: Option<&JsonValue>) -> String {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return String::new();
    };
    let quoted = JsonValue::String(text_form(value)).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Byte ranges of JSON string literals, quotes included.
fn string_literals(text: &str) -> Vec<Range<usize>> {
    let mut literals = Vec::new();
    let mut open: Option<usize> = None;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate() {
        match open {
            None if byte == b'"' => open = Some(i),
            None => {}
            Some(_) if escaped => escaped = false,
            Some(_) if byte == b'\\' => escaped = true,
            Some(start) if byte == b'"' => {
                literals.push(start..i + 1);
                open = None;
            }
            Some(_) => {}
        }
    }
    literals
}
