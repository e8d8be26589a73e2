//! Decoding plan-composer output into an `OperationPlan`.
//!
//! Composers wrap JSON in markdown fences, prose, or trailing chatter, so the
//! decoder extracts the first complete plan-shaped JSON value by bracket
//! balancing (outside string literals) before interpreting it. Every malformed shape is
//! an invalid-argument error.

use crate::operation::{Operation, OperationKind, OperationPlan};
use draftgraph_graph::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Decode a plan. `fallback_query` fills in the query when the text omits it.
pub fn parse_plan(text: &str, fallback_query: &str) -> Result<OperationPlan> {
    let value = extract_json(text)?;

    let (operations, query, explanation) = match &value {
        Value::Array(ops) => (ops, None, None),
        Value::Object(obj) => {
            let ops = obj
                .get("operations")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::invalid("plan has no `operations` array"))?;
            let explanation = obj
                .get("reasoning")
                .or_else(|| obj.get("explanation"))
                .and_then(Value::as_str);
            (ops, obj.get("query").and_then(Value::as_str), explanation)
        }
        _ => return Err(Error::invalid("plan must be a JSON object or array")),
    };

    if operations.is_empty() {
        return Err(Error::invalid("plan has no operations"));
    }
    let operations = operations
        .iter()
        .enumerate()
        .map(|(i, op)| decode_operation(i + 1, op))
        .collect::<Result<Vec<_>>>()?;

    let query = query
        .filter(|q| !q.trim().is_empty())
        .unwrap_or(fallback_query);
    Ok(OperationPlan::new(query, operations).with_explanation(explanation.unwrap_or_default()))
}

fn decode_operation(step: usize, value: &Value) -> Result<Operation> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid(format!("operation {step} is not an object")))?;
    let kind: OperationKind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid(format!("operation {step} has no `type`")))?
        .parse()?;

    Ok(Operation {
        kind,
        target_type: optional_string(obj, "target_type", step)?,
        property_name: optional_string(obj, "property_name", step)?,
        parameters: decode_parameters(obj.get("parameters"), step)?,
    })
}

fn optional_string(obj: &Map<String, Value>, key: &str, step: usize) -> Result<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::invalid(format!(
            "operation {step}: `{key}` must be a string"
        ))),
    }
}

fn decode_parameters(value: Option<&Value>, step: usize) -> Result<BTreeMap<String, String>> {
    let Some(value) = value else {
        return Ok(BTreeMap::new());
    };
    let obj = match value {
        Value::Null => return Ok(BTreeMap::new()),
        Value::Object(obj) => obj,
        _ => {
            return Err(Error::invalid(format!(
                "operation {step}: `parameters` must be an object"
            )))
        }
    };

    let mut out = BTreeMap::new();
    for (key, v) in obj {
        let text = match v {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::invalid(format!(
                    "operation {step}: parameter `{key}` must be a scalar"
                )))
            }
        };
        out.insert(key.clone(), text);
    }
    Ok(out)
}

/// First complete JSON object or array in `text` that looks like a plan.
///
/// Every `{` or `[` is a candidate start, so bracketed prose such as
/// `[draft]` ahead of the plan is skipped. When no candidate is plan-shaped,
/// the first valid JSON value is returned so the caller reports what is wrong
/// with it.
fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Ok(v);
    }

    let mut first_valid = None;
    let mut last_error = Error::invalid("composer output contains no JSON");
    for (start, _) in trimmed.match_indices(|c: char| c == '{' || c == '[') {
        let span = match balanced_span(&trimmed[start..]) {
            Ok(span) => span,
            Err(err) => {
                last_error = err;
                continue;
            }
        };
        match serde_json::from_str::<Value>(span) {
            Ok(v) if is_plan_shaped(&v) => return Ok(v),
            Ok(v) => {
                first_valid.get_or_insert(v);
            }
            Err(e) => last_error = Error::invalid(format!("composer returned invalid JSON: {e}")),
        }
    }
    first_valid.ok_or(last_error)
}

/// The bracket-balanced prefix of `text`, which starts with `{` or `[`.
/// Brackets inside string literals do not count.
fn balanced_span(text: &str) -> Result<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return Err(Error::invalid("composer output has unbalanced brackets"));
                }
                if stack.is_empty() {
                    return Ok(&text[..=offset]);
                }
            }
            _ => {}
        }
    }
    Err(Error::invalid("composer output has an unterminated JSON value"))
}

/// An object, or an array of objects.
fn is_plan_shaped(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}
