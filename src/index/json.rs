//! JSON path lookup and ordering for field indexes.
//!
//! Values that are not valid JSON, or that lack the requested path, are
//! treated as `null` and therefore sort before everything else.

use serde_json::Value;
use std::cmp::Ordering;

/// Rank of a JSON value kind in index order.
fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Bool(true)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

/// Resolves a dot-separated path such as `user.age` or `tags.0`.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Compares the values found at `path` in two raw JSON documents.
pub fn compare_at(a: &str, b: &str, path: &str, case_sensitive: bool) -> Ordering {
    let a: Option<Value> = serde_json::from_str(a).ok();
    let b: Option<Value> = serde_json::from_str(b).ok();
    let a = a.as_ref().and_then(|v| lookup(v, path));
    let b = b.as_ref().and_then(|v| lookup(v, path));
    compare_values(a, b, case_sensitive)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>, case_sensitive: bool) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            if case_sensitive {
                x.cmp(y)
            } else {
                super::compare::cmp_ignore_case(x, y)
            }
        }
        (Some(x @ Value::Array(_)), Some(y)) | (Some(x @ Value::Object(_)), Some(y)) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => Ordering::Equal,
    }
}
