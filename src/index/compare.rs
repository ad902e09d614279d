//! Comparator factories for secondary indexes.
//!
//! Each factory returns a [`LessFn`] reporting whether raw value `a` sorts
//! strictly before raw value `b`.

use super::{json, LessFn};
use std::cmp::Ordering;
use std::sync::Arc;

/// Case-insensitive string ordering.
pub fn index_string() -> LessFn {
    Arc::new(|a: &str, b: &str| cmp_ignore_case(a, b) == Ordering::Less)
}

/// Case-sensitive byte-wise ordering.
pub fn index_binary() -> LessFn {
    Arc::new(|a: &str, b: &str| a < b)
}

/// Orders values parsed as signed integers. Unparsable values sort as 0.
pub fn index_int() -> LessFn {
    Arc::new(|a: &str, b: &str| parse_or_zero::<i64>(a) < parse_or_zero::<i64>(b))
}

/// Orders values parsed as unsigned integers. Unparsable values sort as 0.
pub fn index_uint() -> LessFn {
    Arc::new(|a: &str, b: &str| parse_or_zero::<u64>(a) < parse_or_zero::<u64>(b))
}

/// Orders values parsed as floats. Unparsable values sort as 0.
pub fn index_float() -> LessFn {
    Arc::new(|a: &str, b: &str| parse_or_zero::<f64>(a) < parse_or_zero::<f64>(b))
}

/// Orders JSON documents by the value at `path`, folding string case.
pub fn index_json(path: &str) -> LessFn {
    let path = path.to_string();
    Arc::new(move |a: &str, b: &str| json::compare_at(a, b, &path, false) == Ordering::Less)
}

/// Orders JSON documents by the value at `path`, comparing strings exactly.
pub fn index_json_case_sensitive(path: &str) -> LessFn {
    let path = path.to_string();
    Arc::new(move |a: &str, b: &str| json::compare_at(a, b, &path, true) == Ordering::Less)
}

/// Compares two strings ignoring ASCII and Unicode case.
pub(crate) fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().flat_map(char::to_lowercase);
    let mut bi = b.chars().flat_map(char::to_lowercase);
    loop {
        match (ai.next(), bi.next()) {
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(s: &str) -> T {
    s.trim().parse().unwrap_or_default()
}
