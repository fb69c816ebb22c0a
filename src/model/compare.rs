// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loose comparison and coercion helpers for loosely-typed payloads

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Numeric view of a value: numbers and numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// Whether the value is a number or a numeric string
pub fn is_numeric(value: &Value) -> bool {
    as_number(value).is_some()
}

/// Parse a numeric string the way form/query payloads are usually interpreted
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let first = trimmed.as_bytes()[0];
    if !(first.is_ascii_digit() || matches!(first, b'-' | b'+' | b'.')) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Build a JSON number, preferring an integer representation
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Truthiness of a value (`null`, `false`, `0`, `""`, `"0"`, `[]`, `{}` are false)
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Loose equality used by WHERE conditions
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => match other {
            Value::String(s) => s.is_empty(),
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::Bool(b) => !b,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
        },
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == truthy(other),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match parse_numeric(s) {
                Some(parsed) => n.as_f64() == Some(parsed),
                None => n.to_string() == *s,
            }
        }
        (Value::String(a), Value::String(b)) => match (parse_numeric(a), parse_numeric(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => false,
    }
}

/// Strict equality: same JSON type and same content, `1` and `1.0` equal
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| strict_eq(v, other)))
        }
        _ => left == right,
    }
}

/// Natural ordering of two non-null values
///
/// Numbers, booleans and numeric strings sort before everything else and compare
/// numerically; the rest compare by their string form. The result is a total order.
pub fn natural_cmp(left: &Value, right: &Value) -> Ordering {
    match (sortable_number(left), sortable_number(right)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => display_string(left).cmp(&display_string(right)),
    }
}

fn sortable_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => as_number(other),
    }
}

/// String form used for concatenation and lexical comparison
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Stable content key: equal for `1` and `1.0`, distinct for `"1"`, `1` and `true`
pub fn canonical_key(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n.as_f64().map_or(Value::Null, number_value),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Short type name for diagnostics
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings() {
        assert_eq!(as_number(&json!("42")), Some(42.0));
        assert_eq!(as_number(&json!(" 1.5 ")), Some(1.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&json!("01"), &json!("1")));
        assert!(loose_eq(&json!(null), &json!(false)));
        assert!(loose_eq(&json!(true), &json!("yes")));
        assert!(!loose_eq(&json!("A"), &json!("a")));
        assert!(!loose_eq(&json!(null), &json!("0")));
    }

    #[test]
    fn test_strict_eq() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(1), &json!(true)));
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp(&json!("10"), &json!("9")), Ordering::Greater);
        assert_eq!(natural_cmp(&json!("apple"), &json!("banana")), Ordering::Less);
        assert_eq!(natural_cmp(&json!(2), &json!("2.0")), Ordering::Equal);
    }

    #[test]
    fn test_natural_cmp_ranks_numbers_before_text() {
        let (nine, ten, text) = (json!(9), json!(10), json!("1a"));
        assert_eq!(natural_cmp(&nine, &ten), Ordering::Less);
        assert_eq!(natural_cmp(&ten, &text), Ordering::Less);
        assert_eq!(natural_cmp(&nine, &text), Ordering::Less);
        assert_eq!(natural_cmp(&text, &json!("10")), Ordering::Greater);
        assert_eq!(natural_cmp(&json!(true), &json!("x")), Ordering::Less);
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key(&json!(1)), canonical_key(&json!(1.0)));
        assert_ne!(canonical_key(&json!(1)), canonical_key(&json!("1")));
        assert_ne!(canonical_key(&json!(1)), canonical_key(&json!(true)));
    }

    #[test]
    fn test_display_string() {
        assert_eq!(display_string(&json!(3.0)), "3");
        assert_eq!(display_string(&json!(2.5)), "2.5");
        assert_eq!(display_string(&json!(true)), "1");
        assert_eq!(display_string(&json!(null)), "");
    }
}
