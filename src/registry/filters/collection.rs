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

//! List and object filters

use super::filter_meta;
use crate::model::compare::{canonical_key, display_string, natural_cmp};
use crate::registry::filter::Filter;
use rustc_hash::FxHashSet;
use serde_json::Value;

fn elements(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) => Some(map.values().collect()),
        _ => None,
    }
}

/// `join[:separator]` list elements into a string (separator defaults to `, `)
#[derive(Debug, Default)]
pub struct JoinFilter;

impl Filter for JoinFilter {
    filter_meta!("join", ["implode"], "Join list elements into a string");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let separator = args.first().map_or(", ", String::as_str);
        match elements(&value) {
            Some(items) => Value::String(
                items
                    .into_iter()
                    .map(display_string)
                    .collect::<Vec<_>>()
                    .join(separator),
            ),
            None => value,
        }
    }
}

/// Element count of a list or object, character count of a string
#[derive(Debug, Default)]
pub struct CountFilter;

impl Filter for CountFilter {
    filter_meta!("count", ["length", "size"], "Number of elements");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match &value {
            Value::Array(items) => Value::from(items.len()),
            Value::Object(map) => Value::from(map.len()),
            Value::String(s) => Value::from(s.chars().count()),
            Value::Null => Value::from(0),
            _ => value,
        }
    }
}

/// First element (`null` for an empty list)
#[derive(Debug, Default)]
pub struct FirstFilter;

impl Filter for FirstFilter {
    filter_meta!("first", [], "First element of a list");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match value {
            Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
            Value::Object(map) => map.into_iter().next().map_or(Value::Null, |(_, v)| v),
            other => other,
        }
    }
}

/// Last element (`null` for an empty list)
#[derive(Debug, Default)]
pub struct LastFilter;

impl Filter for LastFilter {
    filter_meta!("last", [], "Last element of a list");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match value {
            Value::Array(mut items) => items.pop().unwrap_or(Value::Null),
            Value::Object(map) => map.into_iter().last().map_or(Value::Null, |(_, v)| v),
            other => other,
        }
    }
}

/// Object keys, or list indices
#[derive(Debug, Default)]
pub struct KeysFilter;

impl Filter for KeysFilter {
    filter_meta!("keys", ["array_keys"], "Keys of an object");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match value {
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
            Value::Array(items) => Value::Array((0..items.len()).map(Value::from).collect()),
            other => other,
        }
    }
}

/// Object values as a list
#[derive(Debug, Default)]
pub struct ValuesFilter;

impl Filter for ValuesFilter {
    filter_meta!("values", ["array_values"], "Values of an object as a list");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match value {
            Value::Object(map) => Value::Array(map.into_iter().map(|(_, v)| v).collect()),
            other => other,
        }
    }
}

/// Reverse a list, an object's entry order, or a string
#[derive(Debug, Default)]
pub struct ReverseFilter;

impl Filter for ReverseFilter {
    filter_meta!("reverse", [], "Reverse element order");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        match value {
            Value::Array(mut items) => {
                items.reverse();
                Value::Array(items)
            }
            Value::Object(map) => {
                let entries: Vec<_> = map.into_iter().collect();
                Value::Object(entries.into_iter().rev().collect())
            }
            Value::String(s) => Value::String(s.chars().rev().collect()),
            other => other,
        }
    }
}

/// `sort[:desc]` a list with natural comparison, nulls first
#[derive(Debug, Default)]
pub struct SortFilter;

impl Filter for SortFilter {
    filter_meta!("sort", [], "Sort a list");

    fn apply(&self, value: Value, args: &[String]) -> Value {
        let Value::Array(mut items) = value else {
            return value;
        };
        let descending = args
            .first()
            .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
        items.sort_by(|a, b| {
            let ordering = match (a.is_null(), b.is_null()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                (false, false) => natural_cmp(a, b),
            };
            if descending { ordering.reverse() } else { ordering }
        });
        Value::Array(items)
    }
}

/// Drop repeated elements, keeping first occurrences
#[derive(Debug, Default)]
pub struct UniqueFilter;

impl Filter for UniqueFilter {
    filter_meta!("unique", ["array_unique", "distinct"], "Remove duplicate elements");

    fn apply(&self, value: Value, _args: &[String]) -> Value {
        let Value::Array(items) = value else {
            return value;
        };
        let mut seen = FxHashSet::default();
        Value::Array(
            items
                .into_iter()
                .filter(|item| seen.insert(canonical_key(item)))
                .collect(),
        )
    }
}
