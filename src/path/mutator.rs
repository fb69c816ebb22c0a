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

//! Writing values at dot-paths
//!
//! Missing containers are created on the way down. A numeric segment `0` creates a
//! list; any other key creates an object. Writing past the end of a list turns it into
//! an index-keyed object so the gap survives (`{"0": "a", "2": "c"}`).

use super::segments::{WILDCARD, has_wildcard, parse_index, split_path, substitute_wildcards};
use crate::error::{MapperError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Return a copy of `target` with `value` written at `path`
pub fn set(target: &Value, path: &str, value: Value) -> Result<Value> {
    let mut copy = target.clone();
    set_in(&mut copy, path, value)?;
    Ok(copy)
}

/// Write `value` at `path` in place
///
/// A wildcard segment writes the value into every existing child at that level.
pub fn set_in(target: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = validated_segments(path)?;
    write(target, &segments, value);
    Ok(())
}

/// Write positioned values into the expansion slots of a wildcard path
///
/// Each entry carries one index per wildcard in `path`; the indices replace the
/// wildcards in order. A path without wildcards receives the whole list.
pub fn set_wildcard_in<I, S>(target: &mut Value, path: &str, items: I) -> Result<()>
where
    I: IntoIterator<Item = (Vec<S>, Value)>,
    S: AsRef<str>,
{
    validated_segments(path)?;
    if !has_wildcard(path) {
        let list = items.into_iter().map(|(_, value)| value).collect();
        return set_in(target, path, Value::Array(list));
    }
    for (indices, value) in items {
        let concrete = substitute_wildcards(path, &indices);
        let segments = split_path(&concrete);
        write(target, &segments, value);
    }
    Ok(())
}

/// Non-mutating variant of [`set_wildcard_in`] for single-wildcard paths
pub fn set_wildcard(target: &Value, path: &str, items: &[(usize, Value)]) -> Result<Value> {
    let mut copy = target.clone();
    set_wildcard_in(
        &mut copy,
        path,
        items
            .iter()
            .map(|(idx, value)| (vec![idx.to_string()], value.clone())),
    )?;
    Ok(copy)
}

/// Return a copy of `target` without the value at `path`
pub fn remove(target: &Value, path: &str) -> Result<Value> {
    let mut copy = target.clone();
    remove_in(&mut copy, path)?;
    Ok(copy)
}

/// Remove the value at `path` in place, returning it if it existed
pub fn remove_in(target: &mut Value, path: &str) -> Result<Option<Value>> {
    let segments = validated_segments(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Ok(Some(std::mem::take(target)));
    };
    let mut node = target;
    for segment in parents {
        node = match node {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(child) => child,
                None => return Ok(None),
            },
            Value::Array(items) => match parse_index(segment).and_then(|i| items.get_mut(i)) {
                Some(child) => child,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };
    }
    Ok(match node {
        Value::Object(map) => map.shift_remove(*last),
        Value::Array(items) => match parse_index(last) {
            Some(idx) if idx < items.len() => Some(items.remove(idx)),
            _ => None,
        },
        _ => None,
    })
}

/// Deep-merge `value` into whatever is stored at `path`
///
/// Objects merge key by key, lists append, anything else is replaced.
pub fn merge_in(target: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = validated_segments(path)?;
    let mut node = target;
    for segment in &segments {
        node = child_slot(node, segment);
    }
    merge_values(node, value);
    Ok(())
}

/// Build a new typed instance with `value` written at `path`
///
/// Used for types whose fields cannot be assigned directly; the instance is
/// serialized, modified and deserialized into a fresh value.
pub fn set_typed<T>(object: &T, path: &str, value: Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut raw = serde_json::to_value(object)?;
    set_in(&mut raw, path, value)?;
    Ok(serde_json::from_value(raw)?)
}

fn validated_segments(path: &str) -> Result<Vec<&str>> {
    let segments = split_path(path);
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(MapperError::invalid_path(path, "path contains an empty segment"));
    }
    Ok(segments)
}

fn write(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if *head == WILDCARD {
        match node {
            Value::Object(map) => {
                for child in map.values_mut() {
                    write(child, rest, value.clone());
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    write(child, rest, value.clone());
                }
            }
            _ => {}
        }
        return;
    }
    let slot = child_slot(node, head);
    write(slot, rest, value);
}

fn child_slot<'a>(node: &'a mut Value, key: &str) -> &'a mut Value {
    let index = parse_index(key);
    if !node.is_object() && !node.is_array() {
        *node = match index {
            Some(0) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        };
    }
    if let Value::Array(items) = node {
        match index {
            Some(idx) if idx < items.len() => {}
            Some(idx) if idx == items.len() => items.push(Value::Null),
            _ => {
                let map = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect();
                *node = Value::Object(map);
            }
        }
    }
    match node {
        Value::Array(items) => {
            let idx = index.unwrap_or_default();
            &mut items[idx]
        }
        Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
        _ => unreachable!("child_slot always leaves a container"),
    }
}

fn merge_values(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(extra)) => {
            for (key, value) in extra {
                match current.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(current), Value::Array(extra)) => current.extend(extra),
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_set_is_non_mutating() {
        let original = json!({"a": 1});
        let updated = set(&original, "b.c", json!(2)).unwrap();
        assert_eq!(original, json!({"a": 1}));
        assert_eq!(updated, json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_autovivify_lists_and_gaps() {
        let mut target = Value::Null;
        set_in(&mut target, "emails.0", json!("a@x")).unwrap();
        assert_eq!(target, json!({"emails": ["a@x"]}));
        set_in(&mut target, "emails.2", json!("c@x")).unwrap();
        assert_eq!(target, json!({"emails": {"0": "a@x", "2": "c@x"}}));
        set_in(&mut target, "emails.1", json!("b@x")).unwrap();
        assert_eq!(target["emails"]["1"], json!("b@x"));
    }

    #[test]
    fn test_set_through_scalar_replaces_it() {
        let target = set(&json!({"a": "text"}), "a.b", json!(true)).unwrap();
        assert_eq!(target, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_wildcard_set_updates_every_child() {
        let target = json!({"users": [{"active": false}, {"active": false}]});
        let updated = set(&target, "users.*.active", json!(true)).unwrap();
        assert_eq!(updated, json!({"users": [{"active": true}, {"active": true}]}));
    }

    #[test]
    fn test_set_wildcard_positions() {
        let contiguous =
            set_wildcard(&json!({}), "out.*", &[(0, json!("a")), (1, json!("b"))]).unwrap();
        assert_eq!(contiguous, json!({"out": ["a", "b"]}));
        let gapped = set_wildcard(&json!({}), "out.*.v", &[(0, json!(1)), (2, json!(3))]).unwrap();
        assert_eq!(gapped, json!({"out": {"0": {"v": 1}, "2": {"v": 3}}}));
    }

    #[test]
    fn test_multi_wildcard_positions() {
        let mut target = json!({});
        set_wildcard_in(
            &mut target,
            "rows.*.cells.*",
            vec![
                (vec!["0", "0"], json!("a")),
                (vec!["0", "1"], json!("b")),
                (vec!["1", "0"], json!("c")),
            ],
        )
        .unwrap();
        assert_eq!(target, json!({"rows": [{"cells": ["a", "b"]}, {"cells": ["c"]}]}));
    }

    #[test]
    fn test_remove_and_merge() {
        let target = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});
        let removed = remove(&target, "a.b").unwrap();
        assert_eq!(removed, json!({"a": {"c": 2}, "list": [1, 2, 3]}));
        let mut merged = target.clone();
        merge_in(&mut merged, "a", json!({"d": 4})).unwrap();
        merge_in(&mut merged, "list", json!([4])).unwrap();
        assert_eq!(merged, json!({"a": {"b": 1, "c": 2, "d": 4}, "list": [1, 2, 3, 4]}));
    }

    #[test]
    fn test_empty_segment_is_rejected() {
        assert!(set(&json!({}), "a..b", json!(1)).is_err());
    }

    #[test]
    fn test_set_typed_builds_new_instance() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Profile {
            name: String,
            age: u32,
        }
        let profile = Profile {
            name: "Ann".to_string(),
            age: 30,
        };
        let older = set_typed(&profile, "age", json!(31)).unwrap();
        assert_eq!(older.age, 31);
        assert_eq!(profile.age, 30);
    }
}
