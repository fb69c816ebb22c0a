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

//! Reading values at dot-paths
//!
//! A path without wildcards resolves to at most one value. A path with wildcards
//! resolves to an ordered object of expanded concrete paths, in traversal order:
//!
//! ```
//! use datamap::path::accessor;
//! use serde_json::json;
//!
//! let data = json!({"users": [{"email": "a@x"}, {"email": "b@x"}]});
//! let emails = accessor::get(&data, "users.*.email", json!(null)).unwrap();
//! assert_eq!(emails, json!({"users.0.email": "a@x", "users.1.email": "b@x"}));
//! ```

use super::segments::{WILDCARD, has_wildcard, join_path, split_path};
use crate::error::{MapperError, Result};
use crate::model::DataSource;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Read the value at `path`, or `default` when any segment is missing
///
/// Wildcard paths return an object keyed by expanded path. Errors only when the root
/// itself is a scalar and a non-empty path is traversed.
pub fn get(source: &dyn DataSource, path: &str, default: Value) -> Result<Value> {
    if path.is_empty() {
        return Ok(source.to_value());
    }
    ensure_traversable(source, path)?;
    if has_wildcard(path) {
        return Ok(Value::Object(expand(source, path, &default)));
    }
    Ok(lookup(source, &split_path(path)).unwrap_or(default))
}

/// Expanded `{concretePath: value}` map for a path (non-wildcard paths give one entry)
pub fn get_wildcard(
    source: &dyn DataSource,
    path: &str,
    default: Value,
) -> Result<Map<String, Value>> {
    ensure_traversable(source, path)?;
    if has_wildcard(path) {
        return Ok(expand(source, path, &default));
    }
    let mut single = Map::new();
    if let Some(value) = lookup(source, &split_path(path)) {
        single.insert(path.to_string(), value);
    }
    Ok(single)
}

/// Whether the path resolves to a present value (a present `null` counts)
pub fn exists(source: &dyn DataSource, path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    if has_wildcard(path) {
        let mut out = Map::new();
        collect(source, &split_path(path), String::new(), false, None, &mut out);
        return !out.is_empty();
    }
    lookup(source, &split_path(path)).is_some()
}

/// Read and deserialize the value at `path` (`None` when missing)
pub fn get_typed<T: DeserializeOwned>(source: &dyn DataSource, path: &str) -> Result<Option<T>> {
    ensure_traversable(source, path)?;
    match lookup(source, &split_path(path)) {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// String at `path`, if present and a string
pub fn get_str(source: &dyn DataSource, path: &str) -> Option<String> {
    lookup(source, &split_path(path)).and_then(|v| v.as_str().map(str::to_string))
}

/// Integer at `path`, if present and integral
pub fn get_i64(source: &dyn DataSource, path: &str) -> Option<i64> {
    lookup(source, &split_path(path)).and_then(|v| v.as_i64())
}

/// Number at `path`, accepting numeric strings
pub fn get_f64(source: &dyn DataSource, path: &str) -> Option<f64> {
    lookup(source, &split_path(path)).and_then(|v| crate::model::as_number(&v))
}

/// Boolean at `path`, if present and a boolean
pub fn get_bool(source: &dyn DataSource, path: &str) -> Option<bool> {
    lookup(source, &split_path(path)).and_then(|v| v.as_bool())
}

/// Borrowing reader bound to one source
pub struct DataAccessor<'a> {
    source: &'a dyn DataSource,
}

impl<'a> DataAccessor<'a> {
    /// Create an accessor over `source`
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    /// See [`get`]
    pub fn get(&self, path: &str) -> Result<Value> {
        get(self.source, path, Value::Null)
    }

    /// See [`get`]
    pub fn get_or(&self, path: &str, default: Value) -> Result<Value> {
        get(self.source, path, default)
    }

    /// See [`exists`]
    pub fn exists(&self, path: &str) -> bool {
        exists(self.source, path)
    }

    /// See [`get_typed`]
    pub fn get_typed<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        get_typed(self.source, path)
    }
}

fn ensure_traversable(source: &dyn DataSource, path: &str) -> Result<()> {
    if !path.is_empty() && source.is_scalar() {
        return Err(MapperError::invalid_path(
            path,
            "cannot traverse into a scalar root",
        ));
    }
    Ok(())
}

pub(crate) fn lookup(node: &dyn DataSource, segments: &[&str]) -> Option<Value> {
    match segments.split_first() {
        None => Some(node.to_value()),
        Some((head, rest)) => {
            let child = node.child(head)?;
            lookup(&*child, rest)
        }
    }
}

fn expand(source: &dyn DataSource, path: &str, default: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    collect(
        source,
        &split_path(path),
        String::new(),
        false,
        Some(default),
        &mut out,
    );
    out
}

fn collect(
    node: &dyn DataSource,
    segments: &[&str],
    prefix: String,
    expanded: bool,
    default: Option<&Value>,
    out: &mut Map<String, Value>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.insert(prefix, node.to_value());
        return;
    };

    if *head == WILDCARD {
        for key in node.child_keys().unwrap_or_default() {
            if let Some(child) = node.child(&key) {
                collect(&*child, rest, join_path(&prefix, &key), true, default, out);
            }
        }
        return;
    }

    match node.child(head) {
        Some(child) => collect(&*child, rest, join_path(&prefix, head), expanded, default, out),
        None => {
            if let (true, Some(default)) = (expanded, default) {
                let remainder = segments.join(".");
                out.insert(join_path(&prefix, &remainder), default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Value {
        json!({
            "users": [
                {"name": "Alice", "email": "a@x", "address": {"city": "Oslo"}},
                {"name": "Bob", "email": null},
                {"name": "Carol", "email": "c@x", "address": {"city": "Rome"}}
            ]
        })
    }

    #[test]
    fn test_simple_paths() {
        let data = users();
        assert_eq!(get(&data, "users.0.name", json!(null)).unwrap(), json!("Alice"));
        assert_eq!(get(&data, "users.5.name", json!("none")).unwrap(), json!("none"));
        assert_eq!(get(&data, "users.1.email", json!("x")).unwrap(), json!(null));
        assert_eq!(get(&data, "users.0.name.first", json!(1)).unwrap(), json!(1));
    }

    #[test]
    fn test_wildcard_expansion_keeps_nulls() {
        let data = users();
        let result = get(&data, "users.*.email", json!(null)).unwrap();
        assert_eq!(
            result,
            json!({"users.0.email": "a@x", "users.1.email": null, "users.2.email": "c@x"})
        );
    }

    #[test]
    fn test_wildcard_branch_default() {
        let data = users();
        let result = get(&data, "users.*.address.city", json!("?")).unwrap();
        assert_eq!(
            result,
            json!({
                "users.0.address.city": "Oslo",
                "users.1.address.city": "?",
                "users.2.address.city": "Rome"
            })
        );
    }

    #[test]
    fn test_sparse_index_keys() {
        let data = json!({"items": {"0": "a", "2": "c"}});
        let result = get(&data, "items.*", json!(null)).unwrap();
        assert_eq!(result, json!({"items.0": "a", "items.2": "c"}));
        assert_eq!(get(&data, "items.2", json!(null)).unwrap(), json!("c"));
    }

    #[test]
    fn test_nested_wildcards() {
        let data = json!({
            "orders": [{"lines": [{"sku": "A"}, {"sku": "B"}]}, {"lines": [{"sku": "C"}]}]
        });
        let result = get(&data, "orders.*.lines.*.sku", json!(null)).unwrap();
        assert_eq!(
            result,
            json!({
                "orders.0.lines.0.sku": "A",
                "orders.0.lines.1.sku": "B",
                "orders.1.lines.0.sku": "C"
            })
        );
    }

    #[test]
    fn test_scalar_root_is_invalid() {
        let err = get(&json!("text"), "a.b", json!(null)).unwrap_err();
        assert!(matches!(err, MapperError::InvalidPathAccess { .. }));
        assert_eq!(get(&json!(null), "a.b", json!(7)).unwrap(), json!(7));
    }

    #[test]
    fn test_exists_and_typed() {
        let data = users();
        assert!(exists(&data, "users.1.email"));
        assert!(!exists(&data, "users.1.address"));
        assert!(exists(&data, "users.*.address"));
        let name: Option<String> = get_typed(&data, "users.2.name").unwrap();
        assert_eq!(name.as_deref(), Some("Carol"));
        assert_eq!(get_str(&data, "users.0.address.city").as_deref(), Some("Oslo"));
        assert_eq!(DataAccessor::new(&data).get("users.1.name").unwrap(), json!("Bob"));
    }
}
