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

//! Inverting mapping tables
//!
//! Only bare paths reverse: a plain `user.name` or `{{ user.name }}` cell. Cells with
//! filters, defaults, aliases, static markers, operator blocks or non-string values
//! are dropped. When two entries read the same source path the later one wins.

use crate::config::DEFAULT_STATIC_MARKER;
use crate::parser::{ExpressionParser, ParseMode};
use crate::path::segments::{WILDCARD, join_path, split_path};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Table reverser bound to an expression parser and static marker
#[derive(Debug, Clone)]
pub struct MappingReverser {
    expressions: Arc<ExpressionParser>,
    static_marker: String,
}

impl Default for MappingReverser {
    fn default() -> Self {
        Self::new(ExpressionParser::global(ParseMode::Fast))
    }
}

impl MappingReverser {
    /// Create a reverser using `expressions` to read cells
    pub fn new(expressions: Arc<ExpressionParser>) -> Self {
        Self {
            expressions,
            static_marker: DEFAULT_STATIC_MARKER.to_string(),
        }
    }

    /// Use a different static marker when recognising literal cells
    pub fn with_static_marker(mut self, marker: impl Into<String>) -> Self {
        self.static_marker = marker.into();
        self
    }

    /// Source path of a reversible cell
    pub fn reversible_path(&self, cell: &Value) -> Option<String> {
        let Value::String(text) = cell else {
            return None;
        };
        let path = match self.expressions.parse(text) {
            Ok(Some(expr)) if expr.is_plain() && !expr.is_alias() => expr.path.clone(),
            Ok(Some(_)) | Err(_) => return None,
            Ok(None) => {
                let trimmed = text.trim();
                if trimmed.contains('|') || trimmed.contains("??") || trimmed.contains("{{") {
                    return None;
                }
                trimmed.to_string()
            }
        };
        (!path.is_empty() && !split_path(&path).iter().any(|s| s.is_empty())).then_some(path)
    }

    /// Reverse a flat `target => source` table into `source => {{ target }}`
    pub fn reverse_mapping(&self, flat: &Value) -> Value {
        let Value::Object(table) = flat else {
            return Value::Object(Map::new());
        };
        let mut out = Map::new();
        for (target, cell) in table {
            match self.reversible_path(cell) {
                Some(source) => {
                    out.insert(source, Value::String(format!("{{{{ {target} }}}}")));
                }
                None => log::trace!("Dropping non-reversible entry '{target}'"),
            }
        }
        Value::Object(out)
    }

    /// Reverse a nested table; leaves of the result are plain target paths
    ///
    /// A `*` key is kept as a literal nesting level on both sides, so
    /// `{"emails": {"*": "users.*.email"}}` reverses to
    /// `{"users": {"*": {"email": "emails.*"}}}`.
    pub fn reverse_template(&self, nested: &Value) -> Value {
        let mut leaves = Vec::new();
        if let Value::Object(table) = nested {
            self.collect_leaves(table, "", &mut leaves);
        }
        let mut out = Value::Object(Map::new());
        for (target, source) in leaves {
            insert_nested(&mut out, &split_path(&source), Value::String(target));
        }
        out
    }

    fn collect_leaves(
        &self,
        table: &Map<String, Value>,
        prefix: &str,
        out: &mut Vec<(String, String)>,
    ) {
        for (key, cell) in table {
            let target = join_path(prefix, key);
            match cell {
                Value::Object(map) if map.contains_key(&self.static_marker) => {}
                Value::Object(map) if map.contains_key(WILDCARD) && map.len() > 1 => {
                    log::trace!("Dropping operator block at '{target}'");
                }
                Value::Object(map) => self.collect_leaves(map, &target, out),
                other => {
                    if let Some(source) = self.reversible_path(other) {
                        out.push((target, source));
                    }
                }
            }
        }
    }
}

fn insert_nested(node: &mut Value, segments: &[&str], leaf: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        insert_nested(child, rest, leaf);
    }
}

/// [`MappingReverser::reverse_mapping`] with the default reverser
pub fn reverse_mapping(flat: &Value) -> Value {
    MappingReverser::default().reverse_mapping(flat)
}

/// [`MappingReverser::reverse_template`] with the default reverser
pub fn reverse_template(nested: &Value) -> Value {
    MappingReverser::default().reverse_template(nested)
}
