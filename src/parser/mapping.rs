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

//! Mapping tables to executable plans
//!
//! A mapping table is a JSON object from target path to cell. Cells are classified in
//! priority order:
//!
//! 1. `{"__static__": literal}` is written verbatim
//! 2. `"{{ ... }}"` is a parsed expression
//! 3. a plain string containing `|` or `??` is parsed as an unwrapped expression body
//! 4. any other plain string is a source path
//! 5. numbers, booleans, null and lists are literals
//! 6. an object with a `*` key is a wildcard block whose sibling keys are operators;
//!    any other object is a nested table under the key as target prefix
//!
//! Plans are cached on a content hash of the static marker and the table's canonical
//! JSON text. The text is stored alongside the plan, so a hash collision is a miss.

use super::cache::{BoundedCache, CacheStats};
use super::expression::{ExpressionParser, ParsedExpression};
use crate::config::{CacheConfig, DEFAULT_STATIC_MARKER, MapperConfig};
use crate::error::{MapperError, Result};
use crate::path::segments::{WILDCARD, has_wildcard, join_path, wildcard_prefix};
use once_cell::sync::Lazy;
use rustc_hash::FxHasher;
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A leaf cell of a mapping table
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEntry {
    /// Literal written as is
    Static(Value),
    /// Value resolved from the source (or the target, for aliases)
    Dynamic(Arc<ParsedExpression>),
}

impl ParsedEntry {
    /// Whether the entry bypasses resolution
    pub fn is_static(&self) -> bool {
        matches!(self, ParsedEntry::Static(_))
    }

    /// The expression of a dynamic entry
    pub fn expression(&self) -> Option<&ParsedExpression> {
        match self {
            ParsedEntry::Static(_) => None,
            ParsedEntry::Dynamic(expr) => Some(expr),
        }
    }
}

/// An operator named next to a `*` item template
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDirective {
    /// Operator name as written (`WHERE`, `order by`, ...)
    pub name: String,
    /// Raw operator configuration
    pub config: Value,
}

/// What each surviving item of a wildcard block is mapped through
#[derive(Debug, Clone, PartialEq)]
pub enum ItemTemplate {
    /// A single cell producing the item value
    Entry(ParsedEntry),
    /// A sub-table producing an object per item
    Plan(Vec<PlanEntry>),
}

/// Collection expansion with an operator pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardBlock {
    /// Path of the collection the wildcard iterates (`products` for `products.*.id`)
    pub collection_path: String,
    /// Operators in declaration order
    pub operators: Vec<OperatorDirective>,
    /// Per-item template
    pub item: ItemTemplate,
}

impl WildcardBlock {
    /// Item-relative remainder of a path rooted at this collection's wildcard
    ///
    /// With collection `products`, `products.*.name` gives `name` and `products.*`
    /// gives the empty path. Paths outside the collection give `None`.
    pub fn item_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = if self.collection_path.is_empty() {
            path
        } else {
            path.strip_prefix(self.collection_path.as_str())?
                .strip_prefix('.')?
        };
        let rest = rest.strip_prefix(WILDCARD)?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('.')
        }
    }
}

/// A node of the plan tree
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Leaf cell
    Entry(ParsedEntry),
    /// Wildcard operator block
    Block(WildcardBlock),
}

/// One target path with how to produce it
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// Dot-path in the target (nested tables already flattened)
    pub target_path: String,
    /// Producer
    pub node: PlanNode,
}

/// Parsed mapping table in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct MappingPlan {
    entries: Vec<PlanEntry>,
    fingerprint: u64,
}

impl MappingPlan {
    /// Entries in declaration order
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Entry writing `target_path`
    pub fn get(&self, target_path: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.target_path == target_path)
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content hash of the table this plan was built from
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// [`fingerprint`](Self::fingerprint) as lowercase hex
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint.to_be_bytes())
    }
}

type PlanCache = BoundedCache<u64, (Arc<str>, Arc<MappingPlan>)>;

/// Parser for whole mapping tables, with a content-hash plan cache
#[derive(Debug)]
pub struct MappingParser {
    expressions: Arc<ExpressionParser>,
    cache: PlanCache,
}

static GLOBAL_MAPPING_PARSER: Lazy<Arc<MappingParser>> = Lazy::new(|| {
    let config = MapperConfig::from_env();
    Arc::new(MappingParser::new(
        ExpressionParser::global(config.parse_mode()),
        &config.cache,
    ))
});

impl Default for MappingParser {
    fn default() -> Self {
        Self::new(Arc::new(ExpressionParser::default()), &CacheConfig::default())
    }
}

impl MappingParser {
    /// Create a parser backed by `expressions`
    pub fn new(expressions: Arc<ExpressionParser>, cache: &CacheConfig) -> Self {
        Self {
            expressions,
            cache: BoundedCache::new("mapping", cache.max_entries),
        }
    }

    /// Process-wide parser configured from the environment
    pub fn global() -> Arc<MappingParser> {
        Arc::clone(&GLOBAL_MAPPING_PARSER)
    }

    /// Expression parser used for individual cells
    pub fn expressions(&self) -> &Arc<ExpressionParser> {
        &self.expressions
    }

    /// Parse `table` into a plan, reusing a cached plan for identical content
    pub fn parse_mapping(&self, table: &Value, static_marker: &str) -> Result<Arc<MappingPlan>> {
        let Value::Object(map) = table else {
            return Err(MapperError::invalid_mapping(format!(
                "mapping table must be an object, got {}",
                crate::model::compare::type_name(table)
            )));
        };

        let canonical = canonical_text(table, static_marker)?;
        let fingerprint = content_hash(&canonical);
        if let Some((text, plan)) = self.cache.get(&fingerprint) {
            if *text == *canonical {
                return Ok(plan);
            }
            log::debug!("Mapping plan hash collision on {fingerprint:016x}, reparsing");
        }

        let entries = self.parse_table(map, "", static_marker)?;
        log::debug!(
            "Built mapping plan {fingerprint:016x} with {} entries",
            entries.len()
        );
        let plan = Arc::new(MappingPlan {
            entries,
            fingerprint,
        });
        self.cache
            .insert(fingerprint, (Arc::from(canonical), Arc::clone(&plan)));
        Ok(plan)
    }

    /// Parse with the default static marker
    pub fn parse(&self, table: &Value) -> Result<Arc<MappingPlan>> {
        self.parse_mapping(table, DEFAULT_STATIC_MARKER)
    }

    /// Classify a single cell outside of any table
    pub fn parse_cell(&self, cell: &Value, static_marker: &str) -> Result<ParsedEntry> {
        match self.parse_node(cell, "", static_marker)? {
            PlanNode::Entry(entry) => Ok(entry),
            PlanNode::Block(_) => Err(MapperError::invalid_mapping(
                "a wildcard block is not a single cell",
            )),
        }
    }

    /// Drop all cached plans
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Plan cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn parse_table(
        &self,
        table: &Map<String, Value>,
        prefix: &str,
        marker: &str,
    ) -> Result<Vec<PlanEntry>> {
        let mut entries = Vec::with_capacity(table.len());
        for (key, cell) in table {
            if key.trim().is_empty() {
                return Err(MapperError::invalid_mapping(format!(
                    "empty target key under '{prefix}'"
                )));
            }
            let target_path = join_path(prefix, key);
            match cell {
                Value::Object(nested) if is_nested_table(nested, marker) => {
                    entries.extend(self.parse_table(nested, &target_path, marker)?);
                }
                _ => {
                    let node = self.parse_node(cell, &target_path, marker)?;
                    entries.push(PlanEntry { target_path, node });
                }
            }
        }
        Ok(entries)
    }

    fn parse_node(&self, cell: &Value, target_path: &str, marker: &str) -> Result<PlanNode> {
        let entry = match cell {
            Value::String(text) => self.parse_string(text)?,
            Value::Object(map) if map.contains_key(marker) => {
                ParsedEntry::Static(map.get(marker).cloned().unwrap_or(Value::Null))
            }
            Value::Object(map) if map.contains_key(WILDCARD) => {
                return self.parse_block(map, target_path, marker).map(PlanNode::Block);
            }
            Value::Object(map) if map.is_empty() => ParsedEntry::Static(Value::Object(Map::new())),
            other => ParsedEntry::Static(other.clone()),
        };
        Ok(PlanNode::Entry(entry))
    }

    fn parse_string(&self, text: &str) -> Result<ParsedEntry> {
        if let Some(expr) = self.expressions.parse(text)? {
            return Ok(ParsedEntry::Dynamic(expr));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(ParsedEntry::Static(Value::String(text.to_string())));
        }
        if trimmed.contains('|') || trimmed.contains("??") {
            let expr = self.expressions.parse_body(trimmed)?;
            return Ok(ParsedEntry::Dynamic(Arc::new(expr)));
        }
        Ok(ParsedEntry::Dynamic(Arc::new(ParsedExpression::path(trimmed))))
    }

    fn parse_block(
        &self,
        block: &Map<String, Value>,
        target_path: &str,
        marker: &str,
    ) -> Result<WildcardBlock> {
        let mut item = None;
        let mut operators = Vec::new();
        for (key, config) in block {
            if key == WILDCARD {
                item = Some(match config {
                    Value::Object(nested) if is_nested_table(nested, marker) => {
                        ItemTemplate::Plan(self.parse_table(nested, "", marker)?)
                    }
                    other => match self.parse_node(other, "", marker)? {
                        PlanNode::Entry(entry) => ItemTemplate::Entry(entry),
                        PlanNode::Block(nested) => ItemTemplate::Plan(vec![PlanEntry {
                            target_path: String::new(),
                            node: PlanNode::Block(nested),
                        }]),
                    },
                });
            } else {
                operators.push(OperatorDirective {
                    name: key.clone(),
                    config: config.clone(),
                });
            }
        }
        let item = item.unwrap_or(ItemTemplate::Entry(ParsedEntry::Static(Value::Null)));

        let collection_path = item_collection_path(&item)
            .map(str::to_string)
            .or_else(|| self.operator_collection_path(&operators))
            .ok_or_else(|| {
                MapperError::invalid_mapping(format!(
                    "wildcard block at '{target_path}' references no collection"
                ))
            })?;
        log::trace!(
            "Wildcard block at '{target_path}' iterates '{collection_path}' through {} operators",
            operators.len()
        );
        Ok(WildcardBlock {
            collection_path,
            operators,
            item,
        })
    }

    fn operator_collection_path(&self, operators: &[OperatorDirective]) -> Option<String> {
        operators
            .iter()
            .find_map(|op| self.config_collection_path(&op.config))
    }

    fn config_collection_path(&self, config: &Value) -> Option<String> {
        match config {
            Value::String(text) => self.template_collection_path(text),
            Value::Array(items) => items.iter().find_map(|v| self.config_collection_path(v)),
            Value::Object(map) => map.iter().find_map(|(key, value)| {
                self.template_collection_path(key)
                    .or_else(|| self.config_collection_path(value))
            }),
            _ => None,
        }
    }

    fn template_collection_path(&self, text: &str) -> Option<String> {
        let expr = self.expressions.parse(text).ok()??;
        if expr.is_alias() {
            return None;
        }
        wildcard_prefix(&expr.path).map(str::to_string)
    }
}

fn is_nested_table(map: &Map<String, Value>, marker: &str) -> bool {
    !map.is_empty() && !map.contains_key(marker) && !map.contains_key(WILDCARD)
}

fn item_collection_path(item: &ItemTemplate) -> Option<&str> {
    match item {
        ItemTemplate::Entry(entry) => entry_collection_path(entry),
        ItemTemplate::Plan(entries) => entries.iter().find_map(|e| match &e.node {
            PlanNode::Entry(entry) => entry_collection_path(entry),
            PlanNode::Block(block) if has_wildcard(&block.collection_path) => {
                wildcard_prefix(&block.collection_path)
            }
            PlanNode::Block(_) => None,
        }),
    }
}

fn entry_collection_path(entry: &ParsedEntry) -> Option<&str> {
    let expr = entry.expression()?;
    if expr.is_alias() {
        return None;
    }
    wildcard_prefix(&expr.path)
}

fn canonical_text(table: &Value, marker: &str) -> Result<String> {
    let json = serde_json::to_string(table)?;
    let mut text = String::with_capacity(marker.len() + json.len() + 1);
    text.push_str(marker);
    text.push('\u{0}');
    text.push_str(&json);
    Ok(text)
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}
