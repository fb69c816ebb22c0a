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

//! Mapping engine
//!
//! [`DataMapper`] drives a run: parse the table (cached), order the entries so alias
//! producers come first, then resolve, filter, hook and write each entry into the
//! target. Missing data degrades to defaults or `null`; configuration errors (unknown
//! filters or operators, malformed tables) abort the run.
//!
//! ```
//! use datamap::{DataMapper, Mapping};
//! use serde_json::json;
//!
//! let mapper = DataMapper::new();
//! let mapping = Mapping::new(json!({"profile.name": "{{ user.name | upper }}"}));
//! let out = mapper.map(&json!({"user": {"name": "alice"}}), &mapping).unwrap();
//! assert_eq!(out, json!({"profile": {"name": "ALICE"}}));
//! ```

use super::events::{DiagnosticSink, MappingEvent};
use super::hooks::{HookContext, HookKind, HookOutcome, Hooks};
use super::plan::execution_order;
use super::reverser::MappingReverser;
use super::wildcard::{
    ItemAction, normalize_value, normalize_wildcard_array, positions_to_value,
    try_iterate_wildcard_items,
};
use crate::config::{CacheConfig, MapperConfig};
use crate::error::{MapperError, Result};
use crate::model::DataSource;
use crate::parser::{
    ExpressionParser, ItemTemplate, MappingParser, MappingPlan, ParseMode, ParsedEntry,
    ParsedExpression, PlanEntry, PlanNode, WildcardBlock,
};
use crate::path::accessor::{self, lookup};
use crate::path::mutator::{set_in, set_wildcard_in};
use crate::path::segments::{
    WILDCARD, has_wildcard, join_path, split_path, wildcard_count, wildcard_indices,
    wildcard_prefix,
};
use crate::registry::{FilterEngine, FilterRegistry, ItemSet, OperatorContext, OperatorRegistry};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Mode tag of [`DataMapper::map`] runs, visible to `mode:` hook filters
pub const MODE_MAP: &str = "map";
/// Mode tag of [`DataMapper::map_from_template`] runs
pub const MODE_TEMPLATE: &str = "template";
/// Mode tag of [`DataMapper::inverse_map`] runs
pub const MODE_INVERSE: &str = "inverse";

/// Callable producing a target value from the source and the target built so far
pub type EntryCallback = Arc<dyn Fn(&dyn DataSource, &Value) -> Value + Send + Sync>;

/// A mapping table plus callables that cannot live in JSON
#[derive(Clone)]
pub struct Mapping {
    table: Value,
    callbacks: Vec<(String, EntryCallback)>,
}

impl Default for Mapping {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl From<Value> for Mapping {
    fn from(table: Value) -> Self {
        Self::new(table)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("table", &self.table)
            .field(
                "callbacks",
                &self.callbacks.iter().map(|(path, _)| path).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Mapping {
    /// Wrap a `target => cell` table
    pub fn new(table: Value) -> Self {
        Self {
            table,
            callbacks: Vec::new(),
        }
    }

    /// Parse the table from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Build a table from parallel lists: `targets[i]` is read from `sources[i]`
    pub fn from_parallel(sources: &Value, targets: &Value) -> Result<Self> {
        let (Value::Array(sources), Value::Array(targets)) = (sources, targets) else {
            return Err(MapperError::invalid_mapping(
                "parallel mappings need a source list and a target list",
            ));
        };
        if sources.len() != targets.len() {
            return Err(MapperError::invalid_mapping(format!(
                "{} source paths for {} target paths",
                sources.len(),
                targets.len()
            )));
        }
        let mut table = Map::new();
        for (index, (source, target)) in sources.iter().zip(targets).enumerate() {
            table.insert(target_key(target, index)?, source.clone());
        }
        Ok(Self::new(Value::Object(table)))
    }

    /// Build a table from `[[source, target], ...]` pairs
    pub fn from_pairs(pairs: &Value) -> Result<Self> {
        let Value::Array(pairs) = pairs else {
            return Err(MapperError::invalid_mapping("mapping pairs must be a list"));
        };
        let mut table = Map::new();
        for (index, pair) in pairs.iter().enumerate() {
            match pair {
                Value::Array(parts) if parts.len() == 2 => {
                    table.insert(target_key(&parts[1], index)?, parts[0].clone());
                }
                other => {
                    return Err(MapperError::invalid_mapping(format!(
                        "mapping pair {index} must be [source, target], got {other}"
                    )));
                }
            }
        }
        Ok(Self::new(Value::Object(table)))
    }

    /// Compute `target_path` with a callable, after all table entries
    pub fn with_callback<F>(mut self, target_path: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&dyn DataSource, &Value) -> Value + Send + Sync + 'static,
    {
        self.callbacks.push((target_path.into(), Arc::new(callback)));
        self
    }

    /// The JSON table
    pub fn table(&self) -> &Value {
        &self.table
    }

    /// Target paths computed by callables
    pub fn callback_targets(&self) -> impl Iterator<Item = &str> {
        self.callbacks.iter().map(|(path, _)| path.as_str())
    }
}

fn target_key(target: &Value, index: usize) -> Result<String> {
    match target {
        Value::String(key) if !key.trim().is_empty() => Ok(key.clone()),
        other => Err(MapperError::invalid_mapping(format!(
            "target {index} must be a non-empty string, got {other}"
        ))),
    }
}

/// Template-driven mapper
#[derive(Clone)]
pub struct DataMapper {
    parser: Arc<MappingParser>,
    filters: FilterEngine,
    operators: Arc<OperatorRegistry>,
    skip_null: bool,
    reindex_wildcard: bool,
    static_marker: String,
    hooks: Arc<Hooks>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Default for DataMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMapper")
            .field("skip_null", &self.skip_null)
            .field("reindex_wildcard", &self.reindex_wildcard)
            .field("static_marker", &self.static_marker)
            .field("parse_mode", &self.parser.expressions().mode())
            .field("hooks", &self.hooks)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl DataMapper {
    /// Mapper over the process-wide parser and registries, configured from the
    /// environment
    pub fn new() -> Self {
        let config = MapperConfig::from_env();
        Self::assemble(MappingParser::global(), &config)
    }

    /// Mapper with its own parser caches sized and moded by `config`
    pub fn from_config(config: &MapperConfig) -> Self {
        let expressions = Arc::new(ExpressionParser::new(config.parse_mode(), &config.cache));
        let parser = Arc::new(MappingParser::new(expressions, &config.cache));
        Self::assemble(parser, config)
    }

    fn assemble(parser: Arc<MappingParser>, config: &MapperConfig) -> Self {
        Self {
            parser,
            filters: FilterEngine::default(),
            operators: OperatorRegistry::global(),
            skip_null: config.skip_null,
            reindex_wildcard: config.reindex_wildcard,
            static_marker: config.static_marker.clone(),
            hooks: Arc::new(Hooks::new()),
            sink: None,
        }
    }

    /// Use a different mapping parser (and its caches)
    pub fn with_parser(mut self, parser: Arc<MappingParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Switch the argument splitting mode; the mapper gets fresh caches
    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        let cache = CacheConfig::default();
        self.parser = Arc::new(MappingParser::new(
            Arc::new(ExpressionParser::new(mode, &cache)),
            &cache,
        ));
        self
    }

    /// Resolve filters in `registry`
    pub fn with_filter_registry(mut self, registry: Arc<FilterRegistry>) -> Self {
        self.filters = FilterEngine::new(registry);
        self
    }

    /// Resolve operators in `registry`
    pub fn with_operator_registry(mut self, registry: Arc<OperatorRegistry>) -> Self {
        self.operators = registry;
        self
    }

    /// Whether `null` results are left unwritten
    pub fn with_skip_null(mut self, skip_null: bool) -> Self {
        self.skip_null = skip_null;
        self
    }

    /// Whether wildcard output is compacted to `0..n-1`
    pub fn with_reindex_wildcard(mut self, reindex: bool) -> Self {
        self.reindex_wildcard = reindex;
        self
    }

    /// Key marking literal cells
    pub fn with_static_marker(mut self, marker: impl Into<String>) -> Self {
        self.static_marker = marker.into();
        self
    }

    /// Lifecycle hooks fired during every run
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Receiver for diagnostics
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Mapping parser in use
    pub fn parser(&self) -> &Arc<MappingParser> {
        &self.parser
    }

    /// Filter engine in use
    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    /// Operator registry in use
    pub fn operators(&self) -> &Arc<OperatorRegistry> {
        &self.operators
    }

    /// Whether `null` results are left unwritten
    pub fn skips_null(&self) -> bool {
        self.skip_null
    }

    /// Whether wildcard output is compacted
    pub fn reindexes_wildcard(&self) -> bool {
        self.reindex_wildcard
    }

    /// Key marking literal cells
    pub fn static_marker(&self) -> &str {
        &self.static_marker
    }

    /// Map `source` into a fresh object
    pub fn map(&self, source: &dyn DataSource, mapping: &Mapping) -> Result<Value> {
        self.map_onto(source, Value::Object(Map::new()), mapping)
    }

    /// Map `source` into an existing target
    pub fn map_onto(
        &self,
        source: &dyn DataSource,
        target: Value,
        mapping: &Mapping,
    ) -> Result<Value> {
        self.run(source, target, &mapping.table, &mapping.callbacks, MODE_MAP)
    }

    /// Map and deserialize the result into a new `T`
    pub fn map_into<T: DeserializeOwned>(
        &self,
        source: &dyn DataSource,
        mapping: &Mapping,
    ) -> Result<T> {
        let value = self.map(source, mapping)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Render a nested template against named sources
    pub fn map_from_template(&self, sources: &dyn DataSource, template: &Value) -> Result<Value> {
        self.run(sources, Value::Object(Map::new()), template, &[], MODE_TEMPLATE)
    }

    /// Map every source with the same mapping; the first error stops the batch
    pub fn map_many<S: DataSource>(&self, sources: &[S], mapping: &Mapping) -> Result<Vec<Value>> {
        sources.iter().map(|source| self.map(source, mapping)).collect()
    }

    /// Map `data` back through the reversed `template`
    pub fn inverse_map(&self, data: &dyn DataSource, template: &Value) -> Result<Value> {
        let reversed = MappingReverser::new(Arc::clone(self.parser.expressions()))
            .with_static_marker(self.static_marker.clone())
            .reverse_template(template);
        self.run(data, Value::Object(Map::new()), &reversed, &[], MODE_INVERSE)
    }

    fn run(
        &self,
        source: &dyn DataSource,
        mut target: Value,
        table: &Value,
        callbacks: &[(String, EntryCallback)],
        mode: &str,
    ) -> Result<Value> {
        let plan = self.parser.parse_mapping(table, &self.static_marker)?;
        self.validate(plan.entries())?;
        let run = Run {
            mapper: self,
            source,
            hooks: (!self.hooks.is_empty()).then_some(&*self.hooks),
            sink: self.sink.as_deref(),
            mode,
        };
        run.execute(&plan, &mut target, callbacks)?;
        Ok(target)
    }

    fn validate(&self, entries: &[PlanEntry]) -> Result<()> {
        entries.iter().try_for_each(|entry| self.validate_node(&entry.node))
    }

    fn validate_node(&self, node: &PlanNode) -> Result<()> {
        match node {
            PlanNode::Entry(entry) => self.validate_entry(entry),
            PlanNode::Block(block) => {
                for directive in &block.operators {
                    self.operators.get(&directive.name)?;
                }
                match &block.item {
                    ItemTemplate::Entry(entry) => self.validate_entry(entry),
                    ItemTemplate::Plan(entries) => self.validate(entries),
                }
            }
        }
    }

    fn validate_entry(&self, entry: &ParsedEntry) -> Result<()> {
        match entry.expression() {
            Some(expr) => self.filters.validate(&expr.filters),
            None => Ok(()),
        }
    }
}

/// Enclosing wildcard items while mapping a block's item template
struct Scope<'s> {
    block: &'s WildcardBlock,
    item: &'s Value,
    parent: Option<&'s Scope<'s>>,
}

impl<'s> Scope<'s> {
    /// Innermost item whose collection roots `path`, with the item-relative rest
    fn locate<'p>(&self, path: &'p str) -> Option<(&'s Value, &'p str)> {
        if let Some(rest) = self.block.item_path(path) {
            return Some((self.item, rest));
        }
        self.parent.and_then(|parent| parent.locate(path))
    }
}

/// State of a single mapping run
struct Run<'r> {
    mapper: &'r DataMapper,
    source: &'r dyn DataSource,
    hooks: Option<&'r Hooks>,
    sink: Option<&'r dyn DiagnosticSink>,
    mode: &'r str,
}

impl Run<'_> {
    fn expressions(&self) -> &ExpressionParser {
        self.mapper.parser.expressions()
    }

    fn fire(
        &self,
        kind: HookKind,
        source_path: Option<&str>,
        target_path: Option<&str>,
        item_index: Option<usize>,
        target: &Value,
        value: &Value,
    ) -> HookOutcome {
        let Some(hooks) = self.hooks else {
            return HookOutcome::Continue;
        };
        if !hooks.has(kind) {
            return HookOutcome::Continue;
        }
        let context = HookContext {
            kind,
            source_path,
            target_path,
            mode: self.mode,
            item_index,
            target,
        };
        hooks.invoke(&context, value)
    }

    fn notify(&self, event: impl FnOnce() -> MappingEvent) {
        if let Some(sink) = self.sink {
            sink.notify(&event());
        }
    }

    fn execute(
        &self,
        plan: &MappingPlan,
        target: &mut Value,
        callbacks: &[(String, EntryCallback)],
    ) -> Result<()> {
        match self.fire(HookKind::BeforeAll, None, None, None, &*target, &*target) {
            HookOutcome::Skip => return Ok(()),
            HookOutcome::Replace(value) => *target = value,
            HookOutcome::Continue => {}
        }

        let entries = plan.entries();
        let order = execution_order(entries, self.expressions());
        if order.has_cycle() {
            self.notify(|| MappingEvent::AliasCycle {
                targets: order
                    .cyclic
                    .iter()
                    .map(|&i| entries[i].target_path.clone())
                    .collect(),
            });
        }
        for index in order.order {
            self.run_entry(&entries[index], target)?;
        }
        for (target_path, callback) in callbacks {
            self.run_callback(target_path, callback.as_ref(), target)?;
        }

        if let HookOutcome::Replace(value) = self.fire(
            HookKind::AfterAll,
            None,
            None,
            None,
            &*target,
            &*target,
        ) {
            *target = value;
        }
        Ok(())
    }

    fn run_entry(&self, entry: &PlanEntry, target: &mut Value) -> Result<()> {
        let target_path = entry.target_path.as_str();
        match &entry.node {
            PlanNode::Entry(ParsedEntry::Static(literal)) => {
                self.run_static(target_path, literal, target)
            }
            PlanNode::Entry(ParsedEntry::Dynamic(expr)) if expr.has_wildcard() => {
                self.run_wildcard(target_path, expr, target)
            }
            PlanNode::Entry(ParsedEntry::Dynamic(expr)) => {
                self.run_single(target_path, expr, target)
            }
            PlanNode::Block(block) => self.run_block(target_path, block, target),
        }
    }

    fn run_static(&self, target_path: &str, literal: &Value, target: &mut Value) -> Result<()> {
        let value = match self.fire(
            HookKind::BeforePair,
            None,
            Some(target_path),
            None,
            target,
            &NULL,
        ) {
            HookOutcome::Skip => return Ok(()),
            HookOutcome::Replace(value) => value,
            HookOutcome::Continue => literal.clone(),
        };
        self.write(target_path, None, value, target, |t, v| set_in(t, target_path, v))
    }

    fn run_single(
        &self,
        target_path: &str,
        expr: &ParsedExpression,
        target: &mut Value,
    ) -> Result<()> {
        let source_path = Some(expr.path.as_str());
        let resolved = match self.fire(
            HookKind::BeforePair,
            source_path,
            Some(target_path),
            None,
            target,
            &NULL,
        ) {
            HookOutcome::Skip => return Ok(()),
            HookOutcome::Replace(value) => value,
            HookOutcome::Continue => self.resolve(target_path, expr, None, target)?,
        };
        let Some(value) = self.transform_stage(
            target_path,
            source_path,
            None,
            expr,
            resolved,
            target,
        )? else {
            self.end_pair(target_path, source_path, target, &NULL);
            return Ok(());
        };
        if value.is_null() && self.mapper.skip_null {
            self.notify(|| MappingEvent::SkippedNull {
                target_path: target_path.to_string(),
            });
            self.end_pair(target_path, source_path, target, &value);
            return Ok(());
        }
        self.write(target_path, source_path, value, target, |t, v| set_in(t, target_path, v))
    }

    /// BeforeTransform, filters, AfterTransform; `None` when a hook dropped the value
    fn transform_stage(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        item_index: Option<usize>,
        expr: &ParsedExpression,
        value: Value,
        target: &Value,
    ) -> Result<Option<Value>> {
        let value = match self.fire(
            HookKind::BeforeTransform,
            source_path,
            Some(target_path),
            item_index,
            target,
            &value,
        ) {
            HookOutcome::Skip => return Ok(None),
            HookOutcome::Replace(replaced) => replaced,
            HookOutcome::Continue => value,
        };
        let value = self.transform(expr, value)?;
        Ok(match self.fire(
            HookKind::AfterTransform,
            source_path,
            Some(target_path),
            item_index,
            target,
            &value,
        ) {
            HookOutcome::Skip => None,
            HookOutcome::Replace(replaced) => Some(replaced),
            HookOutcome::Continue => Some(value),
        })
    }

    fn run_wildcard(
        &self,
        target_path: &str,
        expr: &ParsedExpression,
        target: &mut Value,
    ) -> Result<()> {
        let source_path = Some(expr.path.as_str());
        let pattern = expr.alias_key().unwrap_or(&expr.path);

        let (values, concrete): (Vec<Value>, Vec<Option<String>>) =
            match self.fire(
                HookKind::BeforePair,
                source_path,
                Some(target_path),
                None,
                target,
                &NULL,
            ) {
                HookOutcome::Skip => return Ok(()),
                HookOutcome::Replace(value) => {
                    let values = normalize_value(value);
                    let slots = vec![None; values.len()];
                    (values, slots)
                }
                HookOutcome::Continue => {
                    let from: &dyn DataSource = if expr.is_alias() {
                        &*target
                    } else {
                        self.source
                    };
                    let expanded = accessor::get_wildcard(from, pattern, Value::Null)?;
                    if expanded.is_empty() && expr.is_alias() {
                        self.notify(|| MappingEvent::UnresolvedAlias {
                            target_path: target_path.to_string(),
                            alias: pattern.to_string(),
                        });
                    }
                    expanded.into_iter().map(|(path, value)| (value, Some(path))).unzip()
                }
            };

        let values = match &expr.default {
            Some(default) => values
                .into_iter()
                .map(|v| if v.is_null() { default.clone() } else { v })
                .collect(),
            None => values,
        };

        let skip_null = self.mapper.skip_null;
        let snapshot: &Value = &*target;
        let positions = try_iterate_wildcard_items(
            values,
            skip_null,
            false,
            |index, _| log::trace!("Skipping null item {index} of '{pattern}'"),
            |index, value| -> Result<ItemAction> {
                let item_path = concrete.get(index).and_then(|p| p.as_deref()).or(source_path);
                let Some(value) =
                    self.transform_stage(
                        target_path,
                        item_path,
                        Some(index),
                        expr,
                        value,
                        snapshot,
                    )?
                else {
                    return Ok(ItemAction::Skip);
                };
                if skip_null && value.is_null() {
                    return Ok(ItemAction::Skip);
                }
                Ok(ItemAction::Write(value))
            },
        )?;

        self.write_positions(target_path, source_path, pattern, positions, &concrete, target)
    }

    fn write_positions(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        pattern: &str,
        positions: Vec<(usize, Value)>,
        concrete: &[Option<String>],
        target: &mut Value,
    ) -> Result<()> {
        let reindex = self.mapper.reindex_wildcard;
        let collection_path = wildcard_prefix(target_path).unwrap_or(target_path);
        let wildcards = wildcard_count(target_path);
        let whole = wildcards == 0
            || (wildcards == 1 && (target_path == WILDCARD || target_path.ends_with(".*")));

        if whole || self.hooks.is_some() {
            let collected = positions_to_value(positions.clone(), reindex);
            match self.gate_write(target_path, source_path, collected, target) {
                None => return Ok(()),
                Some((value, replaced)) if whole || replaced => {
                    let destination = if wildcards == 0 { target_path } else { collection_path };
                    let echo = self.hooks.map(|_| value.clone());
                    set_in(target, destination, value)?;
                    self.after_write(
                        target_path,
                        source_path,
                        target,
                        echo.as_ref().unwrap_or(&NULL),
                    );
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        let slots: Vec<(Vec<String>, Value)> = if wildcards == 1 {
            positions
                .into_iter()
                .enumerate()
                .map(|(ordinal, (position, value))| {
                    let slot = if reindex { ordinal } else { position };
                    (vec![slot.to_string()], value)
                })
                .collect()
        } else {
            let slots = positions
                .into_iter()
                .map(|(position, value)| {
                    let indices = concrete
                        .get(position)
                        .and_then(|p| p.as_deref())
                        .and_then(|path| wildcard_indices(pattern, path))
                        .unwrap_or_else(|| vec![position.to_string()]);
                    (indices, value)
                })
                .collect();
            if reindex { densify(slots) } else { slots }
        };
        let echo = self.hooks.map(|_| {
            Value::Array(slots.iter().map(|(_, value)| value.clone()).collect())
        });
        set_wildcard_in(target, target_path, slots)?;
        self.after_write(target_path, source_path, target, echo.as_ref().unwrap_or(&NULL));
        Ok(())
    }

    fn run_block(
        &self,
        target_path: &str,
        block: &WildcardBlock,
        target: &mut Value,
    ) -> Result<()> {
        let source_path = Some(block.collection_path.as_str());
        let preset = match self.fire(
            HookKind::BeforePair,
            source_path,
            Some(target_path),
            None,
            target,
            &NULL,
        ) {
            HookOutcome::Skip => return Ok(()),
            HookOutcome::Replace(value) => Some(value),
            HookOutcome::Continue => None,
        };
        let values = self.block_values(block, None, target, preset, Some(target_path))?;
        self.write(target_path, source_path, Value::Array(values), target, |t, v| {
            set_in(t, target_path, v)
        })
    }

    /// Expand the block's collection, run its operators and map each survivor
    fn block_values(
        &self,
        block: &WildcardBlock,
        scope: Option<&Scope<'_>>,
        target: &Value,
        preset: Option<Value>,
        hook_target: Option<&str>,
    ) -> Result<Vec<Value>> {
        let collection = match preset {
            Some(value) => Some(value),
            None => self.collection(block, scope, target)?,
        };
        let mut items = item_set(collection);
        if !block.operators.is_empty() {
            let original = items.clone();
            let context = OperatorContext::new(target, &original)
                .with_source(self.source)
                .wildcard_mode(true)
                .with_parser(self.expressions());
            for directive in &block.operators {
                let operator = self.mapper.operators.get(&directive.name)?;
                let before = items.len();
                items = operator.apply(items, &directive.config, &context)?;
                log::trace!(
                    "{} on '{}' kept {} of {before} items",
                    operator.name(),
                    block.collection_path,
                    items.len()
                );
            }
        }

        let mut out = Vec::with_capacity(items.len());
        for (ordinal, (key, item)) in items.into_iter().enumerate() {
            let item_source = join_path(&block.collection_path, &key);
            let item = match hook_target {
                Some(tp) => match self.fire(
                    HookKind::BeforeTransform,
                    Some(&item_source),
                    Some(tp),
                    Some(ordinal),
                    target,
                    &item,
                ) {
                    HookOutcome::Skip => continue,
                    HookOutcome::Replace(replaced) => replaced,
                    HookOutcome::Continue => item,
                },
                None => item,
            };
            let scope = Scope {
                block,
                item: &item,
                parent: scope,
            };
            let mapped = self.map_item(&block.item, &scope, target)?;
            let mapped = match hook_target {
                Some(tp) => match self.fire(
                    HookKind::AfterTransform,
                    Some(&item_source),
                    Some(tp),
                    Some(ordinal),
                    target,
                    &mapped,
                ) {
                    HookOutcome::Skip => continue,
                    HookOutcome::Replace(replaced) => replaced,
                    HookOutcome::Continue => mapped,
                },
                None => mapped,
            };
            if mapped.is_null() && self.mapper.skip_null {
                continue;
            }
            out.push(mapped);
        }
        Ok(out)
    }

    fn collection(
        &self,
        block: &WildcardBlock,
        scope: Option<&Scope<'_>>,
        target: &Value,
    ) -> Result<Option<Value>> {
        let path = block.collection_path.as_str();
        if let Some(alias) = path.strip_prefix('@') {
            return self.read_value(target, alias);
        }
        if let Some(scope) = scope {
            if let Some((item, rest)) = scope.locate(path) {
                return self.read_value(item, rest);
            }
            if let Some(found) = lookup(scope.item, &split_path(path)) {
                return Ok(Some(found));
            }
        }
        self.read_value(self.source, path)
    }

    fn map_item(
        &self,
        template: &ItemTemplate,
        scope: &Scope<'_>,
        target: &Value,
    ) -> Result<Value> {
        match template {
            ItemTemplate::Entry(entry) => self.eval_entry("", entry, scope, target),
            ItemTemplate::Plan(entries) => {
                let mut out = Value::Object(Map::new());
                for entry in entries {
                    let value = match &entry.node {
                        PlanNode::Entry(ParsedEntry::Static(literal)) => literal.clone(),
                        PlanNode::Entry(cell) => {
                            let value = self.eval_entry(&entry.target_path, cell, scope, target)?;
                            if value.is_null() && self.mapper.skip_null {
                                continue;
                            }
                            value
                        }
                        PlanNode::Block(block) => {
                            Value::Array(self.block_values(block, Some(scope), target, None, None)?)
                        }
                    };
                    set_in(&mut out, &entry.target_path, value)?;
                }
                Ok(out)
            }
        }
    }

    fn eval_entry(
        &self,
        target_path: &str,
        entry: &ParsedEntry,
        scope: &Scope<'_>,
        target: &Value,
    ) -> Result<Value> {
        match entry {
            ParsedEntry::Static(literal) => Ok(literal.clone()),
            ParsedEntry::Dynamic(expr) => {
                let value = self.resolve(target_path, expr, Some(scope), target)?;
                self.transform(expr, value)
            }
        }
    }

    /// Resolve an expression's path with its default applied
    fn resolve(
        &self,
        target_path: &str,
        expr: &ParsedExpression,
        scope: Option<&Scope<'_>>,
        target: &Value,
    ) -> Result<Value> {
        let found = if let Some(alias) = expr.alias_key() {
            let found = self.read_value(target, alias)?;
            if found.is_none() {
                log::debug!("Alias '@{alias}' is not written yet for '{target_path}'");
                self.notify(|| MappingEvent::UnresolvedAlias {
                    target_path: target_path.to_string(),
                    alias: alias.to_string(),
                });
            }
            found
        } else if let Some((item, rest)) = scope.and_then(|s| s.locate(&expr.path)) {
            self.read_value(item, rest)?
        } else {
            self.read_value(self.source, &expr.path)?
        };
        Ok(match found {
            Some(value) => value,
            None => match &expr.default {
                Some(default) => default.clone(),
                None => {
                    if !expr.is_alias() {
                        self.notify(|| MappingEvent::MissingValue {
                            target_path: target_path.to_string(),
                            source_path: expr.path.clone(),
                        });
                    }
                    Value::Null
                }
            },
        })
    }

    /// Value at `path`; `None` for missing or `null`
    ///
    /// Wildcard paths give the expanded values as a list.
    fn read_value(&self, from: &dyn DataSource, path: &str) -> Result<Option<Value>> {
        if has_wildcard(path) {
            let expanded = accessor::get_wildcard(from, path, Value::Null)?;
            if expanded.is_empty() {
                return Ok(None);
            }
            let values = normalize_wildcard_array(expanded)
                .into_iter()
                .filter(|value| !(self.mapper.skip_null && value.is_null()))
                .collect();
            return Ok(Some(Value::Array(values)));
        }
        let value = accessor::get(from, path, Value::Null)?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Filters with the default re-applied to a `null` result
    fn transform(&self, expr: &ParsedExpression, value: Value) -> Result<Value> {
        if expr.filters.is_empty() {
            return Ok(value);
        }
        let value = self.mapper.filters.apply(value, &expr.filters)?;
        Ok(match (&expr.default, value.is_null()) {
            (Some(default), true) => default.clone(),
            _ => value,
        })
    }

    fn run_callback(
        &self,
        target_path: &str,
        callback: &(dyn Fn(&dyn DataSource, &Value) -> Value + Send + Sync), target: &mut Value,
    ) -> Result<()> {
        let value = match self.fire(
            HookKind::BeforePair,
            None,
            Some(target_path),
            None,
            target,
            &NULL,
        ) {
            HookOutcome::Skip => return Ok(()),
            HookOutcome::Replace(value) => value,
            HookOutcome::Continue => callback(self.source, target),
        };
        if value.is_null() && self.mapper.skip_null {
            self.end_pair(target_path, None, target, &value);
            return Ok(());
        }
        self.write(target_path, None, value, target, |t, v| set_in(t, target_path, v))
    }

    /// BeforeWrite; `None` when vetoed, otherwise the value and whether a hook replaced it
    fn gate_write(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        value: Value,
        target: &Value,
    ) -> Option<(Value, bool)> {
        match self.fire(
            HookKind::BeforeWrite,
            source_path,
            Some(target_path),
            None,
            target,
            &value,
        ) {
            HookOutcome::Skip => {
                log::trace!("Write to '{target_path}' vetoed by hook");
                self.end_pair(target_path, source_path, target, &value);
                None
            }
            HookOutcome::Replace(replaced) => Some((replaced, true)),
            HookOutcome::Continue => Some((value, false)),
        }
    }

    fn write<W>(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        value: Value,
        target: &mut Value,
        write: W,
    ) -> Result<()>
    where
        W: FnOnce(&mut Value, Value) -> Result<()>,
    {
        let Some((value, _)) = self.gate_write(target_path, source_path, value, target) else {
            return Ok(());
        };
        match self.hooks {
            None => write(target, value),
            Some(_) => {
                let echo = value.clone();
                write(target, value)?;
                self.after_write(target_path, source_path, target, &echo);
                Ok(())
            }
        }
    }

    fn after_write(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        target: &Value,
        value: &Value,
    ) {
        self.fire(HookKind::AfterWrite, source_path, Some(target_path), None, target, value);
        self.end_pair(target_path, source_path, target, value);
    }

    fn end_pair(
        &self,
        target_path: &str,
        source_path: Option<&str>,
        target: &Value,
        value: &Value,
    ) {
        self.fire(HookKind::AfterPair, source_path, Some(target_path), None, target, value);
    }
}

/// Items of a collection keyed by list index or object key
fn item_set(collection: Option<Value>) -> ItemSet {
    match collection {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => ItemSet::new(),
    }
}

/// Renumber each wildcard level to `0..n-1` within its parent slot
fn densify(slots: Vec<(Vec<String>, Value)>) -> Vec<(Vec<String>, Value)> {
    let mut levels: FxHashMap<Vec<String>, FxHashMap<String, usize>> = FxHashMap::default();
    slots
        .into_iter()
        .map(|(indices, value)| {
            let mut dense: Vec<String> = Vec::with_capacity(indices.len());
            for index in indices {
                let siblings = levels.entry(dense.clone()).or_default();
                let next = siblings.len();
                let slot = *siblings.entry(index).or_insert(next);
                dense.push(slot.to_string());
            }
            (dense, value)
        })
        .collect()
}
