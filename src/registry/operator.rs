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

//! Operator registry and the operator calling conventions

use crate::error::{MapperError, Result};
use crate::model::DataSource;
use crate::parser::{ExpressionParser, ParseMode};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Wildcard-expanded collection: original key to item, in traversal order
pub type ItemSet = IndexMap<String, Value>;

/// Read-only view of the mapping run an operator executes in
#[derive(Clone, Copy)]
pub struct OperatorContext<'a> {
    /// Source being mapped, for `{{ path }}` operands
    pub source: Option<&'a dyn DataSource>,
    /// Target built so far, for `{{ @alias }}` operands
    pub target: &'a Value,
    /// Whether the items come from a wildcard expansion
    pub is_wildcard_mode: bool,
    /// Items as expanded, before any operator ran
    pub original_items: &'a ItemSet,
    /// Parser for templated field keys and operands
    pub expressions: &'a ExpressionParser,
}

impl<'a> OperatorContext<'a> {
    /// Context without a source, parsing templates with the global fast parser
    pub fn new(target: &'a Value, original_items: &'a ItemSet) -> Self {
        static FAST: Lazy<Arc<ExpressionParser>> =
            Lazy::new(|| ExpressionParser::global(ParseMode::Fast));
        Self {
            source: None,
            target,
            is_wildcard_mode: false,
            original_items,
            expressions: &FAST,
        }
    }

    /// Attach the mapping source
    pub fn with_source(mut self, source: &'a dyn DataSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Mark the items as wildcard-expanded
    pub fn wildcard_mode(mut self, enabled: bool) -> Self {
        self.is_wildcard_mode = enabled;
        self
    }

    /// Parse templates with `expressions`
    pub fn with_parser(mut self, expressions: &'a ExpressionParser) -> Self {
        self.expressions = expressions;
        self
    }
}

impl std::fmt::Debug for OperatorContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorContext")
            .field("has_source", &self.source.is_some())
            .field("is_wildcard_mode", &self.is_wildcard_mode)
            .field("original_items", &self.original_items.len())
            .finish()
    }
}

/// A relational transform over an item set
///
/// Operators are pure: they consume the item set and return the surviving items
/// without touching the source. Keys of surviving items are preserved.
pub trait Operator: Send + Sync {
    /// Canonical name (`WHERE`, `ORDER BY`, ...)
    fn name(&self) -> &'static str;

    /// Additional names resolving to this operator
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Apply the operator
    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet>;
}

/// Normalized operator name: lowercase, `_` as space, whitespace collapsed
pub fn normalize_operator_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Registry of operators by normalized name
pub struct OperatorRegistry {
    operators: RwLock<FxHashMap<String, Arc<dyn Operator>>>,
}

static GLOBAL_OPERATORS: Lazy<Arc<OperatorRegistry>> =
    Lazy::new(|| Arc::new(OperatorRegistry::with_builtins()));

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            operators: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create a registry holding every built-in operator
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        super::operators::register_builtin_operators(&registry);
        registry
    }

    /// Process-wide registry with the built-ins
    pub fn global() -> Arc<OperatorRegistry> {
        Arc::clone(&GLOBAL_OPERATORS)
    }

    /// Register `operator` under `name`
    pub fn register(&self, name: &str, operator: Arc<dyn Operator>) {
        let key = normalize_operator_name(name);
        if self.operators.write().insert(key, operator).is_some() {
            log::debug!("Operator '{name}' re-registered");
        }
    }

    /// Register an operator under its name and every alias
    pub fn register_operator<O: Operator + 'static>(&self, operator: O) {
        let operator: Arc<dyn Operator> = Arc::new(operator);
        let names = std::iter::once(operator.name()).chain(operator.aliases().iter().copied());
        for name in names {
            self.register(name, Arc::clone(&operator));
        }
    }

    /// Look up an operator
    pub fn get(&self, name: &str) -> Result<Arc<dyn Operator>> {
        self.operators
            .read()
            .get(&normalize_operator_name(name))
            .cloned()
            .ok_or_else(|| MapperError::UnregisteredOperator(name.to_string()))
    }

    /// Whether `name` resolves to an operator
    pub fn has(&self, name: &str) -> bool {
        self.operators
            .read()
            .contains_key(&normalize_operator_name(name))
    }

    /// Every registered name with its operator
    pub fn all(&self) -> BTreeMap<String, Arc<dyn Operator>> {
        self.operators
            .read()
            .iter()
            .map(|(name, op)| (name.clone(), Arc::clone(op)))
            .collect()
    }

    /// Remove every operator
    pub fn clear(&self) {
        self.operators.write().clear();
        log::debug!("Operator registry cleared");
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("names", &self.operators.read().len())
            .finish()
    }
}

/// Calls an operator with positional `(items, config, sources, aliases)` arguments
pub struct WildcardOperatorAdapter {
    operator: Arc<dyn Operator>,
}

impl WildcardOperatorAdapter {
    /// Wrap `operator`
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self { operator }
    }

    /// Resolve `name` in `registry` and wrap it
    pub fn from_registry(registry: &OperatorRegistry, name: &str) -> Result<Self> {
        registry.get(name).map(Self::new)
    }

    /// Operator name
    pub fn name(&self) -> &'static str {
        self.operator.name()
    }

    /// Apply in wildcard mode; `aliases` is the target built so far
    pub fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        sources: Option<&dyn DataSource>,
        aliases: &Value,
    ) -> Result<ItemSet> {
        let original = items.clone();
        let mut context = OperatorContext::new(aliases, &original).wildcard_mode(true);
        if let Some(source) = sources {
            context = context.with_source(source);
        }
        self.operator.apply(items, config, &context)
    }
}
