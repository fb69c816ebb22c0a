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

//! Filter trait, registry, and pipeline engine

use crate::error::{MapperError, Result};
use crate::parser::{FilterCall, ParseMode};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// A value transformer addressable by name from `{{ path | name:arg }}`
///
/// Filters must be pure functions of `(value, args)`: the registry shares one
/// instance between every alias and every call. Input a filter cannot handle is
/// returned unchanged.
pub trait Filter: Any + Send + Sync {
    /// Canonical name
    fn name(&self) -> &'static str;

    /// Additional names resolving to this filter
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Short description for diagnostics
    fn documentation(&self) -> &'static str {
        ""
    }

    /// Transform `value` with positional `args`
    fn apply(&self, value: Value, args: &[String]) -> Value;
}

/// Name and alias lookup for filters
///
/// Names are matched case-insensitively. Instances registered by type are built once
/// and shared by all their names; re-registering a type reuses the cached instance.
pub struct FilterRegistry {
    by_name: RwLock<FxHashMap<String, Arc<dyn Filter>>>,
    instances: RwLock<FxHashMap<TypeId, Arc<dyn Filter>>>,
}

static GLOBAL_FILTERS: Lazy<Arc<FilterRegistry>> =
    Lazy::new(|| Arc::new(FilterRegistry::with_builtins()));

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FilterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            by_name: RwLock::new(FxHashMap::default()),
            instances: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create a registry holding every built-in filter
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        super::filters::register_builtin_filters(&registry);
        registry
    }

    /// Process-wide registry with the built-ins
    pub fn global() -> Arc<FilterRegistry> {
        Arc::clone(&GLOBAL_FILTERS)
    }

    /// Register a filter type under its name and aliases
    pub fn register<F: Filter + Default>(&self) {
        let type_id = TypeId::of::<F>();
        let instance = {
            let mut instances = self.instances.write();
            Arc::clone(
                instances
                    .entry(type_id)
                    .or_insert_with(|| Arc::new(F::default()) as Arc<dyn Filter>),
            )
        };
        self.insert_names(instance);
    }

    /// Register a pre-built filter under its name and aliases
    pub fn register_instance(&self, filter: Arc<dyn Filter>) {
        self.insert_names(filter);
    }

    fn insert_names(&self, filter: Arc<dyn Filter>) {
        let mut by_name = self.by_name.write();
        for name in std::iter::once(filter.name()).chain(filter.aliases().iter().copied()) {
            if by_name
                .insert(normalize(name), Arc::clone(&filter))
                .is_some()
            {
                log::debug!("Filter '{name}' re-registered");
            }
        }
    }

    /// Look up a filter by name or alias
    pub fn get(&self, name: &str) -> Result<Arc<dyn Filter>> {
        self.by_name
            .read()
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| MapperError::UnregisteredFilter(name.to_string()))
    }

    /// Whether a filter is registered under `name`
    pub fn has(&self, name: &str) -> bool {
        self.by_name.read().contains_key(&normalize(name))
    }

    /// All registered names and aliases, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.by_name.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.by_name.read().is_empty()
    }

    /// Remove every filter and cached instance
    pub fn clear(&self) {
        self.by_name.write().clear();
        self.instances.write().clear();
        log::debug!("Filter registry cleared");
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("names", &self.len())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Applies filter pipelines left to right
#[derive(Debug, Clone)]
pub struct FilterEngine {
    registry: Arc<FilterRegistry>,
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new(FilterRegistry::global())
    }
}

impl FilterEngine {
    /// Create an engine over `registry`
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    /// Registry used for name lookup
    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    /// Run `value` through `filters` in order
    pub fn apply(&self, value: Value, filters: &[FilterCall]) -> Result<Value> {
        filters.iter().try_fold(value, |current, call| {
            let filter = self.registry.get(&call.name)?;
            Ok(filter.apply(current, &call.args))
        })
    }

    /// Run `value` through `name:arg` specifications
    pub fn apply_specs<S: AsRef<str>>(&self, value: Value, specs: &[S]) -> Result<Value> {
        let calls = specs
            .iter()
            .map(|spec| FilterCall::parse(spec.as_ref(), ParseMode::Fast))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.apply(value, &calls)
    }

    /// Check every filter name in `filters` without running anything
    pub fn validate(&self, filters: &[FilterCall]) -> Result<()> {
        for call in filters {
            self.registry.get(&call.name)?;
        }
        Ok(())
    }
}
