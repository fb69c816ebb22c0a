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

//! Lifecycle hooks around a mapping run
//!
//! Raw registrations are normalized once into [`Hooks`]: each callback is stored under
//! its [`HookKind`] together with a compiled [`HookFilter`]. Per pair the engine fires
//! `BeforePair`, `BeforeTransform`, `AfterTransform`, `BeforeWrite`, `AfterWrite` and
//! `AfterPair` in that order; `BeforeAll` and `AfterAll` bracket the run.
//!
//! ```
//! use datamap::engine::hooks::{HookKind, HookOutcome, Hooks};
//! use serde_json::json;
//!
//! let hooks = Hooks::new().on(HookKind::BeforeWrite, |_, value| {
//!     if value == &json!("secret") { HookOutcome::Skip } else { HookOutcome::Continue }
//! });
//! assert!(!hooks.is_empty());
//! ```

use crate::error::{MapperError, Result};
use crate::path::segments::{WILDCARD, split_path};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle point a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    /// Once, before the first entry
    BeforeAll,
    /// Before an entry is resolved
    BeforePair,
    /// Before filters run (per item for wildcard entries)
    BeforeTransform,
    /// After filters ran (per item for wildcard entries)
    AfterTransform,
    /// Before the value is written; `Skip` vetoes the write
    BeforeWrite,
    /// After the value was written
    AfterWrite,
    /// After an entry is done
    AfterPair,
    /// Once, after the last entry
    AfterAll,
}

impl HookKind {
    /// Every kind in firing order
    pub const ALL: [HookKind; 8] = [
        HookKind::BeforeAll,
        HookKind::BeforePair,
        HookKind::BeforeTransform,
        HookKind::AfterTransform,
        HookKind::BeforeWrite,
        HookKind::AfterWrite,
        HookKind::AfterPair,
        HookKind::AfterAll,
    ];

    /// camelCase name (`beforeWrite`)
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::BeforePair => "beforePair",
            HookKind::BeforeTransform => "beforeTransform",
            HookKind::AfterTransform => "afterTransform",
            HookKind::BeforeWrite => "beforeWrite",
            HookKind::AfterWrite => "afterWrite",
            HookKind::AfterPair => "afterPair",
            HookKind::AfterAll => "afterAll",
        }
    }

    /// Parse `beforeWrite`, `before_write`, `BEFORE_WRITE` or `before-write`
    pub fn parse(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        HookKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&folded))
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        HookKind::parse(s)
            .ok_or_else(|| MapperError::invalid_mapping(format!("unknown hook '{s}'")))
    }
}

/// Dot-path prefix where `*` stands for exactly one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<String>,
}

impl PathPattern {
    /// Compile a pattern such as `users.*.email`
    pub fn new(pattern: &str) -> Self {
        Self {
            segments: split_path(pattern.trim())
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Whether the pattern is a segment-wise prefix of `path`
    pub fn matches(&self, path: &str) -> bool {
        let concrete = split_path(path);
        if concrete.len() < self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(concrete)
            .all(|(expected, actual)| expected == WILDCARD || expected == actual)
    }
}

/// Predicate deciding whether a hook fires for a pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFilter {
    /// Always fires
    Any,
    /// `src:<pattern>` against the source path
    Source(PathPattern),
    /// `tgt:<pattern>` against the target path
    Target(PathPattern),
    /// `mode:<name>` against the run mode
    Mode(String),
}

impl HookFilter {
    /// Compile `src:..`, `tgt:..`, `mode:..`, or `""`/`*` for [`HookFilter::Any`]
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec == WILDCARD {
            return Ok(HookFilter::Any);
        }
        let Some((prefix, rest)) = spec.split_once(':') else {
            return Err(MapperError::invalid_mapping(format!(
                "hook filter '{spec}' needs a src:, tgt: or mode: prefix"
            )));
        };
        match prefix.trim().to_ascii_lowercase().as_str() {
            "src" | "source" => Ok(HookFilter::Source(PathPattern::new(rest))),
            "tgt" | "target" => Ok(HookFilter::Target(PathPattern::new(rest))),
            "mode" => Ok(HookFilter::Mode(rest.trim().to_string())),
            other => Err(MapperError::invalid_mapping(format!(
                "unknown hook filter prefix '{other}:'"
            ))),
        }
    }

    /// Evaluate against a hook context
    pub fn matches(&self, context: &HookContext<'_>) -> bool {
        match self {
            HookFilter::Any => true,
            HookFilter::Source(pattern) => context.source_path.is_some_and(|p| pattern.matches(p)),
            HookFilter::Target(pattern) => context.target_path.is_some_and(|p| pattern.matches(p)),
            HookFilter::Mode(mode) => mode.eq_ignore_ascii_case(context.mode),
        }
    }
}

/// What a hook wants the engine to do with the value it saw
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    /// Keep going with the current value
    Continue,
    /// Continue with this value instead
    Replace(Value),
    /// Skip the pair, the item or the write, depending on the kind
    Skip,
}

/// Where in the run a hook is being fired
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Kind being fired
    pub kind: HookKind,
    /// Source path of the pair; concrete (`users.3.email`) for wildcard items
    pub source_path: Option<&'a str>,
    /// Target path of the pair
    pub target_path: Option<&'a str>,
    /// Run mode (`map`, `template`, `inverse`)
    pub mode: &'a str,
    /// Position of the wildcard item, when firing per item
    pub item_index: Option<usize>,
    /// Target built so far
    pub target: &'a Value,
}

/// Hook callback
pub type HookCallback = Arc<dyn Fn(&HookContext<'_>, &Value) -> HookOutcome + Send + Sync>;

/// How a raw registration names its hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookKey {
    /// Name to be parsed (`beforeWrite`, `before_write`, ...)
    Name(String),
    /// Already typed kind
    Kind(HookKind),
}

impl From<HookKind> for HookKey {
    fn from(kind: HookKind) -> Self {
        HookKey::Kind(kind)
    }
}

impl From<&str> for HookKey {
    fn from(name: &str) -> Self {
        HookKey::Name(name.to_string())
    }
}

/// Callables registered under one key
#[derive(Clone)]
pub enum HookSpec {
    /// One callable
    Single(HookCallback),
    /// Several callables, fired in order
    List(Vec<HookCallback>),
    /// `(filter, callable)` pairs, filters in `src:`/`tgt:`/`mode:` syntax
    Filtered(Vec<(String, HookCallback)>),
}

/// Registrations as supplied by a caller, before normalization
#[derive(Clone, Default)]
pub struct RawHooks {
    entries: Vec<(HookKey, HookSpec)>,
}

impl RawHooks {
    /// Empty registration table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec under `key`
    pub fn insert(mut self, key: impl Into<HookKey>, spec: HookSpec) -> Self {
        self.entries.push((key.into(), spec));
        self
    }

    /// Add a single callable
    pub fn on<F>(self, key: impl Into<HookKey>, callback: F) -> Self
    where
        F: Fn(&HookContext<'_>, &Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.insert(key, HookSpec::Single(Arc::new(callback)))
    }

    /// Add a callable gated by a filter string
    pub fn on_filtered<F>(self, key: impl Into<HookKey>, filter: &str, callback: F) -> Self
    where
        F: Fn(&HookContext<'_>, &Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.insert(
            key,
            HookSpec::Filtered(vec![(filter.to_string(), Arc::new(callback))]),
        )
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
struct RegisteredHook {
    filter: HookFilter,
    callback: HookCallback,
}

/// Normalized hook table
#[derive(Clone, Default)]
pub struct Hooks {
    by_kind: FxHashMap<HookKind, Vec<RegisteredHook>>,
}

impl Hooks {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unfiltered callback
    pub fn on<F>(mut self, kind: HookKind, callback: F) -> Self
    where
        F: Fn(&HookContext<'_>, &Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.push(kind, HookFilter::Any, Arc::new(callback));
        self
    }

    /// Register a callback gated by a compiled filter
    pub fn on_filtered<F>(mut self, kind: HookKind, filter: HookFilter, callback: F) -> Self
    where
        F: Fn(&HookContext<'_>, &Value) -> HookOutcome + Send + Sync + 'static,
    {
        self.push(kind, filter, Arc::new(callback));
        self
    }

    fn push(&mut self, kind: HookKind, filter: HookFilter, callback: HookCallback) {
        self.by_kind
            .entry(kind)
            .or_default()
            .push(RegisteredHook { filter, callback });
    }

    /// Whether no hook of any kind is registered
    pub fn is_empty(&self) -> bool {
        self.by_kind.values().all(Vec::is_empty)
    }

    /// Whether any hook of `kind` is registered
    pub fn has(&self, kind: HookKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|hooks| !hooks.is_empty())
    }

    /// Number of callbacks registered for `kind`
    pub fn count(&self, kind: HookKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Fire every matching hook of `context.kind` in registration order
    ///
    /// Replacements chain: each hook sees the value the previous one produced. The
    /// first `Skip` wins and stops the chain.
    pub fn invoke(&self, context: &HookContext<'_>, value: &Value) -> HookOutcome {
        let Some(hooks) = self.by_kind.get(&context.kind) else {
            return HookOutcome::Continue;
        };
        let mut replaced: Option<Value> = None;
        for hook in hooks.iter().filter(|hook| hook.filter.matches(context)) {
            let current = replaced.as_ref().unwrap_or(value);
            match (hook.callback)(context, current) {
                HookOutcome::Continue => {}
                HookOutcome::Replace(next) => replaced = Some(next),
                HookOutcome::Skip => return HookOutcome::Skip,
            }
        }
        replaced.map_or(HookOutcome::Continue, HookOutcome::Replace)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in HookKind::ALL {
            if let Some(hooks) = self.by_kind.get(&kind) {
                let filters: Vec<_> = hooks.iter().map(|h| &h.filter).collect();
                map.entry(&kind, &filters);
            }
        }
        map.finish()
    }
}

/// Turns raw registrations into a [`Hooks`] table
pub struct HookInvoker;

impl HookInvoker {
    /// Normalize registrations, compiling every filter once
    ///
    /// Unknown hook names are logged and ignored. A malformed filter is a
    /// configuration error.
    pub fn normalize(raw: RawHooks) -> Result<Hooks> {
        let mut hooks = Hooks::new();
        for (key, spec) in raw.entries {
            let kind = match key {
                HookKey::Kind(kind) => kind,
                HookKey::Name(name) => match HookKind::parse(&name) {
                    Some(kind) => kind,
                    None => {
                        log::warn!("Ignoring hooks registered under unknown name '{name}'");
                        continue;
                    }
                },
            };
            match spec {
                HookSpec::Single(callback) => hooks.push(kind, HookFilter::Any, callback),
                HookSpec::List(callbacks) => {
                    for callback in callbacks {
                        hooks.push(kind, HookFilter::Any, callback);
                    }
                }
                HookSpec::Filtered(pairs) => {
                    for (filter, callback) in pairs {
                        hooks.push(kind, HookFilter::parse(&filter)?, callback);
                    }
                }
            }
        }
        Ok(hooks)
    }

    /// Fire `kind` on an optional table; an absent table always continues
    pub fn invoke(hooks: Option<&Hooks>, context: &HookContext<'_>, value: &Value) -> HookOutcome {
        match hooks {
            Some(hooks) => hooks.invoke(context, value),
            None => HookOutcome::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn context<'a>(
        kind: HookKind,
        source: &'a str,
        target: &'a str,
        root: &'a Value,
    ) -> HookContext<'a> {
        HookContext {
            kind,
            source_path: Some(source),
            target_path: Some(target),
            mode: "map",
            item_index: None,
            target: root,
        }
    }

    #[rstest]
    #[case("beforeWrite", HookKind::BeforeWrite)]
    #[case("before_write", HookKind::BeforeWrite)]
    #[case("BEFORE_WRITE", HookKind::BeforeWrite)]
    #[case("after-all", HookKind::AfterAll)]
    #[case("BeforeTransform", HookKind::BeforeTransform)]
    fn test_kind_names(#[case] name: &str, #[case] expected: HookKind) {
        assert_eq!(HookKind::parse(name), Some(expected));
    }

    #[rstest]
    #[case("users.*.email", "users.3.email", true)]
    #[case("users.*.email", "users.3.name", false)]
    #[case("users", "users.3.email", true)]
    #[case("users.*", "users", false)]
    #[case("", "anything", true)]
    fn test_pattern_prefix(#[case] pattern: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(PathPattern::new(pattern).matches(path), expected);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!(HookFilter::parse("").unwrap(), HookFilter::Any);
        assert_eq!(HookFilter::parse("mode: inverse").unwrap(), HookFilter::Mode("inverse".into()));
        assert!(matches!(HookFilter::parse("src:a.b").unwrap(), HookFilter::Source(_)));
        assert!(HookFilter::parse("users.*").is_err());
        assert!(HookFilter::parse("path:users").is_err());
    }

    #[test]
    fn test_normalize_and_chain() {
        let raw = RawHooks::new()
            .on("before_write", |_, v| {
                HookOutcome::Replace(json!(format!("{}!", v.as_str().unwrap_or(""))))
            })
            .insert(
                HookKind::BeforeWrite,
                HookSpec::Filtered(vec![(
                    "tgt:profile".to_string(),
                    Arc::new(|_: &HookContext<'_>, v: &Value| {
                        HookOutcome::Replace(json!(v.as_str().unwrap_or("").to_uppercase()))
                    }) as HookCallback,
                )]),
            )
            .on("sometimeLater", |_, _| HookOutcome::Skip);
        let hooks = HookInvoker::normalize(raw).unwrap();
        assert_eq!(hooks.count(HookKind::BeforeWrite), 2);

        let root = json!({});
        let outcome = hooks.invoke(
            &context(HookKind::BeforeWrite, "user.name", "profile.name", &root),
            &json!("hi"),
        );
        assert_eq!(outcome, HookOutcome::Replace(json!("HI!")));

        let outcome = hooks.invoke(
            &context(HookKind::BeforeWrite, "user.name", "other", &root),
            &json!("hi"),
        );
        assert_eq!(outcome, HookOutcome::Replace(json!("hi!")));
    }

    #[test]
    fn test_skip_short_circuits() {
        let hooks = Hooks::new()
            .on_filtered(
                HookKind::BeforePair,
                HookFilter::parse("src:users.*.email").unwrap(),
                |_, _| HookOutcome::Skip,
            )
            .on(HookKind::BeforePair, |_, _| HookOutcome::Replace(json!(1)));
        let root = json!({});
        assert_eq!(
            hooks.invoke(&context(HookKind::BeforePair, "users.3.email", "t", &root), &Value::Null),
            HookOutcome::Skip
        );
        assert_eq!(
            hooks.invoke(&context(HookKind::BeforePair, "users.3.name", "t", &root), &Value::Null),
            HookOutcome::Replace(json!(1))
        );
    }

    #[test]
    fn test_empty_table() {
        assert!(Hooks::new().is_empty());
        assert!(HookInvoker::normalize(RawHooks::new().on("bogus", |_, _| HookOutcome::Skip))
            .unwrap()
            .is_empty());
        let root = json!({});
        let ctx = context(HookKind::AfterAll, "", "", &root);
        assert_eq!(HookInvoker::invoke(None, &ctx, &root), HookOutcome::Continue);
    }
}
