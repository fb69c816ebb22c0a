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

//! `{{ path | filter:arg ?? default }}` expressions
//!
//! Grammar:
//!
//! ```text
//! expression := "{{" WS body WS "}}"
//! body       := path [ "??" default ] ( "|" filter )* [ "??" default ]
//! filter     := name ( ":" arg )*
//! ```
//!
//! A path starting with `@` is an alias reference into the target being built.

use super::ParseMode;
use super::cache::{BoundedCache, CacheStats};
use super::error::{ParseError, ParseResult};
use super::split::{parse_literal, split_default, split_top_level, unquote};
use crate::config::{CacheConfig, MapperConfig};
use crate::path::segments::has_wildcard;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Prefix marking an alias reference (`{{ @fullname }}`)
pub const ALIAS_PREFIX: char = '@';

/// One `name:arg:arg` step of a filter pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FilterCall {
    /// Filter name or alias as written
    pub name: String,
    /// Positional arguments, quotes stripped
    pub args: SmallVec<[String; 2]>,
}

impl FilterCall {
    /// Create a filter call
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `name:arg:arg` specification
    pub fn parse(spec: &str, mode: ParseMode) -> ParseResult<Self> {
        let parts = split_top_level(spec, ':', mode)?;
        let mut parts = parts.into_iter();
        let name = parts.next().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(ParseError::EmptyFilterName {
                input: spec.to_string(),
            });
        }
        let args = parts.map(|arg| unquote(&arg, mode).0).collect();
        Ok(Self { name, args })
    }

    /// Argument at `index`, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for FilterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, ":{arg}")?;
        }
        Ok(())
    }
}

/// A parsed template cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedExpression {
    /// Source path (or `@alias` path)
    pub path: String,
    /// Value used when the path resolves to nothing
    pub default: Option<Value>,
    /// Filters applied left to right
    pub filters: Vec<FilterCall>,
}

impl ParsedExpression {
    /// Expression consisting of a bare path
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default: None,
            filters: Vec::new(),
        }
    }

    /// Whether the path refers to the target being built
    pub fn is_alias(&self) -> bool {
        self.path.starts_with(ALIAS_PREFIX)
    }

    /// Target path referenced by an alias expression
    pub fn alias_key(&self) -> Option<&str> {
        self.path.strip_prefix(ALIAS_PREFIX)
    }

    /// Whether the path contains a wildcard segment
    pub fn has_wildcard(&self) -> bool {
        has_wildcard(&self.path)
    }

    /// A bare path without filters or default
    pub fn is_plain(&self) -> bool {
        self.filters.is_empty() && self.default.is_none()
    }
}

impl fmt::Display for ParsedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ {}", self.path)?;
        for filter in &self.filters {
            write!(f, " | {filter}")?;
        }
        if let Some(default) = &self.default {
            write!(f, " ?? {default}")?;
        }
        write!(f, " }}}}")
    }
}

type ExpressionCache = BoundedCache<String, Option<Arc<ParsedExpression>>>;

/// Cached expression parser
///
/// The parse mode is fixed per instance, so one instance never serves results produced
/// under a different splitting strategy.
#[derive(Debug)]
pub struct ExpressionParser {
    mode: ParseMode,
    cache: ExpressionCache,
}

static FAST_PARSER: Lazy<Arc<ExpressionParser>> = Lazy::new(|| {
    let config = MapperConfig::from_env();
    Arc::new(ExpressionParser::new(ParseMode::Fast, &config.cache))
});

static SAFE_PARSER: Lazy<Arc<ExpressionParser>> = Lazy::new(|| {
    let config = MapperConfig::from_env();
    Arc::new(ExpressionParser::new(ParseMode::Safe, &config.cache))
});

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new(ParseMode::Fast, &CacheConfig::default())
    }
}

impl ExpressionParser {
    /// Create a parser with its own cache
    pub fn new(mode: ParseMode, cache: &CacheConfig) -> Self {
        Self {
            mode,
            cache: BoundedCache::new("expression", cache.max_entries),
        }
    }

    /// Process-wide parser for `mode`
    pub fn global(mode: ParseMode) -> Arc<ExpressionParser> {
        match mode {
            ParseMode::Fast => Arc::clone(&FAST_PARSER),
            ParseMode::Safe => Arc::clone(&SAFE_PARSER),
        }
    }

    /// Splitting strategy of this parser
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Whether `input` is written in `{{ ... }}` syntax
    pub fn is_expression(input: &str) -> bool {
        let trimmed = input.trim();
        trimmed.starts_with("{{") && trimmed.ends_with("}}") && trimmed.len() >= 4
    }

    /// Parse a `{{ ... }}` cell
    ///
    /// Returns `Ok(None)` for strings that are not expressions. Both outcomes are
    /// cached on the exact input; syntax errors are not.
    pub fn parse(&self, input: &str) -> ParseResult<Option<Arc<ParsedExpression>>> {
        let key = input.to_string();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let parsed = self.parse_uncached(input)?.map(Arc::new);
        self.cache.insert(key, parsed.clone());
        Ok(parsed)
    }

    fn parse_uncached(&self, input: &str) -> ParseResult<Option<ParsedExpression>> {
        let trimmed = input.trim();
        if !trimmed.starts_with("{{") {
            return Ok(None);
        }
        if !Self::is_expression(trimmed) {
            return Err(ParseError::UnterminatedExpression {
                input: input.to_string(),
            });
        }
        let body = &trimmed[2..trimmed.len() - 2];
        self.parse_body(body).map(Some)
    }

    /// Parse an unwrapped body such as `user.name | upper ?? 'n/a'`
    pub fn parse_body(&self, body: &str) -> ParseResult<ParsedExpression> {
        let segments = split_top_level(body, '|', self.mode)?;
        let last = segments.len().saturating_sub(1);
        let mut default = None;
        let mut path = String::new();
        let mut filters = Vec::with_capacity(last);

        for (idx, segment) in segments.iter().enumerate() {
            let (head, fallback) = split_default(segment, self.mode);
            if let Some(raw) = fallback {
                default = Some(parse_literal(&raw, self.mode));
            }
            if idx == 0 {
                path = head.trim().to_string();
                continue;
            }
            filters.push(FilterCall::parse(&head, self.mode).map_err(|err| match err {
                ParseError::EmptyFilterName { .. } => ParseError::EmptyFilterName {
                    input: body.to_string(),
                },
                other => other,
            })?);
        }

        if path.is_empty() {
            return Err(ParseError::EmptyPath {
                input: body.to_string(),
            });
        }
        Ok(ParsedExpression {
            path,
            default,
            filters,
        })
    }

    /// Drop all cached expressions
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser(mode: ParseMode) -> ExpressionParser {
        ExpressionParser::new(mode, &CacheConfig::testing())
    }

    #[test]
    fn test_plain_strings_are_not_expressions() {
        let parser = parser(ParseMode::Fast);
        assert_eq!(parser.parse("user.name").unwrap(), None);
        assert!(parser.parse("{{ user.name").is_err());
    }

    #[test]
    fn test_path_filters_default() {
        let parsed = parser(ParseMode::Fast)
            .parse("{{ user.name | trim | substr:0:3 ?? 'n/a' }}")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.path, "user.name");
        assert_eq!(parsed.default, Some(json!("n/a")));
        assert_eq!(
            parsed.filters,
            vec![
                FilterCall::new("trim", Vec::<String>::new()),
                FilterCall::new("substr", ["0", "3"])
            ]
        );
    }

    #[test]
    fn test_default_after_path() {
        let parsed = parser(ParseMode::Fast)
            .parse("{{ user.age ?? 18 | clamp:18:99 }}")
            .unwrap()
            .unwrap();
        assert_eq!(parsed.path, "user.age");
        assert_eq!(parsed.default, Some(json!(18)));
        assert_eq!(parsed.filters[0].to_string(), "clamp:18:99");
    }

    #[test]
    fn test_alias_reference() {
        let parsed = parser(ParseMode::Fast).parse("{{ @fullname }}").unwrap().unwrap();
        assert!(parsed.is_alias());
        assert_eq!(parsed.alias_key(), Some("fullname"));
    }

    #[test]
    fn test_safe_mode_quoted_pipe() {
        let body = r#"tags | join:" | " | upper"#;
        let safe = parser(ParseMode::Safe).parse_body(body).unwrap();
        assert_eq!(safe.filters.len(), 2);
        assert_eq!(safe.filters[0].arg(0), Some(" | "));

        let fast = parser(ParseMode::Fast).parse_body(body).unwrap();
        assert_eq!(fast.filters.len(), 3);
    }

    #[test]
    fn test_safe_mode_escapes() {
        let parsed = parser(ParseMode::Safe)
            .parse_body(r#"text | replace:"\"":"'""#)
            .unwrap();
        assert_eq!(parsed.filters[0].args.as_slice(), ["\"", "'"]);
    }

    #[test]
    fn test_empty_parts_are_errors() {
        let parser = parser(ParseMode::Fast);
        assert!(matches!(parser.parse("{{ }}"), Err(ParseError::EmptyPath { .. })));
        assert!(matches!(
            parser.parse("{{ name | }}"),
            Err(ParseError::EmptyFilterName { .. })
        ));
    }

    #[test]
    fn test_cache_counts_and_null_results() {
        let parser = parser(ParseMode::Fast);
        parser.parse("{{ a }}").unwrap();
        parser.parse("{{ a }}").unwrap();
        parser.parse("not an expression").unwrap();
        parser.parse("not an expression").unwrap();
        let stats = parser.cache_stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        parser.clear_cache();
        assert_eq!(parser.cache_stats().size, 0);
    }

    #[test]
    fn test_display_round_trip() {
        let parser = parser(ParseMode::Fast);
        let parsed = parser.parse("{{ a.b | upper ?? 'x' }}").unwrap().unwrap();
        let again = parser.parse(&parsed.to_string()).unwrap().unwrap();
        assert_eq!(parsed, again);
    }
}
