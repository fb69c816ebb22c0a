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

//! LIKE: SQL-style pattern match

use super::{field_path, field_value, resolve_operand};
use crate::error::Result;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use regex::Regex;
use serde_json::Value;

/// Case-insensitive `%` / `_` pattern match on string fields
///
/// Config is `{field: pattern}` or `{field: {"pattern": pattern}}`. Non-string field
/// values never match, and a non-string pattern excludes every item.
#[derive(Debug, Default)]
pub struct LikeOperator;

/// Compile a LIKE pattern into an anchored regex
pub fn like_regex(pattern: &str) -> Option<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?is)^");
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}

impl LikeOperator {
    fn pattern_of(raw: &Value, context: &OperatorContext<'_>) -> Option<Regex> {
        let raw = match raw {
            Value::Object(spec) => spec.get("pattern")?,
            other => other,
        };
        match resolve_operand(raw, context) {
            Value::String(pattern) => like_regex(&pattern),
            _ => None,
        }
    }
}

impl Operator for LikeOperator {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        let Value::Object(fields) = config else {
            return Ok(ItemSet::new());
        };
        let mut conditions = Vec::with_capacity(fields.len());
        for (key, raw) in fields {
            let Some(regex) = Self::pattern_of(raw, context) else {
                return Ok(ItemSet::new());
            };
            conditions.push((field_path(key, context.expressions), regex));
        }
        Ok(items
            .into_iter()
            .filter(|(_, item)| {
                conditions.iter().all(|(field, regex)| {
                    matches!(field_value(item, field), Value::String(ref s) if regex.is_match(s))
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operators::test_support::{items, keys};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("%son", "Jackson", true)]
    #[case("j%", "jackson", true)]
    #[case("J_ck%", "Jack", true)]
    #[case("J_ck", "Jaack", false)]
    #[case("%", "", true)]
    #[case("a.b", "axb", false)]
    #[case("100%", "100% sure", true)]
    fn test_like_regex(#[case] pattern: &str, #[case] text: &str, #[case] expected: bool) {
        assert_eq!(like_regex(pattern).unwrap().is_match(text), expected);
    }

    fn run(config: Value) -> ItemSet {
        let rows = items(json!([
            {"name": "Alice"},
            {"name": "alicia"},
            {"name": 42},
            {"name": "Bob"}
        ]));
        let target = json!({});
        let original = ItemSet::new();
        let context = OperatorContext::new(&target, &original);
        LikeOperator.apply(rows, &config, &context).unwrap()
    }

    #[test]
    fn test_like_operator() {
        assert_eq!(keys(&run(json!({"name": "ali%"}))), vec!["0", "1"]);
        assert_eq!(keys(&run(json!({"name": {"pattern": "%b"}}))), vec!["3"]);
        assert_eq!(keys(&run(json!({"name": "4%"}))), Vec::<&str>::new());
        assert!(run(json!({"name": 42})).is_empty());
    }
}
