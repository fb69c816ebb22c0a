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

//! WHERE: keep items matching a condition tree
//!
//! ```json
//! {"WHERE": {"status": "active", "OR": [{"role": "admin"}, {"score": [">=", 90]}]}}
//! ```
//!
//! Pairs of an object are ANDed. `AND` / `OR` keys take a list of conditions or an
//! object whose pairs become the alternatives. A `[op, value]` pair compares with
//! `=`, `==`, `!=`, `<>`, `>`, `>=`, `<` or `<=`; anything else is loose equality.

use super::{field_path, field_value, resolve_operand};
use crate::error::Result;
use crate::model::compare::{as_number, loose_eq, natural_cmp};
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Condition filter with implicit AND and nested `AND` / `OR` groups
#[derive(Debug, Default)]
pub struct WhereOperator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol.trim() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            _ => return None,
        })
    }

    fn holds(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(actual, expected),
            Self::Ne => !loose_eq(actual, expected),
            ordering => {
                if actual.is_null() || expected.is_null() {
                    return false;
                }
                let ord = match (as_number(actual), as_number(expected)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                    _ => natural_cmp(actual, expected),
                };
                match ordering {
                    Self::Gt => ord == Ordering::Greater,
                    Self::Ge => ord != Ordering::Less,
                    Self::Lt => ord == Ordering::Less,
                    Self::Le => ord != Ordering::Greater,
                    Self::Eq | Self::Ne => false,
                }
            }
        }
    }
}

impl WhereOperator {
    fn matches(item: &Value, condition: &Value, context: &OperatorContext<'_>) -> bool {
        match condition {
            Value::Object(pairs) => Self::matches_all_pairs(item, pairs, context),
            Value::Array(conditions) => conditions
                .iter()
                .all(|nested| Self::matches(item, nested, context)),
            Value::Null => true,
            _ => false,
        }
    }

    fn matches_all_pairs(
        item: &Value,
        pairs: &Map<String, Value>,
        context: &OperatorContext<'_>,
    ) -> bool {
        pairs.iter().all(|(key, expected)| {
            if key.eq_ignore_ascii_case("and") {
                Self::matches(item, expected, context)
            } else if key.eq_ignore_ascii_case("or") {
                Self::matches_any(item, expected, context)
            } else {
                Self::matches_field(item, key, expected, context)
            }
        })
    }

    fn matches_any(item: &Value, alternatives: &Value, context: &OperatorContext<'_>) -> bool {
        match alternatives {
            Value::Array(group) => group.iter().any(|nested| Self::matches(item, nested, context)),
            Value::Object(pairs) => pairs.iter().any(|(key, expected)| {
                let mut single = Map::new();
                single.insert(key.clone(), expected.clone());
                Self::matches_all_pairs(item, &single, context)
            }),
            _ => false,
        }
    }

    fn matches_field(
        item: &Value,
        key: &str,
        expected: &Value,
        context: &OperatorContext<'_>,
    ) -> bool {
        let actual = field_value(item, &field_path(key, context.expressions));
        if let Value::Array(pair) = expected {
            if let [Value::String(symbol), operand] = pair.as_slice() {
                if let Some(comparison) = Comparison::parse(symbol) {
                    return comparison.holds(&actual, &resolve_operand(operand, context));
                }
            }
        }
        loose_eq(&actual, &resolve_operand(expected, context))
    }
}

impl Operator for WhereOperator {
    fn name(&self) -> &'static str {
        "WHERE"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["FILTER"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        if !matches!(config, Value::Object(_) | Value::Array(_)) {
            log::debug!("WHERE ignoring non-condition config {config}");
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|(_, item)| Self::matches(item, config, context))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operators::test_support::{ids, items, keys};
    use serde_json::json;

    fn rows() -> ItemSet {
        items(json!([
            {"id": 1, "cat": "A", "val": 100, "role": "user"},
            {"id": 2, "cat": "B", "val": "200", "role": "admin"},
            {"id": 3, "cat": "A", "val": 150, "role": "admin"},
        ]))
    }

    fn run(config: Value) -> ItemSet {
        let target = json!({});
        let original = rows();
        let context = OperatorContext::new(&target, &original);
        WhereOperator.apply(rows(), &config, &context).unwrap()
    }

    #[test]
    fn test_implicit_and_preserves_keys() {
        let out = run(json!({"cat": "A", "role": "admin"}));
        assert_eq!(keys(&out), vec!["2"]);
    }

    #[test]
    fn test_loose_equality() {
        assert_eq!(ids(&run(json!({"val": 200}))), vec![2]);
        assert_eq!(ids(&run(json!({"{{ rows.*.id }}": "3"}))), vec![3]);
    }

    #[test]
    fn test_or_groups() {
        assert_eq!(
            ids(&run(json!({"OR": [{"cat": "B"}, {"val": 150}]}))),
            vec![2, 3]
        );
        assert_eq!(ids(&run(json!({"or": {"id": 1, "role": "admin"}}))), vec![1, 2, 3]);
        assert_eq!(
            ids(&run(json!({"AND": [{"cat": "A"}, {"OR": [{"id": 1}, {"id": 2}]}]}))),
            vec![1]
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(ids(&run(json!({"val": [">=", 150]}))), vec![2, 3]);
        assert_eq!(ids(&run(json!({"cat": ["!=", "A"]}))), vec![2]);
        assert_eq!(ids(&run(json!({"val": ["<", "150"]}))), vec![1]);
    }

    #[test]
    fn test_templated_operand() {
        let source = json!({"wanted": "B"});
        let target = json!({});
        let original = rows();
        let context = OperatorContext::new(&target, &original).with_source(&source);
        let out = WhereOperator
            .apply(rows(), &json!({"cat": "{{ wanted }}"}), &context)
            .unwrap();
        assert_eq!(ids(&out), vec![2]);
    }

    #[test]
    fn test_invalid_config_is_noop() {
        assert_eq!(run(json!("cat = A")).len(), 3);
    }
}
