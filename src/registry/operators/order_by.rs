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

//! ORDER BY: stable multi-key sort

use super::{field_path, field_value};
use crate::error::Result;
use crate::model::compare::natural_cmp;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn parse(raw: &Value) -> Self {
        match raw {
            Value::String(dir) if dir.trim().eq_ignore_ascii_case("desc") => Direction::Desc,
            _ => Direction::Asc,
        }
    }
}

/// Multi-key sort; `null` sorts first ascending and last descending
///
/// Config is an ordered `{field: "ASC" | "DESC"}` object, or a `"field [DESC]"`
/// string. Equal items keep their relative order.
#[derive(Debug, Default)]
pub struct OrderByOperator;

impl OrderByOperator {
    fn sort_keys(config: &Value, context: &OperatorContext<'_>) -> Vec<(String, Direction)> {
        match config {
            Value::Object(fields) => fields
                .iter()
                .map(|(key, dir)| (field_path(key, context.expressions), Direction::parse(dir)))
                .collect(),
            Value::String(spec) => spec
                .split(',')
                .filter_map(|part| {
                    let mut words = part.split_whitespace();
                    let field = words.next()?;
                    let dir = words.next().map_or(Direction::Asc, |d| {
                        Direction::parse(&Value::String(d.to_string()))
                    });
                    Some((field_path(field, context.expressions), dir))
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn compare(a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => natural_cmp(a, b),
        }
    }
}

impl Operator for OrderByOperator {
    fn name(&self) -> &'static str {
        "ORDER BY"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ORDER", "SORT", "SORT BY"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        let keys = Self::sort_keys(config, context);
        if keys.is_empty() {
            return Ok(items);
        }
        let mut rows: Vec<(Vec<Value>, String, Value)> = items
            .into_iter()
            .map(|(key, item)| {
                let sort_values = keys.iter().map(|(field, _)| field_value(&item, field)).collect();
                (sort_values, key, item)
            })
            .collect();
        rows.sort_by(|(left, ..), (right, ..)| {
            keys.iter()
                .zip(left.iter().zip(right))
                .map(|((_, dir), (a, b))| match dir {
                    Direction::Asc => Self::compare(a, b),
                    Direction::Desc => Self::compare(a, b).reverse(),
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(rows.into_iter().map(|(_, key, item)| (key, item)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operators::test_support::{ids, items, keys};
    use rstest::rstest;
    use serde_json::json;

    fn run(rows: Value, config: Value) -> ItemSet {
        let target = json!({});
        let original = ItemSet::new();
        let context = OperatorContext::new(&target, &original);
        OrderByOperator.apply(items(rows), &config, &context).unwrap()
    }

    #[test]
    fn test_desc_keeps_keys() {
        let out = run(
            json!([{"id": 1, "val": 100}, {"id": 2, "val": 200}, {"id": 3, "val": 150}]),
            json!({"val": "desc"}),
        );
        assert_eq!(keys(&out), vec!["1", "2", "0"]);
    }

    #[test]
    fn test_nulls_position() {
        let rows = json!([{"id": 1, "v": 2}, {"id": 2, "v": null}, {"id": 3, "v": 1}]);
        assert_eq!(ids(&run(rows.clone(), json!({"v": "ASC"}))), vec![2, 3, 1]);
        assert_eq!(ids(&run(rows, json!({"v": "DESC"}))), vec![1, 3, 2]);
    }

    #[test]
    fn test_natural_numeric_strings() {
        let rows = json!([{"id": 1, "v": "10"}, {"id": 2, "v": "9"}, {"id": 3, "v": "100"}]);
        assert_eq!(ids(&run(rows, json!({"v": "asc"}))), vec![2, 1, 3]);
    }

    #[test]
    fn test_multi_key_tie_break_and_stability() {
        let rows = json!([
            {"id": 1, "cat": "B", "v": 1},
            {"id": 2, "cat": "A", "v": 2},
            {"id": 3, "cat": "A", "v": 1},
            {"id": 4, "cat": "A", "v": 1},
        ]);
        assert_eq!(ids(&run(rows.clone(), json!({"cat": "ASC", "v": "ASC"}))), vec![3, 4, 2, 1]);
        assert_eq!(ids(&run(rows, json!("cat, v desc"))), vec![2, 3, 4, 1]);
    }

    fn mixed_rows() -> Value {
        json!([
            {"id": 1, "v": 10},
            {"id": 2, "v": "1a"},
            {"id": 3, "v": 9},
            {"id": 4, "v": null},
            {"id": 5, "v": "b"},
            {"id": 6, "v": "10.5"},
        ])
    }

    #[rstest]
    #[case("ASC", vec![4, 3, 1, 6, 2, 5])]
    #[case("DESC", vec![5, 2, 6, 1, 3, 4])]
    fn test_mixed_types_rank_numbers_before_text(#[case] dir: &str, #[case] expected: Vec<i64>) {
        assert_eq!(ids(&run(mixed_rows(), json!({"v": dir}))), expected);
    }

    #[test]
    fn test_mixed_types_ignore_input_order() {
        let mut reversed = mixed_rows();
        if let Value::Array(rows) = &mut reversed {
            rows.reverse();
        }
        assert_eq!(
            ids(&run(reversed, json!({"v": "ASC"}))),
            ids(&run(mixed_rows(), json!({"v": "ASC"})))
        );
    }

    #[rstest]
    #[case(json!({"cat": "DESC", "v": "ASC"}), vec![3, 1, 4, 2])]
    #[case(json!({"cat": "ASC", "v": "DESC"}), vec![2, 4, 1, 3])]
    #[case(json!("cat, v desc"), vec![2, 4, 1, 3])]
    fn test_nulls_in_second_key(#[case] config: Value, #[case] expected: Vec<i64>) {
        let rows = json!([
            {"id": 1, "cat": "A", "v": null},
            {"id": 2, "cat": "A", "v": 2},
            {"id": 3, "cat": "B", "v": null},
            {"id": 4, "cat": "A", "v": 1},
        ]);
        assert_eq!(ids(&run(rows, config)), expected);
    }
}
