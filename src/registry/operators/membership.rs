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

//! WHERE IN and WHERE NOT IN
//!
//! Config is `{field: [values]}` or `{field: {"values": [values]}}`. Membership is
//! type-strict. When `values` is not a list, both operators exclude every item.

use super::{field_path, field_value, resolve_operand};
use crate::error::Result;
use crate::model::compare::strict_eq;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::Value;

struct Membership {
    field: String,
    values: Vec<Value>,
}

/// Parsed conditions, `None` when any `values` is not a list
fn memberships(config: &Value, context: &OperatorContext<'_>) -> Option<Vec<Membership>> {
    let Value::Object(fields) = config else {
        return None;
    };
    fields
        .iter()
        .map(|(key, spec)| {
            let raw = match spec {
                Value::Object(inner) => inner.get("values")?,
                other => other,
            };
            match resolve_operand(raw, context) {
                Value::Array(values) => Some(Membership {
                    field: field_path(key, context.expressions),
                    values,
                }),
                _ => None,
            }
        })
        .collect()
}

fn is_member(item: &Value, condition: &Membership) -> bool {
    let actual = field_value(item, &condition.field);
    condition.values.iter().any(|candidate| strict_eq(&actual, candidate))
}

/// Keep items whose field value is one of the listed values
#[derive(Debug, Default)]
pub struct WhereInOperator;

impl Operator for WhereInOperator {
    fn name(&self) -> &'static str {
        "WHERE IN"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["IN"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        let Some(conditions) = memberships(config, context) else {
            return Ok(ItemSet::new());
        };
        Ok(items
            .into_iter()
            .filter(|(_, item)| conditions.iter().all(|c| is_member(item, c)))
            .collect())
    }
}

/// Keep items whose field value is none of the listed values
#[derive(Debug, Default)]
pub struct WhereNotInOperator;

impl Operator for WhereNotInOperator {
    fn name(&self) -> &'static str {
        "WHERE NOT IN"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["NOT IN"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        let Some(conditions) = memberships(config, context) else {
            return Ok(ItemSet::new());
        };
        Ok(items
            .into_iter()
            .filter(|(_, item)| conditions.iter().all(|c| !is_member(item, c)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operators::test_support::{ids, items};
    use serde_json::json;

    fn rows() -> ItemSet {
        items(json!([
            {"id": 1, "s": "a"},
            {"id": 2, "s": "1"},
            {"id": 3, "s": 1},
            {"id": 4, "s": true},
            {"id": 5}
        ]))
    }

    fn run(op: &dyn Operator, config: Value) -> ItemSet {
        let target = json!({});
        let original = ItemSet::new();
        let context = OperatorContext::new(&target, &original);
        op.apply(rows(), &config, &context).unwrap()
    }

    #[test]
    fn test_strict_membership() {
        assert_eq!(ids(&run(&WhereInOperator, json!({"s": [1, "a"]}))), vec![1, 3]);
        assert_eq!(ids(&run(&WhereInOperator, json!({"s": {"values": ["1", null]}}))), vec![2, 5]);
        assert_eq!(ids(&run(&WhereNotInOperator, json!({"s": [1, "a"]}))), vec![2, 4, 5]);
    }

    #[test]
    fn test_non_list_values_exclude_all() {
        assert!(run(&WhereInOperator, json!({"s": "a"})).is_empty());
        assert!(run(&WhereNotInOperator, json!({"s": "a"})).is_empty());
        assert!(run(&WhereInOperator, json!({"s": {"values": 1}})).is_empty());
        assert!(run(&WhereNotInOperator, json!({"s": {"values": 1}})).is_empty());
        assert!(run(&WhereNotInOperator, json!(["a"])).is_empty());
    }
}
