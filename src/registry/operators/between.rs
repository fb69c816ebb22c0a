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

//! BETWEEN and NOT BETWEEN
//!
//! The two operators partition any item set: an item is in exactly one result.

use super::{field_path, field_value, resolve_operand};
use crate::error::Result;
use crate::model::compare::as_number;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::Value;

static NULL: Value = Value::Null;

struct Range {
    field: String,
    bounds: Option<(f64, f64)>,
}

fn ranges(config: &Value, context: &OperatorContext<'_>) -> Option<Vec<Range>> {
    let Value::Object(fields) = config else {
        return None;
    };
    Some(
        fields
            .iter()
            .map(|(key, spec)| {
                let (min, max) = match spec {
                    Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
                    Value::Object(bounds) => (
                        bounds.get("min").unwrap_or(&NULL),
                        bounds.get("max").unwrap_or(&NULL),
                    ),
                    _ => (&NULL, &NULL),
                };
                let bounds = as_number(&resolve_operand(min, context))
                    .zip(as_number(&resolve_operand(max, context)));
                Range {
                    field: field_path(key, context.expressions),
                    bounds,
                }
            })
            .collect(),
    )
}

/// Whether the item lies inside every configured inclusive range
fn within(item: &Value, ranges: &[Range]) -> bool {
    ranges.iter().all(|range| {
        let Some((min, max)) = range.bounds else {
            return false;
        };
        as_number(&field_value(item, &range.field)).is_some_and(|n| n >= min && n <= max)
    })
}

fn partition(
    items: ItemSet,
    config: &Value,
    context: &OperatorContext<'_>,
    keep_inside: bool,
) -> ItemSet {
    let ranges = ranges(config, context).unwrap_or_default();
    if ranges.is_empty() {
        return if keep_inside { ItemSet::new() } else { items };
    }
    items
        .into_iter()
        .filter(|(_, item)| within(item, &ranges) == keep_inside)
        .collect()
}

/// Keep items whose field is numeric and within `[min, max]`
///
/// Config is `{field: [min, max]}` or `{field: {"min": .., "max": ..}}`.
#[derive(Debug, Default)]
pub struct BetweenOperator;

impl Operator for BetweenOperator {
    fn name(&self) -> &'static str {
        "BETWEEN"
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(partition(items, config, context, true))
    }
}

/// Keep exactly the items BETWEEN drops
#[derive(Debug, Default)]
pub struct NotBetweenOperator;

impl Operator for NotBetweenOperator {
    fn name(&self) -> &'static str {
        "NOT BETWEEN"
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(partition(items, config, context, false))
    }
}
