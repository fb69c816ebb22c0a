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

//! WHERE NULL and WHERE NOT NULL

use super::{field_path, field_value};
use crate::error::Result;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::Value;

/// Field names from a `"field"` or `["a", "b"]` config
fn fields(config: &Value, context: &OperatorContext<'_>) -> Option<Vec<String>> {
    match config {
        Value::String(field) => Some(vec![field_path(field, context.expressions)]),
        Value::Array(list) => list
            .iter()
            .map(|field| field.as_str().map(|f| field_path(f, context.expressions)))
            .collect(),
        _ => None,
    }
}

fn filter_nulls(
    items: ItemSet,
    config: &Value,
    context: &OperatorContext<'_>,
    want_null: bool,
) -> ItemSet {
    let Some(fields) = fields(config, context) else {
        log::debug!("null check ignoring config {config}");
        return items;
    };
    items
        .into_iter()
        .filter(|(_, item)| {
            fields
                .iter()
                .all(|field| field_value(item, field).is_null() == want_null)
        })
        .collect()
}

/// Keep items whose field is `null` or missing
#[derive(Debug, Default)]
pub struct WhereNullOperator;

impl Operator for WhereNullOperator {
    fn name(&self) -> &'static str {
        "WHERE NULL"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["IS NULL", "NULL"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(filter_nulls(items, config, context, true))
    }
}

/// Keep items whose field holds a value
#[derive(Debug, Default)]
pub struct WhereNotNullOperator;

impl Operator for WhereNotNullOperator {
    fn name(&self) -> &'static str {
        "WHERE NOT NULL"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["IS NOT NULL", "NOT NULL"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(filter_nulls(items, config, context, false))
    }
}
