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

//! Built-in wildcard operators

mod between;
mod distinct;
mod like;
mod membership;
mod null_check;
mod order_by;
mod paging;
mod where_clause;

pub use between::{BetweenOperator, NotBetweenOperator};
pub use distinct::DistinctOperator;
pub use like::LikeOperator;
pub use membership::{WhereInOperator, WhereNotInOperator};
pub use null_check::{WhereNotNullOperator, WhereNullOperator};
pub use order_by::OrderByOperator;
pub use paging::{LimitOperator, OffsetOperator};
pub use where_clause::WhereOperator;

use super::operator::{OperatorContext, OperatorRegistry};
use crate::model::DataSource;
use crate::parser::ExpressionParser;
use crate::path::accessor::{self, lookup};
use crate::path::segments::{after_first_wildcard, split_path};
use serde_json::Value;

/// Register all built-in operators
pub fn register_builtin_operators(registry: &OperatorRegistry) {
    registry.register_operator(WhereOperator);
    registry.register_operator(OrderByOperator);
    registry.register_operator(LimitOperator);
    registry.register_operator(OffsetOperator);
    registry.register_operator(DistinctOperator);
    registry.register_operator(LikeOperator);
    registry.register_operator(BetweenOperator);
    registry.register_operator(NotBetweenOperator);
    registry.register_operator(WhereInOperator);
    registry.register_operator(WhereNotInOperator);
    registry.register_operator(WhereNullOperator);
    registry.register_operator(WhereNotNullOperator);
}

/// Item-relative path named by a config key
///
/// `{{ products.*.price }}` and `products.*.price` both give `price`; a plain
/// `price` is used as is.
pub(crate) fn field_path(key: &str, expressions: &ExpressionParser) -> String {
    let path = match expressions.parse(key) {
        Ok(Some(expr)) => expr.path.clone(),
        _ => key.trim().to_string(),
    };
    match after_first_wildcard(&path) {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Value of `field` inside `item` (`null` when missing)
pub(crate) fn field_value(item: &Value, field: &str) -> Value {
    lookup(item, &split_path(field)).unwrap_or(Value::Null)
}

/// Resolve a `{{ }}` comparison operand against the source or the target
///
/// Non-template operands are returned unchanged.
pub(crate) fn resolve_operand(operand: &Value, context: &OperatorContext<'_>) -> Value {
    let Value::String(text) = operand else {
        return operand.clone();
    };
    let Ok(Some(expr)) = context.expressions.parse(text) else {
        return operand.clone();
    };
    let default = expr.default.clone().unwrap_or(Value::Null);
    let resolved = match expr.alias_key() {
        Some(alias) => lookup(context.target, &split_path(alias)),
        None => context
            .source
            .and_then(|source| resolve_source(source, &expr.path)),
    };
    resolved.filter(|v| !v.is_null()).unwrap_or(default)
}

fn resolve_source(source: &dyn DataSource, path: &str) -> Option<Value> {
    accessor::get(source, path, Value::Null).ok()
}
