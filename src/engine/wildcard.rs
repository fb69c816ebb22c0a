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

//! Wildcard item iteration and positional output
//!
//! Expanded reads arrive as `{concretePath: value}` maps. They are normalized to a
//! plain list, iterated with null skipping, and written back either at their original
//! positions (gaps kept) or at contiguous positions.

use serde_json::{Map, Value};

/// Verdict of a per-item callback
#[derive(Debug, Clone, PartialEq)]
pub enum ItemAction {
    /// Emit this value for the item
    Write(Value),
    /// Drop the item from the output
    Skip,
}

/// Values of an expanded map in traversal order
pub fn normalize_wildcard_array(expanded: Map<String, Value>) -> Vec<Value> {
    expanded.into_iter().map(|(_, value)| value).collect()
}

/// Elements of an already-read value (`null` gives nothing, scalars give themselves)
pub fn normalize_value(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => normalize_wildcard_array(map),
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Iterate items, returning `(position, value)` for every emitted item
///
/// Nulls are passed to `on_skip` and dropped when `skip_null` is set. Positions are
/// `0..n-1` when `reindex` is set, original list indices otherwise.
pub fn iterate_wildcard_items<S, F>(
    items: Vec<Value>,
    skip_null: bool,
    reindex: bool,
    on_skip: S,
    mut on_item: F,
) -> Vec<(usize, Value)>
where
    S: FnMut(usize, &Value),
    F: FnMut(usize, Value) -> ItemAction,
{
    let result: Result<_, std::convert::Infallible> =
        try_iterate_wildcard_items(items, skip_null, reindex, on_skip, |idx, value| {
            Ok(on_item(idx, value))
        });
    match result {
        Ok(positions) => positions,
        Err(never) => match never {},
    }
}

/// Fallible form of [`iterate_wildcard_items`]; the first error stops iteration
pub fn try_iterate_wildcard_items<S, F, E>(
    items: Vec<Value>,
    skip_null: bool,
    reindex: bool,
    mut on_skip: S,
    mut on_item: F,
) -> Result<Vec<(usize, Value)>, E>
where
    S: FnMut(usize, &Value),
    F: FnMut(usize, Value) -> Result<ItemAction, E>,
{
    let mut out = Vec::with_capacity(items.len());
    for (index, value) in items.into_iter().enumerate() {
        if skip_null && value.is_null() {
            on_skip(index, &value);
            continue;
        }
        match on_item(index, value)? {
            ItemAction::Write(mapped) => {
                let position = if reindex { out.len() } else { index };
                out.push((position, mapped));
            }
            ItemAction::Skip => on_skip(index, &Value::Null),
        }
    }
    Ok(out)
}

/// List when positions are contiguous (or `reindex`), index-keyed object otherwise
pub fn positions_to_value(positions: Vec<(usize, Value)>, reindex: bool) -> Value {
    let contiguous = positions
        .iter()
        .enumerate()
        .all(|(expected, (position, _))| *position == expected);
    if reindex || contiguous {
        return Value::Array(positions.into_iter().map(|(_, value)| value).collect());
    }
    Value::Object(
        positions
            .into_iter()
            .map(|(position, value)| (position.to_string(), value))
            .collect(),
    )
}
