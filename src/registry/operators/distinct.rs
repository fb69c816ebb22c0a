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

//! DISTINCT: first occurrence per field value wins

use super::{field_path, field_value};
use crate::error::Result;
use crate::model::compare::canonical_key;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use rustc_hash::FxHashSet;
use serde_json::Value;

/// Drop items whose field value was already seen
///
/// Values are compared by canonical encoding, so `1` and `1.0` collide while `"1"`,
/// `1` and `true` stay distinct.
#[derive(Debug, Default)]
pub struct DistinctOperator;

impl Operator for DistinctOperator {
    fn name(&self) -> &'static str {
        "DISTINCT"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["UNIQUE"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        let Value::String(key) = config else {
            log::debug!("DISTINCT ignoring non-field config {config}");
            return Ok(items);
        };
        let field = field_path(key, context.expressions);
        let mut seen = FxHashSet::default();
        Ok(items
            .into_iter()
            .filter(|(_, item)| seen.insert(canonical_key(&field_value(item, &field))))
            .collect())
    }
}
