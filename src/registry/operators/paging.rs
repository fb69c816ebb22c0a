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

//! LIMIT and OFFSET

use crate::error::Result;
use crate::registry::operator::{ItemSet, Operator, OperatorContext};
use serde_json::Value;

/// Non-negative JSON integer, anything else disables the operator
fn count_config(config: &Value, operator: &str) -> Option<usize> {
    let count = config
        .as_u64()
        .and_then(|n| usize::try_from(n).ok());
    if count.is_none() {
        log::debug!("{operator} ignoring config {config}");
    }
    count
}

/// Keep the first `n` items
#[derive(Debug, Default)]
pub struct LimitOperator;

impl Operator for LimitOperator {
    fn name(&self) -> &'static str {
        "LIMIT"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["TAKE"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        _context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(match count_config(config, self.name()) {
            Some(limit) => items.into_iter().take(limit).collect(),
            None => items,
        })
    }
}

/// Drop the first `n` items
#[derive(Debug, Default)]
pub struct OffsetOperator;

impl Operator for OffsetOperator {
    fn name(&self) -> &'static str {
        "OFFSET"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["SKIP"]
    }

    fn apply(
        &self,
        items: ItemSet,
        config: &Value,
        _context: &OperatorContext<'_>,
    ) -> Result<ItemSet> {
        Ok(match count_config(config, self.name()) {
            Some(offset) => items.into_iter().skip(offset).collect(),
            None => items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::operators::test_support::{items, keys};
    use rstest::rstest;
    use serde_json::json;

    fn five() -> ItemSet {
        items(json!([10, 20, 30, 40, 50]))
    }

    fn apply(op: &dyn Operator, config: Value) -> ItemSet {
        let target = json!({});
        let original = ItemSet::new();
        let context = OperatorContext::new(&target, &original);
        op.apply(five(), &config, &context).unwrap()
    }

    #[rstest]
    #[case(json!(2), vec!["0", "1"])]
    #[case(json!(0), vec![])]
    #[case(json!(99), vec!["0", "1", "2", "3", "4"])]
    #[case(json!(-1), vec!["0", "1", "2", "3", "4"])]
    #[case(json!(1.5), vec!["0", "1", "2", "3", "4"])]
    #[case(json!("2"), vec!["0", "1", "2", "3", "4"])]
    fn test_limit(#[case] config: Value, #[case] expected: Vec<&str>) {
        assert_eq!(keys(&apply(&LimitOperator, config)), expected);
    }

    #[rstest]
    #[case(json!(3), vec!["3", "4"])]
    #[case(json!(5), vec![])]
    #[case(json!(-2), vec!["0", "1", "2", "3", "4"])]
    fn test_offset(#[case] config: Value, #[case] expected: Vec<&str>) {
        assert_eq!(keys(&apply(&OffsetOperator, config)), expected);
    }
}
