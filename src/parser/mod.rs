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

//! Template parsing
//!
//! This module turns `{{ path | filter:arg ?? default }}` cells and whole mapping
//! tables into immutable, cached plans the engine can execute repeatedly.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod expression;
pub mod mapping;
pub mod split;

pub use cache::{BoundedCache, CacheStats};
pub use error::{ParseError, ParseResult};
pub use expression::{ALIAS_PREFIX, ExpressionParser, FilterCall, ParsedExpression};
pub use mapping::{
    ItemTemplate, MappingParser, MappingPlan, OperatorDirective, ParsedEntry, PlanEntry, PlanNode,
    WildcardBlock,
};

use serde::{Deserialize, Serialize};

/// Splitting strategy for filter arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Naive `|` / `:` splitting, quotes stripped, no escapes
    #[default]
    Fast,
    /// Quote-aware splitting with escape processing
    Safe,
}

/// Parse a single cell with the process-wide fast parser
pub fn parse(input: &str) -> ParseResult<Option<std::sync::Arc<ParsedExpression>>> {
    ExpressionParser::global(ParseMode::Fast).parse(input)
}
