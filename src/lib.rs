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

//! Template mapping for nested, loosely-typed data
//!
//! `datamap` reads values at dot-paths (with `*` wildcards) from any
//! [`DataSource`], runs them through `{{ path | filter:arg ?? default }}` expressions
//! and SQL-like operators (`WHERE`, `ORDER BY`, `LIMIT`, ...), and writes the results
//! into a [`serde_json::Value`] target. Mappings can be reversed.
//!
//! ```
//! use datamap::{DataMapper, Mapping};
//! use serde_json::json;
//!
//! let source = json!({"users": [{"email": "a@x"}, {"email": null}, {"email": "b@x"}]});
//! let mapping = Mapping::new(json!({"emails.*": "{{ users.*.email }}"}));
//!
//! let out = DataMapper::new().map(&source, &mapping).unwrap();
//! assert_eq!(out, json!({"emails": {"0": "a@x", "2": "b@x"}}));
//!
//! let out = DataMapper::new()
//!     .with_reindex_wildcard(true)
//!     .map(&source, &mapping)
//!     .unwrap();
//! assert_eq!(out, json!({"emails": ["a@x", "b@x"]}));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod path;
pub mod registry;

// Re-export main types
pub use config::{CacheConfig, MapperConfig};
pub use engine::{
    DataMapper, DiagnosticSink, HookContext, HookFilter, HookInvoker, HookKind, HookOutcome,
    Hooks, Mapping, MappingEvent, MappingReverser, RawHooks, reverse_mapping, reverse_template,
};
pub use error::{MapperError, Result};
pub use model::{DataSource, Keyed, KeyedAccess, Serialized};
pub use parser::{
    CacheStats, ExpressionParser, MappingParser, MappingPlan, ParseError, ParseMode,
    ParsedExpression,
};
pub use registry::{
    Filter, FilterEngine, FilterRegistry, ItemSet, Operator, OperatorContext, OperatorRegistry,
    WildcardOperatorAdapter, create_standard_registries,
};
