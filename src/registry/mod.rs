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

//! Filter and operator registries
//!
//! Both registries are plain constructible objects. [`FilterRegistry::global`] and
//! [`OperatorRegistry::global`] return shared default instances holding the
//! built-ins; tests and embedders can build isolated ones instead.

#![warn(missing_docs)]

pub mod filter;
pub mod filters;
pub mod operator;
pub mod operators;

pub use filter::{Filter, FilterEngine, FilterRegistry};
pub use operator::{
    ItemSet, Operator, OperatorContext, OperatorRegistry, WildcardOperatorAdapter,
    normalize_operator_name,
};

use std::sync::Arc;

/// Create fresh registries with all built-in filters and operators
pub fn create_standard_registries() -> (Arc<FilterRegistry>, Arc<OperatorRegistry>) {
    (
        Arc::new(FilterRegistry::with_builtins()),
        Arc::new(OperatorRegistry::with_builtins()),
    )
}
