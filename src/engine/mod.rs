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

//! Mapping engine: wildcard handling, hooks, alias ordering, reversal and the mapper
//!
//! [`DataMapper`] is the entry point; the other modules are its building blocks and
//! are public for callers that need them on their own.

#![warn(missing_docs)]

pub mod events;
pub mod hooks;
pub mod mapper;
pub mod plan;
pub mod reverser;
pub mod wildcard;

pub use events::{DiagnosticSink, LogSink, MappingEvent, RecordingSink};
pub use hooks::{
    HookCallback, HookContext, HookFilter, HookInvoker, HookKey, HookKind, HookOutcome, HookSpec,
    Hooks, PathPattern, RawHooks,
};
pub use mapper::{DataMapper, EntryCallback, MODE_INVERSE, MODE_MAP, MODE_TEMPLATE, Mapping};
pub use plan::{ExecutionOrder, alias_dependencies, execution_order};
pub use reverser::{MappingReverser, reverse_mapping, reverse_template};
pub use wildcard::{
    ItemAction, iterate_wildcard_items, normalize_value, normalize_wildcard_array,
    positions_to_value, try_iterate_wildcard_items,
};
