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

//! Dot-path access to nested data
//!
//! [`accessor`] reads from any [`DataSource`](crate::model::DataSource);
//! [`mutator`] writes into [`serde_json::Value`] targets.

pub mod accessor;
pub mod mutator;
pub mod segments;

pub use accessor::{DataAccessor, exists, get, get_typed, get_wildcard};
pub use mutator::{
    merge_in, remove, remove_in, set, set_in, set_typed, set_wildcard, set_wildcard_in,
};
pub use segments::{WILDCARD, has_wildcard, join_path, split_path};
