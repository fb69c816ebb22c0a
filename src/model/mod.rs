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

//! Value model: the source capability trait and loose comparison helpers

pub mod compare;
pub mod source;

pub use compare::{
    as_number, canonical_key, display_string, is_numeric, loose_eq, natural_cmp, strict_eq,
    truthy,
};
pub use source::{DataSource, Keyed, KeyedAccess, Node, Serialized};
