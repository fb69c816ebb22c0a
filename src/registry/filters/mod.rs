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

//! Built-in filters

macro_rules! filter_meta {
    ($name:literal, [$($alias:literal),*], $doc:literal) => {
        fn name(&self) -> &'static str {
            $name
        }

        fn aliases(&self) -> &'static [&'static str] {
            &[$($alias),*]
        }

        fn documentation(&self) -> &'static str {
            $doc
        }
    };
}

pub(crate) use filter_meta;

mod collection;
mod string;
mod value;

pub use collection::{
    CountFilter, FirstFilter, JoinFilter, KeysFilter, LastFilter, ReverseFilter, SortFilter,
    UniqueFilter, ValuesFilter,
};
pub use string::{
    LowerFilter, LtrimFilter, ReplaceFilter, RtrimFilter, SlugFilter, SplitFilter, SubstrFilter,
    TrimFilter, UcfirstFilter, UcwordsFilter, UpperFilter,
};
pub use value::{
    AbsFilter, BetweenFilter, BoolFilter, ClampFilter, DateFilter, DefaultFilter, FloatFilter,
    IntFilter, JsonFilter, RoundFilter, StringFilter,
};

use super::filter::FilterRegistry;

/// Register every built-in filter
pub fn register_builtin_filters(registry: &FilterRegistry) {
    registry.register::<TrimFilter>();
    registry.register::<LtrimFilter>();
    registry.register::<RtrimFilter>();
    registry.register::<UpperFilter>();
    registry.register::<LowerFilter>();
    registry.register::<UcfirstFilter>();
    registry.register::<UcwordsFilter>();
    registry.register::<SubstrFilter>();
    registry.register::<ReplaceFilter>();
    registry.register::<SplitFilter>();
    registry.register::<SlugFilter>();

    registry.register::<JoinFilter>();
    registry.register::<CountFilter>();
    registry.register::<FirstFilter>();
    registry.register::<LastFilter>();
    registry.register::<KeysFilter>();
    registry.register::<ValuesFilter>();
    registry.register::<ReverseFilter>();
    registry.register::<SortFilter>();
    registry.register::<UniqueFilter>();

    registry.register::<DefaultFilter>();
    registry.register::<ClampFilter>();
    registry.register::<BetweenFilter>();
    registry.register::<JsonFilter>();
    registry.register::<IntFilter>();
    registry.register::<FloatFilter>();
    registry.register::<BoolFilter>();
    registry.register::<StringFilter>();
    registry.register::<AbsFilter>();
    registry.register::<RoundFilter>();
    registry.register::<DateFilter>();
}

/// Numeric argument at `index`
pub(crate) fn numeric_arg(args: &[String], index: usize) -> Option<f64> {
    args.get(index)
        .and_then(|raw| crate::model::compare::parse_numeric(raw))
}

/// Integer argument at `index`
pub(crate) fn int_arg(args: &[String], index: usize) -> Option<i64> {
    args.get(index).and_then(|raw| raw.trim().parse().ok())
}
