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

//! Reversing a reversed table restores it

use datamap::{DataMapper, MapperConfig, Mapping, reverse_mapping};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn dot_path() -> impl Strategy<Value = String> {
    "[a-z]{1,4}(\\.[a-z]{1,4}){0,2}"
}

/// Tables whose sources are pairwise distinct
fn bijective_table() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(dot_path(), dot_path(), 0..8).prop_map(|by_source| {
        let mut table = Map::new();
        for (source, target) in by_source {
            table.insert(target, Value::String(format!("{{{{ {source} }}}}")));
        }
        Value::Object(table)
    })
}

proptest! {
    #[test]
    fn reverse_twice_is_identity(table in bijective_table()) {
        prop_assert_eq!(reverse_mapping(&reverse_mapping(&table)), table);
    }

    #[test]
    fn reversed_table_has_one_entry_per_source(table in bijective_table()) {
        let reversed = reverse_mapping(&table);
        prop_assert_eq!(reversed.as_object().map(Map::len), table.as_object().map(Map::len));
    }
}

#[test]
fn non_reversible_cells_are_dropped() {
    let table = json!({
        "a": "{{ x | upper }}",
        "b": "{{ y ?? 1 }}",
        "c": "{{ @a }}",
        "d": {"__static__": "z"},
        "e": 5,
        "f": "w.v",
    });
    assert_eq!(reverse_mapping(&table), json!({"w.v": "{{ f }}"}));
}

#[test]
fn reversed_mapping_maps_back() {
    let mapper = DataMapper::from_config(&MapperConfig::default());
    let table = json!({"profile.name": "{{ user.name }}", "profile.city": "{{ addr.city }}"});
    let source = json!({"user": {"name": "Lu"}, "addr": {"city": "Oslo"}});
    let forward = mapper.map(&source, &Mapping::new(table.clone())).unwrap();
    let back = mapper
        .map(&forward, &Mapping::new(reverse_mapping(&table)))
        .unwrap();
    assert_eq!(back, source);
}
