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

//! Filters are pure: the same input and arguments always give the same output

use datamap::{FilterEngine, FilterRegistry};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;

const SPECS: &[&str] = &[
    "trim", "upper", "lower", "ucfirst", "ucwords", "slug", "reverse", "count", "first",
    "last", "join:-", "split:,", "int", "float", "string", "bool", "abs", "round:1",
    "default:x", "substr:1:2", "replace:a:b", "json",
];

fn engine() -> FilterEngine {
    FilterEngine::new(Arc::new(FilterRegistry::with_builtins()))
}

fn input() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i32>().prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
        "[ a-zA-Z,0-9]{0,12}".prop_map(Value::from),
        prop::collection::vec("[a-c ]{0,3}", 0..4).prop_map(|v| json!(v)),
    ]
}

proptest! {
    #[test]
    fn same_chain_same_result(value in input(),
                              chain in prop::collection::vec(prop::sample::select(SPECS), 0..5)) {
        let engine = engine();
        let first = engine.apply_specs(value.clone(), &chain).unwrap();
        let second = engine.apply_specs(value, &chain).unwrap();
        prop_assert_eq!(first, second);
    }
}

proptest! {
    #[test]
    fn sort_ignores_input_order(
        (values, shuffled) in prop::collection::vec(
            prop_oneof![
                Just(Value::Null),
                (-20i64..20).prop_map(Value::from),
                "[a-c][a-c1-2]?".prop_map(Value::from),
            ],
            0..10,
        )
        .prop_flat_map(|values| (Just(values.clone()), Just(values).prop_shuffle())),
    ) {
        let engine = engine();
        let first = engine.apply_specs(json!(values), &["sort"]).unwrap();
        let second = engine.apply_specs(json!(shuffled), &["sort"]).unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn sort_puts_numbers_before_text() {
    assert_eq!(
        engine().apply_specs(json!(["1a", 10, 9, "b", null, "10.5"]), &["sort"]).unwrap(),
        json!([null, 9, 10, "10.5", "1a", "b"])
    );
}

#[test]
fn trim_then_lower() {
    let engine = engine();
    assert_eq!(
        engine.apply_specs(json!("  HELLO  "), &["trim", "lower"]).unwrap(),
        json!("hello")
    );
    assert_eq!(engine.apply_specs(json!("  HELLO  "), &["trim"]).unwrap(), json!("HELLO"));
}

#[test]
fn interleaved_calls_do_not_interfere() {
    let engine = engine();
    for _ in 0..3 {
        assert_eq!(engine.apply_specs(json!("MiX"), &["upper"]).unwrap(), json!("MIX"));
        assert_eq!(engine.apply_specs(json!("MiX"), &["lower"]).unwrap(), json!("mix"));
    }
}

#[test]
fn shared_engine_across_threads() {
    let engine = engine();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let engine = engine.clone();
            thread::spawn(move || {
                let spec = if n % 2 == 0 { "upper" } else { "lower" };
                (0..50)
                    .map(|_| engine.apply_specs(json!("AbC"), &[spec]).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        let expected = if n % 2 == 0 { "ABC" } else { "abc" };
        assert!(handle.join().unwrap().iter().all(|v| v == expected));
    }
}

#[test]
fn unknown_filter_is_an_error() {
    assert!(engine().apply_specs(json!("x"), &["nope"]).is_err());
}
