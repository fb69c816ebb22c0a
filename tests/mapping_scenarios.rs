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

//! End-to-end mapping scenarios

use datamap::{DataMapper, Keyed, KeyedAccess, MapperConfig, Mapping, Serialized};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn mapper() -> DataMapper {
    DataMapper::from_config(&MapperConfig::default())
}

fn orders() -> Value {
    json!({"items": [
        {"id": 1, "cat": "A", "val": 100},
        {"id": 2, "cat": "B", "val": 200},
        {"id": 3, "cat": "A", "val": 150},
    ]})
}

#[test]
fn test_filter_in_nested_target() {
    let mapping = Mapping::new(json!({"profile.name": "{{ user.name | upper }}"}));
    let out = mapper().map(&json!({"user": {"name": "alice"}}), &mapping).unwrap();
    assert_eq!(out, json!({"profile": {"name": "ALICE"}}));
}

#[rstest]
#[case(false, json!({"emails": {"0": "a@x", "2": "b@x"}}))]
#[case(true, json!({"emails": ["a@x", "b@x"]}))]
fn test_wildcard_emails(#[case] reindex: bool, #[case] expected: Value) {
    let source = json!({"users": [{"email": "a@x"}, {"email": null}, {"email": "b@x"}]});
    let mapping = Mapping::new(json!({"emails.*": "{{ users.*.email }}"}));
    let out = mapper()
        .with_skip_null(true)
        .with_reindex_wildcard(reindex)
        .map(&source, &mapping)
        .unwrap();
    assert_eq!(out, expected);
}

#[test]
fn test_operator_pipeline() {
    let mapping = Mapping::new(json!({"result": {
        "*": "{{ items.* }}",
        "WHERE": {"cat": "A"},
        "ORDER BY": {"val": "DESC"},
        "LIMIT": 1,
    }}));
    let out = mapper().map(&orders(), &mapping).unwrap();
    assert_eq!(out, json!({"result": [{"id": 3, "cat": "A", "val": 150}]}));
}

#[test]
fn test_operator_pipeline_with_templated_fields() {
    let mapping = Mapping::new(json!({"ids": {
        "*": "{{ items.*.id }}",
        "where": {"{{ items.*.cat }}": "{{ wanted }}"},
        "order_by": "val desc",
        "offset": 1,
    }}));
    let source = {
        let mut data = orders();
        data["wanted"] = json!("A");
        data
    };
    assert_eq!(mapper().map(&source, &mapping).unwrap(), json!({"ids": [1]}));
}

#[rstest]
#[case(json!({"fullname": "{{ user.name }}", "copy": "{{ @fullname }}"}))]
#[case(json!({"copy": "{{ @fullname }}", "fullname": "{{ user.name }}"}))]
fn test_alias_independent_of_order(#[case] table: Value) {
    let out = mapper()
        .map(&json!({"user": {"name": "Alice"}}), &Mapping::new(table))
        .unwrap();
    assert_eq!(out, json!({"fullname": "Alice", "copy": "Alice"}));
}

#[test]
fn test_alias_to_unwritten_key_uses_default() {
    let mapping = Mapping::new(json!({"copy": "{{ @missing ?? 'none' }}"}));
    assert_eq!(mapper().map(&json!({}), &mapping).unwrap(), json!({"copy": "none"}));
}

#[test]
fn test_unwrapped_and_plain_cells() {
    let mapping = Mapping::new(json!({
        "a": "user.name | upper",
        "b": "user.nick ?? guest",
        "c": "user.name",
        "d": {"__static__": "user.name"},
        "e": 42,
    }));
    let out = mapper().map(&json!({"user": {"name": "zed"}}), &mapping).unwrap();
    assert_eq!(out, json!({"a": "ZED", "b": "guest", "c": "zed", "d": "user.name", "e": 42}));
}

#[test]
fn test_custom_static_marker() {
    let mapping = Mapping::new(json!({"v": {"$literal": "{{ x }}"}, "w": {"__static__": 1}}));
    let out = mapper()
        .with_static_marker("$literal")
        .map(&json!({}), &mapping)
        .unwrap();
    assert_eq!(out, json!({"v": "{{ x }}", "w": {"__static__": 1}}));
}

#[test]
fn test_template_with_named_sources() {
    let sources: BTreeMap<String, Value> = [
        ("user".to_string(), json!({"name": "Ann", "tags": ["x", "y"]})),
        ("shop".to_string(), json!({"currency": "EUR"})),
    ]
    .into_iter()
    .collect();
    let template = json!({
        "customer": {"name": "{{ user.name }}", "tags": "{{ user.tags | join:'/' }}"},
        "currency": "{{ shop.currency | lower }}",
    });
    assert_eq!(
        mapper().map_from_template(&sources, &template).unwrap(),
        json!({"customer": {"name": "Ann", "tags": "x/y"}, "currency": "eur"})
    );
}

#[derive(Serialize)]
struct Account {
    owner: String,
    balance: f64,
}

struct Ledger(Vec<(String, Value)>);

impl KeyedAccess for Ledger {
    fn get_item(&self, key: &str) -> Option<Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn item_keys(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }
}

#[test]
fn test_heterogeneous_sources() {
    let account = Serialized::new(&Account {
        owner: "kim".into(),
        balance: 12.5,
    })
    .unwrap();
    let mapping =
        Mapping::new(json!({"who": "{{ owner | ucfirst }}", "money": "{{ balance | round }}"}));
    assert_eq!(mapper().map(&account, &mapping).unwrap(), json!({"who": "Kim", "money": 13}));

    let ledger = Keyed(Ledger(vec![
        ("first".into(), json!({"amount": 3})),
        ("second".into(), json!({"amount": 4})),
    ]));
    let mapping = Mapping::new(json!({"amounts": "{{ *.amount }}"}));
    assert_eq!(mapper().map(&ledger, &mapping).unwrap(), json!({"amounts": [3, 4]}));
}

#[test]
fn test_map_many() {
    let sources = vec![json!({"n": "a"}), json!({"n": "b"}), json!({})];
    let mapping = Mapping::new(json!({"name": "{{ n | upper ?? '-' }}"}));
    assert_eq!(
        mapper().map_many(&sources, &mapping).unwrap(),
        vec![json!({"name": "A"}), json!({"name": "B"}), json!({"name": "-"})]
    );
}

#[test]
fn test_inverse_roundtrip_of_nested_template() {
    let template = json!({"profile": {"name": "user.name", "email": "{{ user.email }}"}});
    let source = json!({"user": {"name": "Rae", "email": "r@x"}});
    let forward = mapper().map_from_template(&source, &template).unwrap();
    assert_eq!(forward, json!({"profile": {"name": "Rae", "email": "r@x"}}));
    assert_eq!(mapper().inverse_map(&forward, &template).unwrap(), source);
}

#[test]
fn test_mapping_from_json_text() {
    let mapping = Mapping::from_json_str(r#"{"x": "{{ a.b | default:7 }}"}"#).unwrap();
    assert_eq!(mapper().map(&json!({"a": {}}), &mapping).unwrap(), json!({"x": 7}));
    assert!(Mapping::from_json_str("{not json").is_err());
}
