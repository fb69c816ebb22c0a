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

//! Hook lifecycle and filtering through a full mapping run

use datamap::{
    DataMapper, HookFilter, HookInvoker, HookKind, HookOutcome, Hooks, MapperConfig, Mapping,
    RawHooks,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn mapper() -> DataMapper {
    DataMapper::from_config(&MapperConfig::default())
}

fn users() -> Value {
    json!({"user": {"name": "ann"}, "users": [{"email": "a@x"}, {"email": "b@x"}]})
}

#[test]
fn test_single_pair_fires_every_kind_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = Hooks::new();
    for kind in HookKind::ALL {
        let seen = Arc::clone(&seen);
        hooks = hooks.on(kind, move |ctx, _| {
            seen.lock().push(ctx.kind);
            HookOutcome::Continue
        });
    }
    let out = mapper()
        .with_hooks(hooks)
        .map(&users(), &Mapping::new(json!({"name": "{{ user.name }}"})))
        .unwrap();
    assert_eq!(out, json!({"name": "ann"}));
    assert_eq!(*seen.lock(), HookKind::ALL.to_vec());
}

#[test]
fn test_before_write_veto() {
    let hooks = Hooks::new().on_filtered(
        HookKind::BeforeWrite,
        HookFilter::parse("tgt:secret").unwrap(),
        |_, _| HookOutcome::Skip,
    );
    let mapping = Mapping::new(json!({"name": "{{ user.name }}", "secret": "{{ user.name }}"}));
    let out = mapper().with_hooks(hooks).map(&users(), &mapping).unwrap();
    assert_eq!(out, json!({"name": "ann"}));
}

#[test]
fn test_transform_replacements_chain() {
    let hooks = Hooks::new()
        .on(HookKind::BeforeTransform, |_, value| {
            HookOutcome::Replace(json!(format!("{}-1", value.as_str().unwrap_or_default())))
        })
        .on(HookKind::AfterTransform, |_, value| {
            HookOutcome::Replace(json!(format!("{}-2", value.as_str().unwrap_or_default())))
        });
    let mapping = Mapping::new(json!({"name": "{{ user.name | upper }}"}));
    let out = mapper().with_hooks(hooks).map(&users(), &mapping).unwrap();
    assert_eq!(out, json!({"name": "ANN-1-2"}));
}

#[test]
fn test_source_filter_sees_concrete_item_paths() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let raw = RawHooks::new().on_filtered(
        "beforeTransform",
        "src:users.*.email",
        move |ctx, value| {
            recorder
                .lock()
                .push((ctx.source_path.map(str::to_string), ctx.item_index));
            HookOutcome::Replace(json!(format!("<{}>", value.as_str().unwrap_or_default())))
        },
    );
    let mapping =
        Mapping::new(json!({"emails.*": "{{ users.*.email }}", "name": "{{ user.name }}"}));
    let out = mapper()
        .with_hooks(HookInvoker::normalize(raw).unwrap())
        .map(&users(), &mapping)
        .unwrap();
    assert_eq!(out, json!({"emails": ["<a@x>", "<b@x>"], "name": "ann"}));
    assert_eq!(
        *seen.lock(),
        vec![
            (Some("users.0.email".to_string()), Some(0)),
            (Some("users.1.email".to_string()), Some(1)),
        ]
    );
}

#[test]
fn test_skip_in_transform_drops_wildcard_item() {
    let hooks = Hooks::new().on(HookKind::BeforeTransform, |ctx, _| match ctx.item_index {
        Some(0) => HookOutcome::Skip,
        _ => HookOutcome::Continue,
    });
    let mapping = Mapping::new(json!({"emails.*": "{{ users.*.email }}"}));
    let out = mapper()
        .with_hooks(hooks)
        .with_reindex_wildcard(true)
        .map(&users(), &mapping)
        .unwrap();
    assert_eq!(out, json!({"emails": ["b@x"]}));
}

#[test]
fn test_mode_filter() {
    let raw = RawHooks::new().on_filtered(HookKind::AfterTransform, "mode:template", |_, value| {
        HookOutcome::Replace(json!(format!("{}!", value.as_str().unwrap_or_default())))
    });
    let mapper = mapper().with_hooks(HookInvoker::normalize(raw).unwrap());
    let table = json!({"name": "{{ user.name }}"});
    assert_eq!(
        mapper.map(&users(), &Mapping::new(table.clone())).unwrap(),
        json!({"name": "ann"})
    );
    assert_eq!(
        mapper.map_from_template(&users(), &table).unwrap(),
        json!({"name": "ann!"})
    );
}

#[test]
fn test_before_pair_supplies_value() {
    let hooks = Hooks::new().on_filtered(
        HookKind::BeforePair,
        HookFilter::parse("target:name").unwrap(),
        |_, _| HookOutcome::Replace(json!("bob")),
    );
    let mapping = Mapping::new(json!({"name": "{{ user.missing | upper }}"}));
    let out = mapper().with_hooks(hooks).map(&users(), &mapping).unwrap();
    assert_eq!(out, json!({"name": "BOB"}));
}

#[test]
fn test_after_all_replaces_result() {
    let hooks = Hooks::new().on(HookKind::AfterAll, |ctx, value| {
        assert_eq!(ctx.target, value);
        HookOutcome::Replace(json!({"wrapped": value}))
    });
    let out = mapper()
        .with_hooks(hooks)
        .map(&users(), &Mapping::new(json!({"n": "{{ user.name }}"})))
        .unwrap();
    assert_eq!(out, json!({"wrapped": {"n": "ann"}}));
}

#[test]
fn test_empty_hook_table_changes_nothing() {
    let mapping =
        Mapping::new(json!({"emails.*": "{{ users.*.email }}", "name": "{{ user.name }}"}));
    let plain = mapper().map(&users(), &mapping).unwrap();
    let hooked = mapper().with_hooks(Hooks::new()).map(&users(), &mapping).unwrap();
    assert_eq!(plain, hooked);
}

#[test]
fn test_unknown_names_are_ignored_and_bad_filters_rejected() {
    let raw = RawHooks::new().on("sometimeLater", |_, _| HookOutcome::Skip);
    assert!(HookInvoker::normalize(raw).unwrap().is_empty());

    let raw = RawHooks::new().on_filtered("before_write", "path:x", |_, _| HookOutcome::Skip);
    assert!(HookInvoker::normalize(raw).is_err());
}
