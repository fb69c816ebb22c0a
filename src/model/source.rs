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

//! Readable-by-key capability shared by every source kind
//!
//! The accessor never branches on concrete types. Anything that can look up a child by
//! key, list its keys and materialise itself as a [`Value`] can be mapped from.

use crate::path::segments::parse_index;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::ops::Deref;
use std::sync::Arc;

/// A child node returned by [`DataSource::child`]
pub enum Node<'a> {
    /// Child borrowed from its parent
    Borrowed(&'a (dyn DataSource + 'a)),
    /// Child produced on demand (e.g. by a collection adapter)
    Owned(Box<dyn DataSource + 'a>),
}

impl<'a> Deref for Node<'a> {
    type Target = dyn DataSource + 'a;

    fn deref(&self) -> &Self::Target {
        match self {
            Node::Borrowed(node) => *node,
            Node::Owned(node) => node.as_ref(),
        }
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Node({})", self.to_value())
    }
}

/// Capability contract for anything the accessor can traverse
pub trait DataSource {
    /// Look up a direct child by key
    fn child(&self, key: &str) -> Option<Node<'_>>;

    /// Keys present at this level in traversal order, `None` for leaves
    fn child_keys(&self) -> Option<Vec<String>>;

    /// Materialise this node as a JSON value
    fn to_value(&self) -> Value;

    /// Leaf holding a string, number or boolean
    fn is_scalar(&self) -> bool {
        false
    }

    /// Explicit null / absent optional
    fn is_null(&self) -> bool {
        false
    }
}

impl DataSource for Value {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        match self {
            Value::Object(map) => map.get(key).map(|v| Node::Borrowed(v)),
            Value::Array(items) => parse_index(key)
                .and_then(|idx| items.get(idx))
                .map(|v| Node::Borrowed(v)),
            _ => None,
        }
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        match self {
            Value::Object(map) => Some(map.keys().cloned().collect()),
            Value::Array(items) => Some((0..items.len()).map(|i| i.to_string()).collect()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn is_scalar(&self) -> bool {
        matches!(self, Value::String(_) | Value::Number(_) | Value::Bool(_))
    }

    fn is_null(&self) -> bool {
        Value::is_null(self)
    }
}

impl DataSource for Map<String, Value> {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        self.get(key).map(|v| Node::Borrowed(v))
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        Some(self.keys().cloned().collect())
    }

    fn to_value(&self) -> Value {
        Value::Object(self.clone())
    }
}

impl<T: DataSource> DataSource for [T] {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        parse_index(key)
            .and_then(|idx| self.get(idx))
            .map(|v| Node::Borrowed(v))
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        Some((0..self.len()).map(|i| i.to_string()).collect())
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(DataSource::to_value).collect())
    }
}

impl<T: DataSource> DataSource for Vec<T> {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        self.as_slice().child(key)
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        self.as_slice().child_keys()
    }

    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

macro_rules! impl_map_source {
    ($map:ty $(, $generic:ident : $bound:path)*) => {
        impl<T: DataSource $(, $generic: $bound)*> DataSource for $map {
            fn child(&self, key: &str) -> Option<Node<'_>> {
                self.get(key).map(|v| Node::Borrowed(v))
            }

            fn child_keys(&self) -> Option<Vec<String>> {
                Some(self.keys().cloned().collect())
            }

            fn to_value(&self) -> Value {
                Value::Object(
                    self.iter()
                        .map(|(k, v)| (k.clone(), v.to_value()))
                        .collect(),
                )
            }
        }
    };
}

impl_map_source!(IndexMap<String, T, S>, S: BuildHasher);
impl_map_source!(HashMap<String, T, S>, S: BuildHasher);
impl_map_source!(BTreeMap<String, T>);

impl<T: DataSource> DataSource for Option<T> {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        self.as_ref().and_then(|inner| inner.child(key))
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        self.as_ref().and_then(DataSource::child_keys)
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, DataSource::to_value)
    }

    fn is_scalar(&self) -> bool {
        self.as_ref().is_some_and(DataSource::is_scalar)
    }

    fn is_null(&self) -> bool {
        self.as_ref().is_none_or(DataSource::is_null)
    }
}

macro_rules! impl_delegating_source {
    ($($wrapper:ty),*) => {
        $(
            impl<T: DataSource + ?Sized> DataSource for $wrapper {
                fn child(&self, key: &str) -> Option<Node<'_>> {
                    (**self).child(key)
                }

                fn child_keys(&self) -> Option<Vec<String>> {
                    (**self).child_keys()
                }

                fn to_value(&self) -> Value {
                    (**self).to_value()
                }

                fn is_scalar(&self) -> bool {
                    (**self).is_scalar()
                }

                fn is_null(&self) -> bool {
                    (**self).is_null()
                }
            }
        )*
    };
}

impl_delegating_source!(&T, Box<T>, Arc<T>);

macro_rules! impl_scalar_source {
    ($($scalar:ty),*) => {
        $(
            impl DataSource for $scalar {
                fn child(&self, _key: &str) -> Option<Node<'_>> {
                    None
                }

                fn child_keys(&self) -> Option<Vec<String>> {
                    None
                }

                fn to_value(&self) -> Value {
                    Value::from(self.clone())
                }

                fn is_scalar(&self) -> bool {
                    true
                }
            }
        )*
    };
}

impl_scalar_source!(String, bool, i32, i64, u32, u64, f64);

impl DataSource for str {
    fn child(&self, _key: &str) -> Option<Node<'_>> {
        None
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        None
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }

    fn is_scalar(&self) -> bool {
        true
    }
}

/// Get-by-key capability of collection-like types
///
/// Implement this for model or collection types that expose item access but are not
/// plain maps. Wrap the value in [`Keyed`] to hand it to the mapper.
pub trait KeyedAccess {
    /// Item stored under `key`
    fn get_item(&self, key: &str) -> Option<Value>;

    /// Keys of all items, in iteration order
    fn item_keys(&self) -> Vec<String>;
}

/// Adapter exposing a [`KeyedAccess`] type as a [`DataSource`]
#[derive(Debug, Clone)]
pub struct Keyed<T>(pub T);

impl<T: KeyedAccess> DataSource for Keyed<T> {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        self.0
            .get_item(key)
            .map(|item| Node::Owned(Box::new(item)))
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        Some(self.0.item_keys())
    }

    fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .item_keys()
                .into_iter()
                .filter_map(|key| self.0.get_item(&key).map(|item| (key, item)))
                .collect(),
        )
    }
}

/// Plain object materialised once through serde
#[derive(Debug, Clone, PartialEq)]
pub struct Serialized {
    value: Value,
}

impl Serialized {
    /// Serialize `object` into a traversable source
    pub fn new<T: Serialize + ?Sized>(object: &T) -> crate::Result<Self> {
        Ok(Self {
            value: serde_json::to_value(object)?,
        })
    }

    /// The materialised value
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl DataSource for Serialized {
    fn child(&self, key: &str) -> Option<Node<'_>> {
        self.value.child(key)
    }

    fn child_keys(&self) -> Option<Vec<String>> {
        self.value.child_keys()
    }

    fn to_value(&self) -> Value {
        self.value.clone()
    }

    fn is_scalar(&self) -> bool {
        DataSource::is_scalar(&self.value)
    }

    fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Inventory {
        items: Vec<(String, Value)>,
    }

    impl KeyedAccess for Inventory {
        fn get_item(&self, key: &str) -> Option<Value> {
            self.items
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }

        fn item_keys(&self) -> Vec<String> {
            self.items.iter().map(|(k, _)| k.clone()).collect()
        }
    }

    #[test]
    fn test_value_children() {
        let data = json!({"a": [10, 20], "b": null});
        let a = data.child("a").unwrap();
        assert_eq!(a.child("1").unwrap().to_value(), json!(20));
        assert!(a.child("01").is_none());
        assert!(data.child("b").unwrap().is_null());
        assert_eq!(data.child_keys().unwrap(), vec!["a", "b"]);
        assert!(json!("x").child_keys().is_none());
    }

    #[test]
    fn test_keyed_adapter() {
        let inventory = Keyed(Inventory {
            items: vec![
                ("apple".to_string(), json!({"qty": 3})),
                ("pear".to_string(), json!({"qty": 0})),
            ],
        });
        let apple = inventory.child("apple").unwrap();
        assert_eq!(apple.child("qty").unwrap().to_value(), json!(3));
        assert_eq!(
            inventory.to_value(),
            json!({"apple": {"qty": 3}, "pear": {"qty": 0}})
        );
    }

    #[test]
    fn test_typed_maps() {
        let mut scores: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        scores.insert("alice".to_string(), vec![1, 2]);
        assert_eq!(
            scores.child("alice").unwrap().child("0").unwrap().to_value(),
            json!(1)
        );
        let missing: Option<Value> = None;
        assert!(missing.is_null());
    }

    #[test]
    fn test_serialized_struct() {
        #[derive(Serialize)]
        struct User {
            name: String,
        }
        let source = Serialized::new(&User {
            name: "Ada".to_string(),
        })
        .unwrap();
        assert_eq!(source.child("name").unwrap().to_value(), json!("Ada"));
    }
}
