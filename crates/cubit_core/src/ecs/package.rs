//! # Entity Packages
//!
//! A [`Package`] is the structured, format-agnostic value an entity's whole
//! component set is packed into. Components are keyed by
//! [`Component::NAME`](super::Component::NAME); values are `serde_json::Value`
//! trees. The package itself is `Serialize + Deserialize`, so persistence code
//! can write it in whatever serde format it likes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Packed components of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Package {
    components: BTreeMap<String, Value>,
}

impl Package {
    /// Creates an empty package.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the value of a component, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.components.insert(name.into(), value)
    }

    /// Value packed under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.components.get(name)
    }

    /// Removes the value packed under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.components.remove(name)
    }

    /// Whether a value is packed under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Packed component names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Iterates over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.components.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of packed components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the package holds no component.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
