//! Two-way mapping between raw models and entity fields.
//!
//! Entity field names may differ from the keys the persistence layer uses;
//! the [`AliasMap`] records both sides. A [`ModelBinder`] holds the current
//! field values plus a snapshot taken at the last full bind, from which the
//! dirty subset is computed.
//!
//! ```rust
//! use kinship_runtime::{model, AliasMap, FieldValue, ModelBinder};
//! use std::sync::Arc;
//!
//! let aliases = Arc::new(AliasMap::new().field("id").field_as("author_id", "authorId"));
//! let mut binder = ModelBinder::new(aliases);
//! binder.from_model(&model! { "id" => 1, "authorId" => 7 });
//!
//! assert_eq!(binder.get("author_id"), Some(&FieldValue::Int(7)));
//! assert!(binder.to_dirty_model().is_empty());
//!
//! binder.set("author_id", 8);
//! assert_eq!(binder.to_dirty_model().get("authorId"), Some(&FieldValue::Int(8)));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::value::{FieldValue, Model};

/// Mapping between entity field names and model keys.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    by_field: IndexMap<&'static str, String>,
    by_key: HashMap<String, &'static str>,
}

impl AliasMap {
    /// Create an empty alias map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field whose model key equals its name.
    pub fn field(self, name: &'static str) -> Self {
        self.field_as(name, name)
    }

    /// Declare a field stored under a different model key.
    pub fn field_as(mut self, name: &'static str, model_key: impl Into<String>) -> Self {
        self.insert(name, model_key);
        self
    }

    /// Declare a field in place. Returns `false` if it was already declared.
    pub fn insert(&mut self, name: &'static str, model_key: impl Into<String>) -> bool {
        if self.by_field.contains_key(name) {
            return false;
        }
        let model_key = model_key.into();
        self.by_key.insert(model_key.clone(), name);
        self.by_field.insert(name, model_key);
        true
    }

    /// Model key for an entity field.
    pub fn model_key(&self, field: &str) -> Option<&str> {
        self.by_field.get(field).map(String::as_str)
    }

    /// Entity field for a model key.
    pub fn field_for(&self, model_key: &str) -> Option<&'static str> {
        self.by_key.get(model_key).copied()
    }

    /// Check if a field is declared.
    pub fn contains(&self, field: &str) -> bool {
        self.by_field.contains_key(field)
    }

    /// Declared field names, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_field.keys().copied()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.by_field.len()
    }

    /// Check if no field is declared.
    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }
}

/// Field values of one entity with dirty tracking.
#[derive(Debug, Clone)]
pub struct ModelBinder {
    aliases: Arc<AliasMap>,
    values: IndexMap<&'static str, FieldValue>,
    original: IndexMap<&'static str, FieldValue>,
}

impl ModelBinder {
    /// Create a binder with every declared field null.
    pub fn new(aliases: Arc<AliasMap>) -> Self {
        let values: IndexMap<_, _> = aliases.fields().map(|f| (f, FieldValue::Null)).collect();
        Self {
            original: values.clone(),
            values,
            aliases,
        }
    }

    /// Full bind: assign every mapped key present in `model`, then snapshot.
    ///
    /// Keys absent from `model` leave their field untouched.
    pub fn from_model(&mut self, model: &Model) {
        self.assign(model);
        self.original = self.values.clone();
    }

    /// Partial bind: assign like [`from_model`](Self::from_model) without
    /// touching the snapshot, so the patched fields show up as dirty.
    pub fn from_partial_model(&mut self, model: &Model) {
        self.assign(model);
    }

    fn assign(&mut self, model: &Model) {
        for (key, value) in model {
            match self.aliases.field_for(key) {
                // Cloning detaches aggregates from the caller's record.
                Some(field) => {
                    self.values.insert(field, value.clone());
                }
                None => tracing::trace!(key = %key, "Ignoring unmapped model key"),
            }
        }
    }

    /// Every declared field, keyed by model key.
    pub fn to_model(&self) -> Model {
        self.values
            .iter()
            .filter_map(|(field, value)| {
                self.aliases
                    .model_key(field)
                    .map(|key| (key.to_string(), value.clone()))
            })
            .collect()
    }

    /// Fields whose value differs from the last full bind, keyed by model key.
    pub fn to_dirty_model(&self) -> Model {
        self.dirty_fields()
            .into_iter()
            .filter_map(|field| {
                let key = self.aliases.model_key(field)?;
                let value = self.values.get(field)?;
                Some((key.to_string(), value.clone()))
            })
            .collect()
    }

    /// Names of fields changed since the last full bind.
    pub fn dirty_fields(&self) -> Vec<&'static str> {
        self.values
            .iter()
            .filter(|(field, value)| self.original.get(*field) != Some(*value))
            .map(|(field, _)| *field)
            .collect()
    }

    /// Check if any field changed since the last full bind.
    pub fn is_dirty(&self) -> bool {
        !self.dirty_fields().is_empty()
    }

    /// Current value of a field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Set a declared field. Returns `false` for undeclared fields.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> bool {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// The alias map this binder uses.
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }
}
