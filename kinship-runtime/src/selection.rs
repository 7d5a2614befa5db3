//! Selection trees describing which fields to project.
//!
//! A [`Selection`] lists field names, each either selected as a leaf or with a
//! nested selection for an association. Keys that are absent are not
//! projected at all.
//!
//! ```rust
//! use kinship_runtime::Selection;
//!
//! let by_builder = Selection::new()
//!     .field("id")
//!     .relation("comments", Selection::only(["body"]));
//!
//! let by_json = Selection::from_json(&serde_json::json!({
//!     "id": true,
//!     "draft": null,
//!     "comments": { "body": true },
//! })).unwrap();
//!
//! assert_eq!(by_builder, by_json);
//! assert!(!by_json.contains("draft"));
//! ```

use indexmap::IndexMap;

use crate::error::{EntityError, EntityResult};

/// How a single key is selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Selected {
    /// Select the field as is. For associations, every primitive field of
    /// the related entity is projected.
    Field,
    /// Select an association with a nested selection.
    Nested(Selection),
}

/// Specification for which fields to project from an entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    all_fields: bool,
    fields: IndexMap<String, Selected>,
}

impl Selection {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select every primitive field. Computed fields and associations still
    /// have to be named.
    pub fn all() -> Self {
        Self {
            all_fields: true,
            fields: IndexMap::new(),
        }
    }

    /// Select only the given leaf fields.
    pub fn only(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new().fields(fields)
    }

    /// Add a leaf field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Selected::Field);
        self
    }

    /// Add multiple leaf fields.
    pub fn fields(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self = self.field(name);
        }
        self
    }

    /// Add an association with a nested selection.
    pub fn relation(mut self, name: impl Into<String>, selection: Selection) -> Self {
        self.fields.insert(name.into(), Selected::Nested(selection));
        self
    }

    /// Drop a key from the selection.
    pub fn without(mut self, name: &str) -> Self {
        self.fields.shift_remove(name);
        self
    }

    /// Parse `{ "a": true, "rel": { "x": true } }`.
    ///
    /// Any boolean selects the key as a leaf, since the key is present. Only
    /// `null` entries are treated as absent; any other non-object value is
    /// rejected.
    pub fn from_json(value: &serde_json::Value) -> EntityResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(EntityError::invalid_selection(
                "selection",
                "<root>",
                "expected an object",
            ));
        };

        let mut selection = Self::new();
        for (key, entry) in map {
            match entry {
                serde_json::Value::Bool(_) => {
                    selection.fields.insert(key.clone(), Selected::Field);
                }
                serde_json::Value::Null => {}
                serde_json::Value::Object(_) => {
                    selection
                        .fields
                        .insert(key.clone(), Selected::Nested(Self::from_json(entry)?));
                }
                other => {
                    return Err(EntityError::invalid_selection(
                        "selection",
                        key.as_str(),
                        format!("expected true, false, null or an object, found {}", other),
                    ));
                }
            }
        }
        Ok(selection)
    }

    /// Check if a key is selected explicitly.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get how a key is selected.
    pub fn get(&self, name: &str) -> Option<&Selected> {
        self.fields.get(name)
    }

    /// Check if every primitive field is selected.
    pub fn is_all(&self) -> bool {
        self.all_fields
    }

    /// Explicitly selected keys, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selected)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of explicitly selected keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        !self.all_fields && self.fields.is_empty()
    }
}

impl Selected {
    /// The selection to apply to a related entity.
    pub fn nested(&self) -> Selection {
        match self {
            Self::Field => Selection::all(),
            Self::Nested(selection) => selection.clone(),
        }
    }
}
