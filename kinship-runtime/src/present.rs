//! Field projection.
//!
//! [`EntityRef::present`] builds a [`Response`] holding exactly the keys named
//! by a [`Selection`]. Unselected keys are absent from the response rather
//! than null, and unselected associations are never loaded.
//!
//! Each declared field is projected according to how it was registered:
//!
//! - primitive fields are copied from the bound model
//! - computed fields are called, async ones awaited
//! - associations are resolved through their batched loader if needed, then
//!   projected recursively with the nested selection
//!
//! Lists are projected element by element in order, and a resolved `None`
//! projects to `null` without touching the related entity.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use crate::error::{EntityError, EntityResult};
use crate::group::EntityRef;
use crate::schema::{FieldStrategy, Schema};
use crate::selection::{Selected, Selection};
use crate::value::FieldValue;

/// A projected value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseValue {
    /// A nullable association resolved to nothing.
    Null,
    /// A primitive or computed field.
    Field(FieldValue),
    /// A projected related entity.
    Object(Response),
    /// A projected list of related entities.
    List(Vec<ResponseValue>),
}

impl ResponseValue {
    /// Check if this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the field value, if this is a field.
    pub fn as_field(&self) -> Option<&FieldValue> {
        match self {
            Self::Field(value) => Some(value),
            _ => None,
        }
    }

    /// Get the nested response, if this is an object.
    pub fn as_object(&self) -> Option<&Response> {
        match self {
            Self::Object(response) => Some(response),
            _ => None,
        }
    }

    /// Get the elements, if this is a list.
    pub fn as_list(&self) -> Option<&[ResponseValue]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<FieldValue> for ResponseValue {
    fn from(value: FieldValue) -> Self {
        Self::Field(value)
    }
}

impl From<Response> for ResponseValue {
    fn from(response: Response) -> Self {
        Self::Object(response)
    }
}

/// The projection of one entity, keys in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Response {
    fields: IndexMap<String, ResponseValue>,
}

impl Response {
    /// Create an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ResponseValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Shorthand for reading a projected field value.
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).and_then(ResponseValue::as_field)
    }

    /// Keys in projection order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Consume into the underlying map.
    pub fn into_inner(self) -> IndexMap<String, ResponseValue> {
        self.fields
    }
}

impl Deref for Response {
    type Target = IndexMap<String, ResponseValue>;

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.fields
    }
}

/// A value an association can resolve to.
#[async_trait]
pub trait Projectable: Send + Sync {
    /// Project with a nested selection.
    async fn project(&self, selection: &Selection) -> EntityResult<ResponseValue>;
}

#[async_trait]
impl<S: Schema> Projectable for EntityRef<S> {
    async fn project(&self, selection: &Selection) -> EntityResult<ResponseValue> {
        Ok(ResponseValue::Object(self.present(selection).await?))
    }
}

#[async_trait]
impl<P: Projectable> Projectable for Option<P> {
    async fn project(&self, selection: &Selection) -> EntityResult<ResponseValue> {
        match self {
            Some(value) => value.project(selection).await,
            None => Ok(ResponseValue::Null),
        }
    }
}

#[async_trait]
impl<P: Projectable> Projectable for Vec<P> {
    async fn project(&self, selection: &Selection) -> EntityResult<ResponseValue> {
        let mut values = Vec::with_capacity(self.len());
        for value in self {
            values.push(value.project(selection).await?);
        }
        Ok(ResponseValue::List(values))
    }
}

#[async_trait]
impl Projectable for FieldValue {
    async fn project(&self, _selection: &Selection) -> EntityResult<ResponseValue> {
        Ok(ResponseValue::Field(self.clone()))
    }
}

impl<S: Schema> EntityRef<S> {
    /// Project this entity.
    ///
    /// Runs the `before_present` hook, then each selected field, then the
    /// `after_present` hook on the finished response.
    pub async fn present(&self, selection: &Selection) -> EntityResult<Response> {
        let schema = self.schema();

        if let Some(before) = &schema.before {
            before(self.clone(), selection.clone()).await?;
        }

        let mut response = Response::new();

        if selection.is_all() {
            for (&name, strategy) in &schema.fields {
                if matches!(strategy, FieldStrategy::Primitive) {
                    response.insert(name, self.get(name).unwrap_or_default());
                }
            }
        }

        for (name, selected) in selection.iter() {
            let Some(strategy) = schema.fields.get(name) else {
                if self.config().presentation.strict_selection {
                    return Err(EntityError::unknown_field(S::NAME, name));
                }
                trace!(entity = S::NAME, field = name, "Skipping undeclared field");
                continue;
            };

            let value = match strategy {
                FieldStrategy::Primitive => {
                    leaf_only::<S>(name, selected)?;
                    ResponseValue::Field(self.get(name).unwrap_or_default())
                }
                FieldStrategy::Computed(compute) => {
                    leaf_only::<S>(name, selected)?;
                    ResponseValue::Field(compute(self))
                }
                FieldStrategy::ComputedAsync(compute) => {
                    leaf_only::<S>(name, selected)?;
                    let value = compute(self.clone())
                        .await
                        .map_err(|source| EntityError::computed_failed(S::NAME, name, source))?;
                    ResponseValue::Field(value)
                }
                FieldStrategy::Unimplemented => {
                    return Err(EntityError::not_implemented(S::NAME, name));
                }
                FieldStrategy::Association(association) => {
                    association.present(self, &selected.nested()).await?
                }
            };
            response.insert(name, value);
        }

        if let Some(after) = &schema.after {
            response = after(self.clone(), response).await?;
        }

        Ok(response)
    }

    /// Project several entities one at a time, in input order.
    ///
    /// Sequential projection keeps association loads coalesced: the first
    /// entity's load resolves the relation for all of its siblings.
    pub async fn present_many(entities: &[Self], selection: &Selection) -> EntityResult<Vec<Response>> {
        let mut responses = Vec::with_capacity(entities.len());
        for entity in entities {
            responses.push(entity.present(selection).await?);
        }
        Ok(responses)
    }
}

/// Project several entities one at a time, in input order.
pub async fn present_many<S: Schema>(
    entities: &[EntityRef<S>],
    selection: &Selection,
) -> EntityResult<Vec<Response>> {
    EntityRef::present_many(entities, selection).await
}

fn leaf_only<S: Schema>(name: &str, selected: &Selected) -> EntityResult<()> {
    match selected {
        Selected::Field => Ok(()),
        Selected::Nested(_) => Err(EntityError::invalid_selection(
            S::NAME,
            name,
            "nested selection on a non-association field",
        )),
    }
}
