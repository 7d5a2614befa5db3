//! Entity schema declaration.
//!
//! Generated code describes each entity kind with a [`Schema`] implementation:
//! a zero-sized marker type naming the request context, a struct of typed
//! [`Slot`](crate::Slot)s for its associations, and one `describe` hook that
//! registers fields, computed fields, association descriptors and present
//! hooks. `describe` runs exactly once per group, before any entity of that
//! group is used.
//!
//! ## Example
//!
//! ```rust,ignore
//! struct Post;
//!
//! #[derive(Default)]
//! struct PostRelations {
//!     author: Slot<EntityRef<User>>,
//! }
//!
//! impl Schema for Post {
//!     const NAME: &'static str = "Post";
//!     type Context = Db;
//!     type Relations = PostRelations;
//!
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema.field("id").field_as("author_id", "authorId").field("title");
//!         schema.computed("shout", |post| {
//!             post.get("title").and_then(|t| t.as_str().map(str::to_uppercase))
//!         });
//!         let author = schema
//!             .has_one("author", |r| &r.author)
//!             .getter(|post| post.get("author_id")?.as_int())
//!             .related_key(|user: &EntityRef<User>| user.get("id")?.as_int())
//!             .loader(load_users);
//!         schema.association(author);
//!     }
//! }
//!
//! let posts = Post::from_array(&models, db)?;
//! let author = posts[0].association("author", |r| &r.author).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::binder::AliasMap;
use crate::error::{BoxError, EntityError, EntityResult};
use crate::group::{EntityRef, Group, GroupOptions};
use crate::present::{Projectable, Response};
use crate::relations::{Association, LoadDescriptor};
use crate::selection::Selection;
use crate::slot::Slot;
use crate::value::{FieldValue, Model};

/// Declaration of one entity kind.
pub trait Schema: Sized + Send + Sync + 'static {
    /// Entity name used in errors and logs.
    const NAME: &'static str;

    /// Opaque value shared by every entity of a group (request-scoped resources).
    type Context: Send + Sync + 'static;

    /// Association slots of one entity.
    type Relations: Default + Send + Sync + 'static;

    /// Register fields, associations and hooks.
    fn describe(schema: &mut SchemaBuilder<Self>);

    /// Build one entity. Equivalent to `from_array(&[model], context)[0]`.
    fn from_one(model: &Model, context: Arc<Self::Context>) -> EntityResult<EntityRef<Self>> {
        Self::from_array(std::slice::from_ref(model), context)?
            .pop()
            .ok_or_else(|| EntityError::invalid_configuration("factory produced no entity"))
    }

    /// Build sibling entities sharing one lock registry and one sibling array.
    ///
    /// Only entities created by the same call batch their association loads.
    fn from_array(
        models: &[Model],
        context: Arc<Self::Context>,
    ) -> EntityResult<Vec<EntityRef<Self>>> {
        Self::from_array_with(models, context, GroupOptions::default())
    }

    /// Like [`from_array`](Self::from_array) with explicit group options.
    fn from_array_with(
        models: &[Model],
        context: Arc<Self::Context>,
        options: GroupOptions,
    ) -> EntityResult<Vec<EntityRef<Self>>> {
        Ok(Group::new(models, context, options)?.members())
    }
}

pub(crate) type ComputedFn<S> = Arc<dyn Fn(&EntityRef<S>) -> FieldValue + Send + Sync>;

pub(crate) type AsyncComputedFn<S> =
    Arc<dyn Fn(EntityRef<S>) -> BoxFuture<'static, Result<FieldValue, BoxError>> + Send + Sync>;

pub(crate) type BeforeHook<S> =
    Arc<dyn Fn(EntityRef<S>, Selection) -> BoxFuture<'static, EntityResult<()>> + Send + Sync>;

pub(crate) type AfterHook<S> =
    Arc<dyn Fn(EntityRef<S>, Response) -> BoxFuture<'static, EntityResult<Response>> + Send + Sync>;

/// How a declared field is produced during projection.
pub(crate) enum FieldStrategy<S: Schema> {
    /// Copied from the bound model.
    Primitive,
    /// Zero-argument synchronous computation.
    Computed(ComputedFn<S>),
    /// Awaited computation.
    ComputedAsync(AsyncComputedFn<S>),
    /// Declared by generated code without an implementation.
    Unimplemented,
    /// Resolved through a batched association load.
    Association(Arc<dyn Association<S>>),
}

/// Collects the declarations made by [`Schema::describe`].
pub struct SchemaBuilder<S: Schema> {
    aliases: AliasMap,
    fields: IndexMap<&'static str, FieldStrategy<S>>,
    before: Option<BeforeHook<S>>,
    after: Option<AfterHook<S>>,
    error: Option<EntityError>,
}

impl<S: Schema> SchemaBuilder<S> {
    pub(crate) fn new() -> Self {
        Self {
            aliases: AliasMap::new(),
            fields: IndexMap::new(),
            before: None,
            after: None,
            error: None,
        }
    }

    fn declare(&mut self, name: &'static str, strategy: FieldStrategy<S>) -> &mut Self {
        if self.fields.contains_key(name) && self.error.is_none() {
            self.error = Some(EntityError::duplicate_field(S::NAME, name));
            return self;
        }
        self.fields.insert(name, strategy);
        self
    }

    /// Declare a primitive field stored under the same model key.
    pub fn field(&mut self, name: &'static str) -> &mut Self {
        self.field_as(name, name)
    }

    /// Declare a primitive field stored under a different model key.
    pub fn field_as(&mut self, name: &'static str, model_key: &str) -> &mut Self {
        if self.fields.contains_key(name) {
            return self.declare(name, FieldStrategy::Primitive);
        }
        self.aliases.insert(name, model_key);
        self.declare(name, FieldStrategy::Primitive)
    }

    /// Declare a computed field whose implementation is supplied later.
    ///
    /// Projecting it before [`computed`](Self::computed) or
    /// [`computed_async`](Self::computed_async) replaces the stub fails with
    /// a not implemented error.
    pub fn declare_computed(&mut self, name: &'static str) -> &mut Self {
        self.declare(name, FieldStrategy::Unimplemented)
    }

    /// Register a synchronous computed field.
    pub fn computed<F, V>(&mut self, name: &'static str, compute: F) -> &mut Self
    where
        F: Fn(&EntityRef<S>) -> V + Send + Sync + 'static,
        V: Into<FieldValue>,
    {
        let compute: ComputedFn<S> =
            Arc::new(move |entity: &EntityRef<S>| -> FieldValue { compute(entity).into() });
        let strategy = FieldStrategy::Computed(compute);
        self.implement(name, strategy)
    }

    /// Register an asynchronous computed field.
    pub fn computed_async<F, Fut>(&mut self, name: &'static str, compute: F) -> &mut Self
    where
        F: Fn(EntityRef<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FieldValue, BoxError>> + Send + 'static,
    {
        let compute: AsyncComputedFn<S> = Arc::new(
            move |entity: EntityRef<S>| -> BoxFuture<'static, Result<FieldValue, BoxError>> {
                Box::pin(compute(entity))
            },
        );
        let strategy = FieldStrategy::ComputedAsync(compute);
        self.implement(name, strategy)
    }

    fn implement(&mut self, name: &'static str, strategy: FieldStrategy<S>) -> &mut Self {
        if let Some(existing) = self.fields.get_mut(name) {
            if matches!(existing, FieldStrategy::Unimplemented) {
                *existing = strategy;
                return self;
            }
        }
        self.declare(name, strategy)
    }

    /// Start a required single association resolved into `slot`.
    pub fn has_one<K, R>(
        &self,
        name: &'static str,
        slot: fn(&S::Relations) -> &Slot<R>,
    ) -> LoadDescriptor<S, K, R, R>
    where
        K: Eq + std::hash::Hash + 'static,
        R: Clone + Send + Sync + 'static,
    {
        LoadDescriptor::one(name, slot)
    }

    /// Start a nullable single association resolved into `slot`.
    pub fn has_optional<K, R>(
        &self,
        name: &'static str,
        slot: fn(&S::Relations) -> &Slot<Option<R>>,
    ) -> LoadDescriptor<S, K, R, Option<R>>
    where
        K: Eq + std::hash::Hash + 'static,
        R: Clone + Send + Sync + 'static,
    {
        LoadDescriptor::optional(name, slot)
    }

    /// Start a plural association resolved into `slot`.
    pub fn has_many<K, R>(
        &self,
        name: &'static str,
        slot: fn(&S::Relations) -> &Slot<Vec<R>>,
    ) -> LoadDescriptor<S, K, R, Vec<R>>
    where
        K: Eq + std::hash::Hash + 'static,
        R: Clone + Send + Sync + 'static,
    {
        LoadDescriptor::many(name, slot)
    }

    /// Register an association. Its name becomes a selectable field.
    pub fn association<K, R, V>(&mut self, descriptor: LoadDescriptor<S, K, R, V>) -> &mut Self
    where
        K: Clone + Eq + std::hash::Hash + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        V: Projectable + Clone + 'static,
    {
        let name = descriptor.name();
        self.declare(name, FieldStrategy::Association(Arc::new(descriptor)))
    }

    /// Run `hook` before every projection of this entity kind.
    pub fn before_present<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(EntityRef<S>, Selection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EntityResult<()>> + Send + 'static,
    {
        let hook: BeforeHook<S> = Arc::new(
            move |entity: EntityRef<S>, selection: Selection| -> BoxFuture<'static, EntityResult<()>> {
                Box::pin(hook(entity, selection))
            },
        );
        self.before = Some(hook);
        self
    }

    /// Run `hook` on every projected response of this entity kind.
    pub fn after_present<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(EntityRef<S>, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EntityResult<Response>> + Send + 'static,
    {
        let hook: AfterHook<S> = Arc::new(
            move |entity: EntityRef<S>, response: Response| -> BoxFuture<'static, EntityResult<Response>> {
                Box::pin(hook(entity, response))
            },
        );
        self.after = Some(hook);
        self
    }

    pub(crate) fn finish(self) -> EntityResult<SchemaDef<S>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        tracing::trace!(
            entity = S::NAME,
            fields = self.fields.len(),
            "Schema described"
        );
        Ok(SchemaDef {
            aliases: Arc::new(self.aliases),
            fields: self.fields,
            before: self.before,
            after: self.after,
        })
    }
}

/// The finished declaration shared by every entity of a group.
pub(crate) struct SchemaDef<S: Schema> {
    pub(crate) aliases: Arc<AliasMap>,
    pub(crate) fields: IndexMap<&'static str, FieldStrategy<S>>,
    pub(crate) before: Option<BeforeHook<S>>,
    pub(crate) after: Option<AfterHook<S>>,
}

impl<S: Schema> SchemaDef<S> {
    /// Run the schema's `describe` hook and seal the result.
    pub(crate) fn build() -> EntityResult<Self> {
        let mut builder = SchemaBuilder::new();
        S::describe(&mut builder);
        builder.finish()
    }

    pub(crate) fn association(&self, name: &str) -> Option<&Arc<dyn Association<S>>> {
        match self.fields.get(name) {
            Some(FieldStrategy::Association(association)) => Some(association),
            _ => None,
        }
    }
}
