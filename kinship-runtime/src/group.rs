//! Entity groups and entity handles.
//!
//! A [`Group`] is the set of sibling entities built by one factory call. The
//! siblings share the group's schema declaration, context, configuration and
//! lock registry; association loads triggered on any member batch over all
//! members that still need the relation. Entities built by separate factory
//! calls never coalesce loads.
//!
//! Callers hold [`EntityRef`] handles. A handle keeps its whole group alive,
//! and the group is dropped together with its last handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binder::ModelBinder;
use crate::config::KinshipConfig;
use crate::error::{EntityError, EntityResult};
use crate::lock::LockRegistry;
use crate::present::Response;
use crate::schema::{Schema, SchemaDef};
use crate::selection::Selection;
use crate::slot::Slot;
use crate::value::{FieldValue, Model};

/// Options applied to a group at construction.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    config: Arc<KinshipConfig>,
}

impl GroupOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a shared configuration.
    pub fn with_config(mut self, config: impl Into<Arc<KinshipConfig>>) -> Self {
        self.config = config.into();
        self
    }
}

/// One entity's state: bound fields plus association slots.
pub(crate) struct Entity<S: Schema> {
    binder: RwLock<ModelBinder>,
    relations: S::Relations,
}

pub(crate) struct GroupInner<S: Schema> {
    entities: Vec<Entity<S>>,
    schema: SchemaDef<S>,
    context: Arc<S::Context>,
    config: Arc<KinshipConfig>,
    locks: LockRegistry,
}

/// Sibling entities created together.
pub struct Group<S: Schema> {
    inner: Arc<GroupInner<S>>,
}

impl<S: Schema> Group<S> {
    /// Build one entity per model, running the schema's `describe` hook once.
    pub fn new(
        models: &[Model],
        context: Arc<S::Context>,
        options: GroupOptions,
    ) -> EntityResult<Self> {
        let schema = SchemaDef::<S>::build()?;

        let entities = models
            .iter()
            .map(|model| {
                let mut binder = ModelBinder::new(schema.aliases.clone());
                binder.from_model(model);
                Entity {
                    binder: RwLock::new(binder),
                    relations: S::Relations::default(),
                }
            })
            .collect::<Vec<_>>();

        tracing::trace!(entity = S::NAME, size = entities.len(), "Group created");

        Ok(Self {
            inner: Arc::new(GroupInner {
                entities,
                schema,
                context,
                config: options.config,
                locks: LockRegistry::new(),
            }),
        })
    }

    /// Number of entities in the group.
    pub fn len(&self) -> usize {
        self.inner.entities.len()
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entities.is_empty()
    }

    /// Handle to the entity at `index`.
    pub fn get(&self, index: usize) -> Option<EntityRef<S>> {
        (index < self.len()).then(|| EntityRef {
            group: self.inner.clone(),
            index,
        })
    }

    /// Handles to every entity, in model order.
    pub fn members(&self) -> Vec<EntityRef<S>> {
        (0..self.len())
            .map(|index| EntityRef {
                group: self.inner.clone(),
                index,
            })
            .collect()
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<S::Context> {
        &self.inner.context
    }

    /// The group's lock registry.
    pub fn locks(&self) -> &LockRegistry {
        &self.inner.locks
    }

    /// Resolve `relation` for every member that still needs it.
    ///
    /// The batch is driven through the first unresolved member, so members
    /// resolved earlier never short-circuit the load.
    pub async fn load(&self, relation: &str) -> EntityResult<()> {
        let members = self.members();
        let Some(first) = members.first() else {
            return Ok(());
        };
        let association = first
            .schema()
            .association(relation)
            .ok_or_else(|| EntityError::unknown_association(S::NAME, relation))?
            .clone();
        match members.iter().find(|member| !association.is_resolved(member)) {
            Some(pending) => association.load(pending).await,
            None => Ok(()),
        }
    }

    /// Project every member in order.
    pub async fn present(&self, selection: &Selection) -> EntityResult<Vec<Response>> {
        EntityRef::present_many(&self.members(), selection).await
    }
}

impl<S: Schema> Clone for Group<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Schema> fmt::Debug for Group<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("entity", &S::NAME)
            .field("len", &self.len())
            .finish()
    }
}

/// Handle to one entity of a group.
pub struct EntityRef<S: Schema> {
    group: Arc<GroupInner<S>>,
    index: usize,
}

impl<S: Schema> EntityRef<S> {
    fn entity(&self) -> &Entity<S> {
        &self.group.entities[self.index]
    }

    /// Position of this entity within its group.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The group this entity belongs to.
    pub fn group(&self) -> Group<S> {
        Group {
            inner: self.group.clone(),
        }
    }

    /// Every member of this entity's group, this one included.
    pub fn siblings(&self) -> impl Iterator<Item = EntityRef<S>> + '_ {
        (0..self.group.entities.len()).map(|index| EntityRef {
            group: self.group.clone(),
            index,
        })
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<S::Context> {
        &self.group.context
    }

    /// The group's configuration.
    pub fn config(&self) -> &KinshipConfig {
        &self.group.config
    }

    /// Association slots of this entity.
    pub fn relations(&self) -> &S::Relations {
        &self.entity().relations
    }

    pub(crate) fn schema(&self) -> &SchemaDef<S> {
        &self.group.schema
    }

    pub(crate) fn locks(&self) -> &LockRegistry {
        &self.group.locks
    }

    // ============== Fields ==============

    /// Current value of a declared field.
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.entity().binder.read().get(field).cloned()
    }

    /// Set a declared field. Returns `false` for undeclared fields.
    pub fn set(&self, field: &str, value: impl Into<FieldValue>) -> bool {
        self.entity().binder.write().set(field, value)
    }

    /// Full rebind from a model; resets the dirty snapshot.
    pub fn from_model(&self, model: &Model) {
        self.entity().binder.write().from_model(model);
    }

    /// Partial rebind from a model; keeps the dirty snapshot.
    pub fn from_partial_model(&self, model: &Model) {
        self.entity().binder.write().from_partial_model(model);
    }

    /// Every declared field, keyed by model key.
    pub fn to_model(&self) -> Model {
        self.entity().binder.read().to_model()
    }

    /// Fields changed since the last full bind, keyed by model key.
    pub fn to_dirty_model(&self) -> Model {
        self.entity().binder.read().to_dirty_model()
    }

    /// Names of fields changed since the last full bind.
    pub fn dirty_fields(&self) -> Vec<&'static str> {
        self.entity().binder.read().dirty_fields()
    }

    // ============== Associations ==============

    /// Resolve an association by name, batching over the group.
    pub async fn load(&self, relation: &str) -> EntityResult<()> {
        let association = self
            .schema()
            .association(relation)
            .ok_or_else(|| EntityError::unknown_association(S::NAME, relation))?
            .clone();
        association.load(self).await
    }

    /// Resolve an association and return its value.
    ///
    /// Calling this again on a resolved entity returns the cached value without
    /// touching the loader.
    pub async fn association<V: Clone>(
        &self,
        relation: &str,
        slot: fn(&S::Relations) -> &Slot<V>,
    ) -> EntityResult<V> {
        if let Some(value) = slot(self.relations()).get() {
            return Ok(value);
        }
        self.load(relation).await?;
        slot(self.relations())
            .get()
            .ok_or_else(|| EntityError::unresolved(S::NAME, relation))
    }
}

impl<S: Schema> Clone for EntityRef<S> {
    fn clone(&self) -> Self {
        Self {
            group: self.group.clone(),
            index: self.index,
        }
    }
}

impl<S: Schema> PartialEq for EntityRef<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.group, &other.group) && self.index == other.index
    }
}

impl<S: Schema> Eq for EntityRef<S> {}

impl<S: Schema> fmt::Debug for EntityRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(S::NAME)
            .field("index", &self.index)
            .field("fields", &self.to_model())
            .finish()
    }
}
