//! Association load descriptors.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::error::{BoxError, EntityError, EntityResult};
use crate::group::EntityRef;
use crate::schema::Schema;
use crate::slot::Slot;

/// How many related entities one source resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Multiplicity {
    /// Exactly one related entity; a missing one is an error.
    One,
    /// At most one related entity; a missing one resolves to `None`.
    Optional,
    /// Any number of related entities; none resolves to an empty list.
    Many,
}

impl Multiplicity {
    /// Check if this relation resolves to a list.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many)
    }

    /// Check if a missing related entity is acceptable.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Optional)
    }
}

pub(crate) type FilterFn<S> = Arc<dyn Fn(&EntityRef<S>) -> bool + Send + Sync>;

pub(crate) type GetterFn<S, K> = Arc<dyn Fn(&EntityRef<S>) -> Option<K> + Send + Sync>;

pub(crate) type RelatedKeyFn<K, R> = Arc<dyn Fn(&R) -> Option<K> + Send + Sync>;

pub(crate) type LoaderFn<C, K, R> =
    Arc<dyn Fn(Arc<C>, Vec<K>) -> BoxFuture<'static, Result<Vec<R>, BoxError>> + Send + Sync>;

/// Resolves one source's slot value from its key and the loaded batch.
///
/// Returning `None` means a required related entity is missing.
pub type SetterFn<K, R, V> = Arc<dyn Fn(Option<&K>, &RelatedIndex<K, R>) -> Option<V> + Send + Sync>;

/// Loaded related entities indexed by key.
///
/// Built with the descriptor's `related_key`, so the keys match those the
/// getter derives from sources. Entities sharing a key stay in load order.
pub struct RelatedIndex<K, R> {
    loaded: Vec<R>,
    by_key: IndexMap<K, Vec<usize>>,
}

impl<K: Eq + Hash, R> RelatedIndex<K, R> {
    pub(crate) fn build(loaded: Vec<R>, related_key: Option<&RelatedKeyFn<K, R>>) -> Self {
        let mut by_key: IndexMap<K, Vec<usize>> = IndexMap::new();
        if let Some(related_key) = related_key {
            for (position, entity) in loaded.iter().enumerate() {
                if let Some(key) = related_key(entity) {
                    by_key.entry(key).or_default().push(position);
                }
            }
        }
        Self { loaded, by_key }
    }

    /// The single related entity for `key`. When several share the key, the
    /// last loaded one wins.
    pub fn one(&self, key: &K) -> Option<&R> {
        self.by_key
            .get(key)
            .and_then(|positions| positions.last())
            .map(|&position| &self.loaded[position])
    }

    /// Every related entity for `key`, in load order.
    pub fn many(&self, key: &K) -> impl Iterator<Item = &R> {
        self.by_key
            .get(key)
            .into_iter()
            .flatten()
            .map(|&position| &self.loaded[position])
    }

    /// Everything the loader returned, in load order.
    pub fn loaded(&self) -> &[R] {
        &self.loaded
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.by_key.len()
    }
}

/// Specification driving the batched resolution of one association.
///
/// Constructors install a default filter (entity's slot is unresolved) and a
/// default setter matching the multiplicity. The getter, loader and
/// `related_key` are completed inside [`Schema::describe`]; a load with any
/// of them missing fails with a configuration error.
pub struct LoadDescriptor<S: Schema, K, R, V> {
    pub(crate) name: &'static str,
    pub(crate) multiplicity: Multiplicity,
    pub(crate) slot: fn(&S::Relations) -> &Slot<V>,
    pub(crate) filter: FilterFn<S>,
    pub(crate) getter: Option<GetterFn<S, K>>,
    pub(crate) related_key: Option<RelatedKeyFn<K, R>>,
    pub(crate) loader: Option<LoaderFn<S::Context, K, R>>,
    pub(crate) setter: SetterFn<K, R, V>,
    pub(crate) custom_setter: bool,
}

impl<S: Schema, K, R, V> LoadDescriptor<S, K, R, V>
where
    V: 'static,
{
    fn with_setter(
        name: &'static str,
        multiplicity: Multiplicity,
        slot: fn(&S::Relations) -> &Slot<V>,
        setter: SetterFn<K, R, V>,
    ) -> Self {
        Self {
            name,
            multiplicity,
            slot,
            filter: Arc::new(move |entity: &EntityRef<S>| !slot(entity.relations()).is_resolved()),
            getter: None,
            related_key: None,
            loader: None,
            setter,
            custom_setter: false,
        }
    }

    /// The relation name, also the lock key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The relation's multiplicity.
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    /// Replace the filter selecting siblings that still need resolution.
    ///
    /// The filter must reject entities whose slot is already resolved, or
    /// waiting callers will fetch again.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&EntityRef<S>) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Set how a source entity derives its load key.
    pub fn getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&EntityRef<S>) -> Option<K> + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Set how a loaded entity derives its key. Used by the default setter.
    pub fn related_key<F>(mut self, related_key: F) -> Self
    where
        F: Fn(&R) -> Option<K> + Send + Sync + 'static,
    {
        self.related_key = Some(Arc::new(related_key));
        self
    }

    /// Set the batch fetch.
    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(Arc<S::Context>, Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, BoxError>> + Send + 'static,
    {
        self.loader = Some(Arc::new(
            move |context: Arc<S::Context>, keys: Vec<K>| -> BoxFuture<'static, Result<Vec<R>, BoxError>> {
                Box::pin(loader(context, keys))
            },
        ));
        self
    }

    /// Replace the default setter.
    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(Option<&K>, &RelatedIndex<K, R>) -> Option<V> + Send + Sync + 'static,
    {
        self.setter = Arc::new(setter);
        self.custom_setter = true;
        self
    }

    /// Check the descriptor is complete, returning its getter and loader.
    pub(crate) fn validate(&self) -> EntityResult<(&GetterFn<S, K>, &LoaderFn<S::Context, K, R>)> {
        let getter = self
            .getter
            .as_ref()
            .ok_or_else(|| EntityError::missing_getter(S::NAME, self.name))?;
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| EntityError::missing_loader(S::NAME, self.name))?;
        if !self.custom_setter && self.related_key.is_none() {
            return Err(EntityError::missing_setter(S::NAME, self.name));
        }
        Ok((getter, loader))
    }
}

impl<S: Schema, K, R> LoadDescriptor<S, K, R, R>
where
    K: Eq + Hash + 'static,
    R: Clone + 'static,
{
    /// A required single association.
    pub fn one(name: &'static str, slot: fn(&S::Relations) -> &Slot<R>) -> Self {
        let setter: SetterFn<K, R, R> =
            Arc::new(|key, index| key.and_then(|key| index.one_cloned(key)));
        Self::with_setter(name, Multiplicity::One, slot, setter)
    }
}

impl<S: Schema, K, R> LoadDescriptor<S, K, R, Option<R>>
where
    K: Eq + Hash + 'static,
    R: Clone + 'static,
{
    /// A nullable single association.
    pub fn optional(name: &'static str, slot: fn(&S::Relations) -> &Slot<Option<R>>) -> Self {
        let setter: SetterFn<K, R, Option<R>> =
            Arc::new(|key, index| Some(key.and_then(|key| index.one_cloned(key))));
        Self::with_setter(name, Multiplicity::Optional, slot, setter)
    }
}

impl<S: Schema, K, R> LoadDescriptor<S, K, R, Vec<R>>
where
    K: Eq + Hash + 'static,
    R: Clone + 'static,
{
    /// A plural association.
    pub fn many(name: &'static str, slot: fn(&S::Relations) -> &Slot<Vec<R>>) -> Self {
        let setter: SetterFn<K, R, Vec<R>> =
            Arc::new(|key, index| Some(key.map(|key| index.many_cloned(key)).unwrap_or_default()));
        Self::with_setter(name, Multiplicity::Many, slot, setter)
    }
}

impl<K, R: Clone> RelatedIndex<K, R>
where
    K: Eq + Hash,
{
    fn one_cloned(&self, key: &K) -> Option<R> {
        self.one(key).cloned()
    }

    fn many_cloned(&self, key: &K) -> Vec<R> {
        self.many(key).cloned().collect()
    }
}

impl<S: Schema, K, R, V> fmt::Debug for LoadDescriptor<S, K, R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadDescriptor")
            .field("entity", &S::NAME)
            .field("name", &self.name)
            .field("multiplicity", &self.multiplicity)
            .field("getter", &self.getter.is_some())
            .field("loader", &self.loader.is_some())
            .field("related_key", &self.related_key.is_some())
            .field("custom_setter", &self.custom_setter)
            .finish()
    }
}
