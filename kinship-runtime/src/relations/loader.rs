//! Batch resolution of one association across a group.
//!
//! The relation's lock is held from the sibling filter until every slot of
//! the batch is written, so a caller that waited on the lock observes either
//! its own slot resolved, or the failure of the batch it queued behind.

use std::hash::Hash;
use std::time::Instant;

use async_trait::async_trait;
use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use super::Association;
use super::descriptor::{LoadDescriptor, Multiplicity, RelatedIndex};
use crate::error::{EntityError, EntityResult};
use crate::group::EntityRef;
use crate::present::{Projectable, ResponseValue};
use crate::schema::Schema;
use crate::selection::Selection;

impl<S, K, R, V> LoadDescriptor<S, K, R, V>
where
    S: Schema,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn resolve(&self, entity: &EntityRef<S>) -> EntityResult<()> {
        let slot = self.slot;
        if slot(entity.relations()).is_resolved() {
            trace!(entity = S::NAME, relation = self.name, "Association cached");
            return Ok(());
        }

        let (getter, loader) = self.validate()?;

        let lock = entity.locks().get(self.name);
        let ticket = lock.ticket();
        let mut guard = lock.acquire().await;

        if slot(entity.relations()).is_resolved() {
            trace!(
                entity = S::NAME,
                relation = self.name,
                "Association resolved by a concurrent batch"
            );
            return Ok(());
        }
        if let Some(err) = guard.failure_since(ticket) {
            trace!(
                entity = S::NAME,
                relation = self.name,
                "Sharing failure of the batch this caller waited on"
            );
            return Err(err.clone());
        }

        let pending: Vec<EntityRef<S>> = entity
            .siblings()
            .filter(|sibling| (self.filter)(sibling))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let source_keys: Vec<Option<K>> = pending.iter().map(|sibling| getter(sibling)).collect();
        let keys: IndexSet<K> = source_keys.iter().flatten().cloned().collect();

        let loaded = if keys.is_empty() {
            trace!(
                entity = S::NAME,
                relation = self.name,
                pending = pending.len(),
                "No keys to load"
            );
            Vec::new()
        } else {
            let key_count = keys.len();
            let started = Instant::now();
            let result = loader(entity.context().clone(), keys.into_iter().collect()).await;
            let elapsed = started.elapsed();

            let config = entity.config();
            if let Some(threshold) = config.loading.slow_load_threshold() {
                if elapsed > threshold {
                    warn!(
                        entity = S::NAME,
                        relation = self.name,
                        keys = key_count,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Slow association load"
                    );
                }
            }

            match result {
                Ok(loaded) => {
                    if config.debug.log_loads {
                        debug!(
                            entity = S::NAME,
                            relation = self.name,
                            keys = key_count,
                            loaded = loaded.len(),
                            elapsed_us = elapsed.as_micros() as u64,
                            "Association batch loaded"
                        );
                    }
                    loaded
                }
                Err(source) => {
                    let err = EntityError::loader_failed(S::NAME, self.name, source);
                    warn!(
                        entity = S::NAME,
                        relation = self.name,
                        keys = key_count,
                        error = %err,
                        "Association load failed"
                    );
                    guard.failed(err.clone());
                    return Err(err);
                }
            }
        };

        let index = RelatedIndex::build(loaded, self.related_key.as_ref());

        // Nothing is written until every source has a value.
        let mut values = Vec::with_capacity(pending.len());
        for key in &source_keys {
            match (self.setter)(key.as_ref(), &index) {
                Some(value) => values.push(value),
                None => {
                    let err = EntityError::related_not_found(S::NAME, self.name);
                    guard.failed(err.clone());
                    return Err(err);
                }
            }
        }

        for (sibling, value) in pending.iter().zip(values) {
            slot(sibling.relations()).set(value);
        }
        guard.succeeded();

        crate::kinship_debug!(
            entity = S::NAME,
            relation = self.name,
            resolved = pending.len(),
            "Association resolved"
        );
        Ok(())
    }
}

#[async_trait]
impl<S, K, R, V> Association<S> for LoadDescriptor<S, K, R, V>
where
    S: Schema,
    K: Clone + Eq + Hash + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    V: Projectable + Clone + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    fn is_resolved(&self, entity: &EntityRef<S>) -> bool {
        (self.slot)(entity.relations()).is_resolved()
    }

    async fn load(&self, entity: &EntityRef<S>) -> EntityResult<()> {
        self.resolve(entity).await
    }

    async fn present(
        &self,
        entity: &EntityRef<S>,
        selection: &Selection,
    ) -> EntityResult<ResponseValue> {
        let slot = self.slot;
        let value = match slot(entity.relations()).get() {
            Some(value) => value,
            None => {
                self.resolve(entity).await?;
                slot(entity.relations())
                    .get()
                    .ok_or_else(|| EntityError::unresolved(S::NAME, self.name))?
            }
        };
        value.project(selection).await
    }
}
