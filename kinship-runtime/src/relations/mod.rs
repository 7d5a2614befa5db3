//! Batched association loading.
//!
//! An association is described by a [`LoadDescriptor`]: how a source entity
//! derives its key (getter), how related entities are fetched for a batch of
//! keys (loader), and how each source's slot is filled from the batch
//! (setter). Loading a relation on any entity resolves it for every sibling
//! that still needs it, with one loader call per batch.
//!
//! ## Example
//!
//! ```rust,ignore
//! let comments = schema
//!     .has_many("comments", |r| &r.comments)
//!     .getter(|post| post.get("id")?.as_int())
//!     .related_key(|comment: &EntityRef<Comment>| comment.get("post_id")?.as_int())
//!     .loader(|db: Arc<Db>, post_ids: Vec<i64>| async move {
//!         db.comments_for(&post_ids).await
//!     });
//! schema.association(comments);
//!
//! // One loader call covers every post of the group.
//! let first = posts[0].association("comments", |r| &r.comments).await?;
//! ```

mod descriptor;
mod loader;

use async_trait::async_trait;

use crate::error::EntityResult;
use crate::group::EntityRef;
use crate::present::ResponseValue;
use crate::schema::Schema;
use crate::selection::Selection;

pub use descriptor::{LoadDescriptor, Multiplicity, RelatedIndex, SetterFn};

/// A registered association with its value types erased.
#[async_trait]
pub trait Association<S: Schema>: Send + Sync {
    /// The relation name.
    fn name(&self) -> &'static str;

    /// The relation's multiplicity.
    fn multiplicity(&self) -> Multiplicity;

    /// Check if `entity` already holds a resolved value.
    fn is_resolved(&self, entity: &EntityRef<S>) -> bool;

    /// Resolve the relation for `entity` and every sibling still needing it.
    async fn load(&self, entity: &EntityRef<S>) -> EntityResult<()>;

    /// Resolve if needed, then project the related value.
    async fn present(
        &self,
        entity: &EntityRef<S>,
        selection: &Selection,
    ) -> EntityResult<ResponseValue>;
}
