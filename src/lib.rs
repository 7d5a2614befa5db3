//! # Kinship
//!
//! Batched association loading and field projection for schema-generated
//! entities.
//!
//! Kinship provides:
//! - Entity groups whose siblings coalesce association loads into one
//!   loader call per relation
//! - Typed association slots with explicit resolved/unresolved state
//! - Selection-driven projection that only fetches what is requested
//! - Model binding with field aliases and dirty tracking
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kinship::prelude::*;
//! use std::sync::Arc;
//!
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
//!         schema.field("id").field("title").field("author_id");
//!         let author = schema
//!             .has_one("author", |r| &r.author)
//!             .getter(|post| post.get("author_id")?.as_int())
//!             .related_key(|user: &EntityRef<User>| user.get("id")?.as_int())
//!             .loader(|db: Arc<Db>, ids: Vec<i64>| async move { db.users(ids).await });
//!         schema.association(author);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kinship::EntityError> {
//!     let posts = Post::from_array(&rows, db)?;
//!     let selection = Selection::new()
//!         .field("title")
//!         .relation("author", Selection::only(["name"]));
//!     let responses = present_many(&posts, &selection).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Entity runtime: groups, association loading and projection.
pub mod runtime {
    pub use kinship_runtime::*;
}

pub use kinship_runtime::model;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kinship_runtime::prelude::*;
}

// Re-export key types at the crate root
pub use runtime::{
    EntityError, EntityRef, EntityResult, FieldValue, Group, KinshipConfig, Model, Response,
    Schema, SchemaBuilder, Selection, Slot,
};
