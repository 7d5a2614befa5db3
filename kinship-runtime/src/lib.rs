//! # kinship-runtime
//!
//! Runtime for schema-generated entities: batched association loading and
//! field projection.
//!
//! This crate provides:
//! - Entity groups created by one factory call, sharing a lock registry
//! - Batched association resolution with per-relation locks
//! - Field projection driven by selection trees
//! - Model binding with alias maps and dirty tracking
//!
//! ## Entity Groups
//!
//! Entities built by the same `from_array` call are siblings. Loading an
//! association on one of them resolves it for every sibling that still needs
//! it with a single loader call:
//!
//! ```rust,ignore
//! let posts = Post::from_array(&models, db.clone())?;
//!
//! // One loader call with the distinct author ids of every post.
//! let author = posts[0].association("author", |r| &r.author).await?;
//! let other = posts[1].association("author", |r| &r.author).await?;
//! ```
//!
//! ## Projection
//!
//! ```rust,ignore
//! let selection = Selection::new()
//!     .field("title")
//!     .relation("comments", Selection::only(["body"]));
//!
//! let responses = present_many(&posts, &selection).await?;
//! ```
//!
//! ## Models
//!
//! ```rust
//! use kinship_runtime::{model, FieldValue};
//!
//! let model = model! { "id" => 1, "title" => "Hello" };
//! assert_eq!(model.get("id"), Some(&FieldValue::Int(1)));
//! ```

pub mod binder;
pub mod config;
pub mod error;
pub mod group;
pub mod lock;
#[macro_use]
pub mod logging;
pub mod present;
pub mod relations;
pub mod schema;
pub mod selection;
pub mod slot;
#[macro_use]
pub mod value;

pub use binder::{AliasMap, ModelBinder};
pub use config::KinshipConfig;
pub use error::{BoxError, EntityError, EntityResult, ErrorCode, ErrorContext};
pub use group::{EntityRef, Group, GroupOptions};
pub use lock::LockRegistry;
pub use present::{present_many, Projectable, Response, ResponseValue};
pub use relations::{LoadDescriptor, Multiplicity, RelatedIndex, SetterFn};
pub use schema::{Schema, SchemaBuilder};
pub use selection::{Selected, Selection};
pub use slot::{Slot, SlotState};
pub use value::{FieldValue, Model};

// Re-export logging utilities
pub use logging::{
    get_log_format, get_log_level, init as init_logging, init_with_level, is_debug_enabled,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{BoxError, EntityError, EntityResult};
    pub use crate::group::{EntityRef, Group, GroupOptions};
    pub use crate::model;
    pub use crate::present::{present_many, Projectable, Response, ResponseValue};
    pub use crate::relations::{LoadDescriptor, Multiplicity};
    pub use crate::schema::{Schema, SchemaBuilder};
    pub use crate::selection::Selection;
    pub use crate::slot::Slot;
    pub use crate::value::{FieldValue, Model};
}
