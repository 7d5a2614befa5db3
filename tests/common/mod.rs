//! Shared fixtures: an in-memory store and user/post/comment schemas.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use kinship::model;
use kinship::prelude::*;

/// In-memory tables plus a log of every loader call.
#[derive(Default)]
pub struct Db {
    pub users: Vec<Model>,
    pub posts: Vec<Model>,
    pub comments: Vec<Model>,
    pub fail_users: AtomicBool,
    calls: Mutex<Vec<(&'static str, Vec<i64>)>>,
}

impl Db {
    pub fn seeded() -> Arc<Self> {
        Arc::new(Self {
            users: vec![
                model! { "id" => 10, "name" => "A", "email_address" => "a@example.com" },
                model! { "id" => 20, "name" => "B", "email_address" => "b@example.com" },
            ],
            posts: vec![
                model! { "id" => 1, "title" => "First", "authorId" => 10, "editor_id" => None::<i64> },
                model! { "id" => 2, "title" => "Second", "authorId" => 10, "editor_id" => 20 },
                model! { "id" => 3, "title" => "Third", "authorId" => 20, "editor_id" => None::<i64> },
            ],
            comments: vec![
                model! { "id" => 100, "post_id" => 1, "body" => "nice" },
                model! { "id" => 101, "post_id" => 1, "body" => "+1" },
                model! { "id" => 102, "post_id" => 3, "body" => "meh" },
            ],
            ..Self::default()
        })
    }

    fn record(&self, table: &'static str, keys: &[i64]) {
        self.calls.lock().unwrap().push((table, keys.to_vec()));
    }

    /// Key batches passed to the loader of `table`, in call order.
    pub fn calls(&self, table: &str) -> Vec<Vec<i64>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == table)
            .map(|(_, keys)| keys.clone())
            .collect()
    }

    pub fn call_count(&self, table: &str) -> usize {
        self.calls(table).len()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The seeded posts, bound as one group.
    pub fn posts(self: &Arc<Self>) -> Vec<EntityRef<Post>> {
        Post::from_array(&self.posts, self.clone()).unwrap()
    }
}

fn matching(rows: &[Model], column: &str, keys: &[i64]) -> Vec<Model> {
    rows.iter()
        .filter(|row| {
            row.get(column)
                .and_then(FieldValue::as_int)
                .is_some_and(|value| keys.contains(&value))
        })
        .cloned()
        .collect()
}

pub async fn load_users(db: Arc<Db>, ids: Vec<i64>) -> Result<Vec<EntityRef<User>>, BoxError> {
    db.record("users", &ids);
    tokio::task::yield_now().await;
    if db.fail_users.load(Ordering::SeqCst) {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset",
        )));
    }
    let rows = matching(&db.users, "id", &ids);
    Ok(User::from_array(&rows, db.clone())?)
}

pub async fn load_posts_by_author(
    db: Arc<Db>,
    author_ids: Vec<i64>,
) -> Result<Vec<EntityRef<Post>>, BoxError> {
    db.record("posts", &author_ids);
    tokio::task::yield_now().await;
    let rows = matching(&db.posts, "authorId", &author_ids);
    Ok(Post::from_array(&rows, db.clone())?)
}

pub async fn load_comments(
    db: Arc<Db>,
    post_ids: Vec<i64>,
) -> Result<Vec<EntityRef<Comment>>, BoxError> {
    db.record("comments", &post_ids);
    tokio::task::yield_now().await;
    let rows = matching(&db.comments, "post_id", &post_ids);
    Ok(Comment::from_array(&rows, db.clone())?)
}

fn int(entity_field: Option<FieldValue>) -> Option<i64> {
    entity_field?.as_int()
}

// ============== User ==============

pub struct User;

#[derive(Default)]
pub struct UserRelations {
    pub posts: Slot<Vec<EntityRef<Post>>>,
}

impl Schema for User {
    const NAME: &'static str = "User";
    type Context = Db;
    type Relations = UserRelations;

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("id")
            .field("name")
            .field_as("email", "email_address");

        schema.computed("display", |user: &EntityRef<User>| {
            let name = user.get("name").unwrap_or_default();
            let email = user.get("email").unwrap_or_default();
            format!(
                "{} <{}>",
                name.as_str().unwrap_or_default(),
                email.as_str().unwrap_or_default()
            )
        });

        schema.computed_async("post_count", |user: EntityRef<User>| async move {
            let posts = user.association("posts", |r| &r.posts).await?;
            Ok(FieldValue::from(posts.len() as i64))
        });

        let posts = schema
            .has_many("posts", |r| &r.posts)
            .getter(|user| int(user.get("id")))
            .related_key(|post: &EntityRef<Post>| int(post.get("author_id")))
            .loader(load_posts_by_author);
        schema.association(posts);
    }
}

// ============== Post ==============

pub struct Post;

#[derive(Default)]
pub struct PostRelations {
    pub author: Slot<EntityRef<User>>,
    pub editor: Slot<Option<EntityRef<User>>>,
    pub comments: Slot<Vec<EntityRef<Comment>>>,
    pub first_comment: Slot<Option<EntityRef<Comment>>>,
}

impl Schema for Post {
    const NAME: &'static str = "Post";
    type Context = Db;
    type Relations = PostRelations;

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("id")
            .field("title")
            .field_as("author_id", "authorId")
            .field("editor_id");
        schema.declare_computed("excerpt");

        let author = schema
            .has_one("author", |r| &r.author)
            .getter(|post| int(post.get("author_id")))
            .related_key(|user: &EntityRef<User>| int(user.get("id")))
            .loader(load_users);
        schema.association(author);

        let editor = schema
            .has_optional("editor", |r| &r.editor)
            .getter(|post| int(post.get("editor_id")))
            .related_key(|user: &EntityRef<User>| int(user.get("id")))
            .loader(load_users);
        schema.association(editor);

        let comments = schema
            .has_many("comments", |r| &r.comments)
            .getter(|post| int(post.get("id")))
            .related_key(|comment: &EntityRef<Comment>| int(comment.get("post_id")))
            .loader(load_comments);
        schema.association(comments);

        // Matched by hand against the loaded batch, without a related key.
        let first_comment = schema
            .has_optional("first_comment", |r| &r.first_comment)
            .getter(|post| int(post.get("id")))
            .loader(load_comments)
            .setter(|post_id, index| {
                Some(post_id.and_then(|post_id| {
                    index
                        .loaded()
                        .iter()
                        .find(|comment| int(comment.get("post_id")) == Some(*post_id))
                        .cloned()
                }))
            });
        schema.association(first_comment);
    }
}

// ============== Comment ==============

pub struct Comment;

impl Schema for Comment {
    const NAME: &'static str = "Comment";
    type Context = Db;
    type Relations = ();

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("id").field("post_id").field("body");
    }
}
