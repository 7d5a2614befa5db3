//! Integration tests for batched association loading.
//!
//! These tests verify that sibling entities coalesce loads into a single
//! loader call, that resolved values are cached, and that failures leave
//! slots unresolved for a later retry.

mod common;

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{Comment, Db, Post, User, load_users};
use futures::future::join_all;
use kinship::model;
use kinship::prelude::*;
use kinship::runtime::ErrorCode;
use pretty_assertions::assert_eq;

fn name(user: &EntityRef<User>) -> Option<String> {
    user.get("name")?.as_str().map(str::to_string)
}

/// Siblings {1,10}, {2,10}, {3,20} resolve with one call for keys {10,20}
#[tokio::test]
async fn test_siblings_share_one_loader_call() {
    let db = Db::seeded();
    let posts = Post::from_array(
        &[
            model! { "id" => 1, "authorId" => 10 },
            model! { "id" => 2, "authorId" => 10 },
            model! { "id" => 3, "authorId" => 20 },
        ],
        db.clone(),
    )
    .unwrap();

    let authors = join_all(
        posts
            .iter()
            .map(|post| post.association("author", |r| &r.author)),
    )
    .await
    .into_iter()
    .collect::<EntityResult<Vec<_>>>()
    .unwrap();

    assert_eq!(db.calls("users"), vec![vec![10, 20]]);
    let names: Vec<_> = authors.iter().filter_map(name).collect();
    assert_eq!(names, vec!["A", "A", "B"]);
}

/// A single access resolves the relation for every sibling
#[tokio::test]
async fn test_one_access_resolves_all_siblings() {
    let db = Db::seeded();
    let posts = db.posts();

    posts[1].load("author").await.unwrap();

    assert!(posts.iter().all(|post| post.relations().author.is_resolved()));
    assert_eq!(db.call_count("users"), 1);
}

/// Only siblings that still need the relation contribute keys
#[tokio::test]
async fn test_only_unresolved_siblings_are_loaded() {
    let db = Db::seeded();
    let posts = Post::from_array(
        &[
            model! { "id" => 1, "authorId" => 30 },
            model! { "id" => 2, "authorId" => 10 },
            model! { "id" => 3, "authorId" => 20 },
        ],
        db.clone(),
    )
    .unwrap();

    let stranger = User::from_one(&model! { "id" => 30, "name" => "C" }, db.clone()).unwrap();
    posts[0].relations().author.set(stranger.clone());

    posts[1].load("author").await.unwrap();

    assert_eq!(db.calls("users"), vec![vec![10, 20]]);
    let kept = posts[0].association("author", |r| &r.author).await.unwrap();
    assert_eq!(kept, stranger);
}

/// Resolving twice returns the cached entity without another call
#[tokio::test]
async fn test_resolution_is_idempotent() {
    let db = Db::seeded();
    let posts = db.posts();

    let first = posts[0].association("author", |r| &r.author).await.unwrap();
    let second = posts[0].association("author", |r| &r.author).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(db.call_count("users"), 1);
    assert_eq!(posts[0].relations().author.epoch(), 1);
}

/// Entities from separate factory calls never coalesce
#[tokio::test]
async fn test_separate_factories_do_not_coalesce() {
    let db = Db::seeded();
    let a = Post::from_one(&db.posts[0], db.clone()).unwrap();
    let b = Post::from_one(&db.posts[1], db.clone()).unwrap();

    a.load("author").await.unwrap();
    b.load("author").await.unwrap();

    assert_eq!(db.calls("users"), vec![vec![10], vec![10]]);
}

/// A loader failure reaches every waiting caller and is not cached
#[tokio::test]
async fn test_loader_failure_propagates_and_retries() {
    let db = Db::seeded();
    let posts = db.posts();
    db.fail_users.store(true, Ordering::SeqCst);

    let results = join_all(posts.iter().map(|post| post.load("author"))).await;

    assert_eq!(db.call_count("users"), 1);
    for result in results {
        let err = result.unwrap_err();
        assert!(err.is_loader_failure());
        let source = err
            .loader_error()
            .and_then(|source| source.downcast_ref::<io::Error>())
            .expect("loader error is preserved");
        assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
    }
    assert!(posts.iter().all(|post| !post.relations().author.is_resolved()));

    db.fail_users.store(false, Ordering::SeqCst);
    let author = posts[0].association("author", |r| &r.author).await.unwrap();

    assert_eq!(name(&author).as_deref(), Some("A"));
    assert_eq!(db.call_count("users"), 2);
}

/// A missing required entity fails without writing any sibling slot
#[tokio::test]
async fn test_missing_required_entity() {
    let db = Db::seeded();
    let posts = Post::from_array(
        &[
            model! { "id" => 1, "authorId" => 10 },
            model! { "id" => 2, "authorId" => 99 },
        ],
        db.clone(),
    )
    .unwrap();

    let err = posts[0].load("author").await.unwrap_err();

    assert_eq!(err.code, ErrorCode::RelatedNotFound);
    assert!(posts.iter().all(|post| !post.relations().author.is_resolved()));
}

/// Nullable relations resolve to None and skip null keys
#[tokio::test]
async fn test_nullable_relation() {
    let db = Db::seeded();
    let posts = db.posts();

    posts[0].load("editor").await.unwrap();

    assert_eq!(db.calls("users"), vec![vec![20]]);
    assert_eq!(posts[0].relations().editor.get(), Some(None));
    let editor = posts[1].relations().editor.get().flatten().unwrap();
    assert_eq!(name(&editor).as_deref(), Some("B"));
}

/// Nullable relations with no keys at all never call the loader
#[tokio::test]
async fn test_nullable_relation_without_keys() {
    let db = Db::seeded();
    let post = Post::from_one(&db.posts[0], db.clone()).unwrap();

    let editor = post.association("editor", |r| &r.editor).await.unwrap();

    assert!(editor.is_none());
    assert_eq!(db.total_calls(), 0);
}

/// Plural relations keep load order and default to empty
#[tokio::test]
async fn test_plural_relation() {
    let db = Db::seeded();
    let posts = db.posts();

    let comments = posts[0].association("comments", |r| &r.comments).await.unwrap();
    let ids: Vec<_> = comments
        .iter()
        .filter_map(|comment| comment.get("id")?.as_int())
        .collect();

    assert_eq!(ids, vec![100, 101]);
    assert_eq!(db.calls("comments"), vec![vec![1, 2, 3]]);
    assert_eq!(posts[1].relations().comments.get().map(|c| c.len()), Some(0));
    assert_eq!(posts[2].relations().comments.get().map(|c| c.len()), Some(1));
}

/// Reverse plural relation keyed by the loaded entity
#[tokio::test]
async fn test_has_many_by_author() {
    let db = Db::seeded();
    let users = User::from_array(&db.users, db.clone()).unwrap();

    users[0].load("posts").await.unwrap();

    assert_eq!(db.calls("posts"), vec![vec![10, 20]]);
    assert_eq!(users[0].relations().posts.get().map(|p| p.len()), Some(2));
    assert_eq!(users[1].relations().posts.get().map(|p| p.len()), Some(1));
}

/// A custom setter can match the batch without a related key
#[tokio::test]
async fn test_custom_setter() {
    let db = Db::seeded();
    let posts = db.posts();

    posts[0].load("first_comment").await.unwrap();

    let first = posts[0].relations().first_comment.get().flatten().unwrap();
    assert_eq!(first.get("body"), Some(FieldValue::from("nice")));
    assert_eq!(posts[1].relations().first_comment.get(), Some(None));
}

/// Different relation names load concurrently with separate locks
#[tokio::test]
async fn test_relation_names_do_not_contend() {
    let db = Db::seeded();
    let posts = db.posts();

    let (author, comments) = tokio::join!(
        posts[0].association("author", |r| &r.author),
        posts[0].association("comments", |r| &r.comments),
    );

    author.unwrap();
    comments.unwrap();
    assert_eq!(db.call_count("users"), 1);
    assert_eq!(db.call_count("comments"), 1);
    assert_eq!(posts[0].group().locks().len(), 2);
}

/// Group-level loading resolves every member
#[tokio::test]
async fn test_group_load() {
    let db = Db::seeded();
    let posts = db.posts();
    let group = posts[0].group();

    group.load("comments").await.unwrap();

    assert_eq!(group.len(), 3);
    assert!(group
        .members()
        .iter()
        .all(|post| post.relations().comments.is_resolved()));
}

/// Group-level loading is not short-circuited by a resolved first member
#[tokio::test]
async fn test_group_load_skips_resolved_first_member() {
    let db = Db::seeded();
    let posts = db.posts();
    let stranger = User::from_one(&model! { "id" => 30, "name" => "C" }, db.clone()).unwrap();
    posts[0].relations().author.set(stranger.clone());

    posts[0].group().load("author").await.unwrap();

    assert!(posts.iter().all(|post| post.relations().author.is_resolved()));
    assert_eq!(db.calls("users"), vec![vec![10, 20]]);
    let kept = posts[0].association("author", |r| &r.author).await.unwrap();
    assert_eq!(kept, stranger);
}

/// Group-level loading of a fully resolved relation makes no call
#[tokio::test]
async fn test_group_load_when_all_resolved() {
    let db = Db::seeded();
    let posts = db.posts();
    let group = posts[0].group();

    group.load("author").await.unwrap();
    group.load("author").await.unwrap();

    assert_eq!(db.call_count("users"), 1);
}

/// Loads also work from a multi-threaded runtime
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_share_one_call() {
    let db = Db::seeded();
    let posts = db.posts();

    let handles: Vec<_> = posts
        .iter()
        .cloned()
        .map(|post| tokio::spawn(async move { post.load("author").await }))
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.call_count("users"), 1);
}

/// Unknown relation names are rejected
#[tokio::test]
async fn test_unknown_association() {
    let db = Db::seeded();
    let post = Post::from_one(&db.posts[0], db.clone()).unwrap();

    let err = post.load("reviewer").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::UnknownAssociation);
}

// ============== Incomplete descriptors ==============

struct Draft;

#[derive(Default)]
struct DraftRelations {
    no_getter: Slot<EntityRef<User>>,
    no_loader: Slot<EntityRef<User>>,
    no_setter: Slot<EntityRef<User>>,
}

impl Schema for Draft {
    const NAME: &'static str = "Draft";
    type Context = Db;
    type Relations = DraftRelations;

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("id").field("author_id");

        let no_getter = schema
            .has_one("no_getter", |r| &r.no_getter)
            .related_key(|user: &EntityRef<User>| user.get("id")?.as_int())
            .loader(load_users);
        schema.association(no_getter);

        let no_loader = schema
            .has_one("no_loader", |r| &r.no_loader)
            .getter(|draft| draft.get("author_id")?.as_int())
            .related_key(|user: &EntityRef<User>| user.get("id")?.as_int());
        schema.association(no_loader);

        let no_setter = schema
            .has_one("no_setter", |r| &r.no_setter)
            .getter(|draft| draft.get("author_id")?.as_int())
            .loader(load_users);
        schema.association(no_setter);
    }
}

/// Incomplete descriptors fail before any fetch
#[tokio::test]
async fn test_incomplete_descriptors() {
    let db = Db::seeded();
    let draft = Draft::from_one(&model! { "id" => 1, "author_id" => 10 }, db.clone()).unwrap();

    let cases = [
        ("no_getter", ErrorCode::MissingGetter),
        ("no_loader", ErrorCode::MissingLoader),
        ("no_setter", ErrorCode::MissingSetter),
    ];
    for (relation, code) in cases {
        let err = draft.load(relation).await.unwrap_err();
        assert_eq!(err.code, code);
        assert!(err.is_configuration());
    }
    assert_eq!(db.total_calls(), 0);
}

// ============== Declaration errors ==============

struct Twice;

impl Schema for Twice {
    const NAME: &'static str = "Twice";
    type Context = ();
    type Relations = ();

    fn describe(schema: &mut SchemaBuilder<Self>) {
        schema.field("id").field("id");
    }
}

#[test]
fn test_duplicate_field_is_rejected() {
    let err = Twice::from_one(&model! { "id" => 1 }, Arc::new(())).unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicateField);
}

#[test]
fn test_comment_has_no_relations() {
    let db = Db::seeded();
    let comments = Comment::from_array(&db.comments, db.clone()).unwrap();
    assert_eq!(comments.len(), 3);
    assert!(comments[0].group().locks().is_empty());
}
