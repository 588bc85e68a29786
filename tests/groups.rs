//! Group Tests
//!
//! Covers the group pages: creation, slug rules, author-only editing and
//! deletion, and the group list.

mod common;

use axum::http::StatusCode;
use common::app;
use murmur::app::groups::GroupService;

async fn group_count(slug: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM groups WHERE slug = $1")
        .bind(slug)
        .fetch_one(app().await.pool())
        .await
        .unwrap()
}

// ===========================================================================
// Group Creation
// ===========================================================================

#[tokio::test]
async fn create_group_redirects_to_group_page() {
    let app = app().await;
    let user = app.create_user("group_create").await;

    let resp = app
        .post_form(
            "/create_group/",
            &[
                ("title", "Rust Enthusiasts"),
                ("slug", "rust-enthusiasts"),
                ("description", "Borrow checker appreciation"),
            ],
            Some(&user.cookie),
        )
        .await;
    assert!(
        resp.is_redirect_to("/group/rust-enthusiasts"),
        "got {} {}",
        resp.status,
        resp.location()
    );

    let page = app.get_page("/group/rust-enthusiasts", Some(&user.cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    let html = page.text();
    assert!(html.contains("Rust Enthusiasts"));
    assert!(html.contains("Borrow checker appreciation"));
    assert!(html.contains("/group/rust-enthusiasts/edit/"));
}

#[tokio::test]
async fn create_group_duplicate_slug() {
    let app = app().await;
    let user = app.create_user("group_dup").await;
    app.create_group(None, "taken-slug").await;

    let resp = app
        .post_form(
            "/create_group/",
            &[
                ("title", "Second"),
                ("slug", "taken-slug"),
                ("description", "Too late"),
            ],
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("Group with this Slug already exists."));
    assert_eq!(group_count("taken-slug").await, 1);
}

#[tokio::test]
async fn create_group_invalid_slug() {
    let app = app().await;
    let user = app.create_user("group_bad_slug").await;

    let resp = app
        .post_form(
            "/create_group/",
            &[
                ("title", "Spaces"),
                ("slug", "has spaces"),
                ("description", "Nope"),
            ],
            Some(&user.cookie),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.text().contains("Enter a valid slug"));
    assert_eq!(group_count("has spaces").await, 0);
}

#[tokio::test]
async fn anonymous_create_group_redirects() {
    let app = app().await;

    let resp = app
        .post_form(
            "/create_group/",
            &[
                ("title", "Ghost"),
                ("slug", "ghost-group"),
                ("description", "Nobody"),
            ],
            None,
        )
        .await;

    assert!(resp.status.is_redirection());
    assert!(resp.location().starts_with("/auth/login/?next="));
    assert_eq!(group_count("ghost-group").await, 0);
}

// ===========================================================================
// Group Editing
// ===========================================================================

#[tokio::test]
async fn non_author_edit_redirects() {
    let app = app().await;
    let author = app.create_user("group_edit_owner").await;
    let intruder = app.create_user("group_edit_intruder").await;
    app.create_group(Some(author.id), "guarded-group").await;

    let form = app
        .get_page("/group/guarded-group/edit/", Some(&intruder.cookie))
        .await;
    assert!(form.is_redirect_to("/group/guarded-group"));

    let resp = app
        .post_form(
            "/group/guarded-group/edit/",
            &[
                ("title", "Hijacked"),
                ("slug", "hijacked-group"),
                ("description", "Mine now"),
            ],
            Some(&intruder.cookie),
        )
        .await;
    assert!(resp.is_redirect_to("/group/guarded-group"));
    assert_eq!(group_count("guarded-group").await, 1);
    assert_eq!(group_count("hijacked-group").await, 0);
}

#[tokio::test]
async fn author_edit_moves_slug() {
    let app = app().await;
    let author = app.create_user("group_edit_author").await;
    app.create_group(Some(author.id), "old-slug").await;

    let resp = app
        .post_form(
            "/group/old-slug/edit/",
            &[
                ("title", "Renamed"),
                ("slug", "new-slug"),
                ("description", "Same crowd"),
            ],
            Some(&author.cookie),
        )
        .await;
    assert!(resp.is_redirect_to("/group/new-slug"));

    let old = app.get_page("/group/old-slug", None).await;
    assert_eq!(old.status, StatusCode::NOT_FOUND);
    let new = app.get_page("/group/new-slug", None).await;
    assert_eq!(new.status, StatusCode::OK);
    assert!(new.text().contains("Renamed"));
}

// ===========================================================================
// Group Deletion
// ===========================================================================

#[tokio::test]
async fn delete_group_keeps_posts() {
    let app = app().await;
    let author = app.create_user("group_delete_author").await;
    let group_id = app.create_group(Some(author.id), "doomed-group").await;
    let post = app.create_post(author.id, "outlivesgroup", Some(group_id)).await;

    let resp = app
        .post_form("/delete_group/doomed-group", &[], Some(&author.cookie))
        .await;
    assert!(resp.is_redirect_to("/groups/"));
    assert_eq!(group_count("doomed-group").await, 0);

    let group_id: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT group_id FROM posts WHERE id = $1")
            .bind(post.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert!(group_id.is_none());
}

#[tokio::test]
async fn non_author_cannot_delete_group() {
    let app = app().await;
    let author = app.create_user("group_delete_owner").await;
    let intruder = app.create_user("group_delete_intruder").await;
    app.create_group(Some(author.id), "sturdy-group").await;

    let resp = app
        .post_form("/delete_group/sturdy-group", &[], Some(&intruder.cookie))
        .await;

    assert!(resp.is_redirect_to("/group/sturdy-group"));
    assert_eq!(group_count("sturdy-group").await, 1);
}

// ===========================================================================
// Group Listing
// ===========================================================================

#[tokio::test]
async fn groups_are_listed_by_title() {
    let app = app().await;
    app.create_group(None, "zz-order-b").await;
    app.create_group(None, "zz-order-a").await;

    let groups = GroupService::new(app.state.db.clone())
        .list_all()
        .await
        .unwrap();
    let a = groups.iter().position(|g| g.slug == "zz-order-a").unwrap();
    let b = groups.iter().position(|g| g.slug == "zz-order-b").unwrap();
    assert!(a < b);

    let page = app.get_page("/groups/", None).await;
    assert_eq!(page.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_group_is_404() {
    let app = app().await;

    let resp = app.get_page("/group/never-created", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
