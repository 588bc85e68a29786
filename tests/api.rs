//! REST API Tests
//!
//! Covers posts, comments and groups under /api/, including the
//! author-only write rules.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Posts
// ===========================================================================

#[tokio::test]
async fn api_post_lifecycle() {
    let app = app().await;
    let user = app.create_user("api_post_life").await;

    let resp = app
        .post_json("/api/posts/", json!({ "text": "hello api" }), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["text"], json!("hello api"));
    assert_eq!(body["author"], json!(user.username));
    assert_eq!(body["group"], json!(null));
    assert_eq!(body["image"], json!(null));
    let id = body["id"].as_str().unwrap().to_string();
    let path = format!("/api/posts/{}/", id);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["text"], json!("hello api"));

    let resp = app
        .patch_json(&path, json!({ "text": "patched" }), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["text"], json!("patched"));

    let resp = app
        .put_json(&path, json!({ "text": "replaced" }), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["text"], json!("replaced"));

    let resp = app.delete(&path, Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn api_post_writes_are_author_only() {
    let app = app().await;
    let author = app.create_user("api_post_owner").await;
    let intruder = app.create_user("api_post_intruder").await;
    let post = app.create_post(author.id, "mine", None).await;
    let path = format!("/api/posts/{}/", post.id);

    let resp = app
        .patch_json(&path, json!({ "text": "yours" }), Some(&intruder.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.delete(&path, Some(&intruder.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .patch_json(&path, json!({ "text": "yours" }), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.json()["text"], json!("mine"));
}

#[tokio::test]
async fn api_post_missing_is_404_before_permissions() {
    let app = app().await;
    let user = app.create_user("api_post_missing").await;

    let resp = app
        .delete(&format!("/api/posts/{}/", Uuid::new_v4()), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_post_validation() {
    let app = app().await;
    let user = app.create_user("api_post_invalid").await;
    let post = app.create_post(user.id, "valid", None).await;

    let resp = app
        .post_json("/api/posts/", json!({ "text": "  " }), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("text"), "This field is required.");

    let resp = app
        .put_json(
            &format!("/api/posts/{}/", post.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("text"), "This field is required.");

    let missing = Uuid::new_v4();
    let resp = app
        .post_json(
            "/api/posts/",
            json!({ "text": "grouped", "group": missing }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.field_error("group"),
        format!("Invalid pk \"{}\" - object does not exist.", missing)
    );
}

#[tokio::test]
async fn api_posts_filter_by_group() {
    let app = app().await;
    let user = app.create_user("api_post_filter").await;
    let group_id = app.create_group(None, "api-filter").await;
    app.create_post(user.id, "inthegroup", Some(group_id)).await;
    app.create_post(user.id, "outsidethegroup", None).await;

    let resp = app
        .get(&format!("/api/posts/?group={}", group_id), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["text"], json!("inthegroup"));
    assert_eq!(items[0]["group"], json!(group_id));

    let resp = app.get("/api/posts/?group=not-a-uuid", None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("group"), "Enter a valid UUID.");
}

#[tokio::test]
async fn api_patch_can_clear_group() {
    let app = app().await;
    let user = app.create_user("api_post_ungroup").await;
    let group_id = app.create_group(None, "api-ungroup").await;
    let post = app.create_post(user.id, "leaving", Some(group_id)).await;

    let resp = app
        .patch_json(
            &format!("/api/posts/{}/", post.id),
            json!({ "group": null }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["group"], json!(null));
    assert_eq!(resp.json()["text"], json!("leaving"));
}

// ===========================================================================
// Comments
// ===========================================================================

#[tokio::test]
async fn api_comment_lifecycle() {
    let app = app().await;
    let author = app.create_user("api_comment_author").await;
    let reader = app.create_user("api_comment_reader").await;
    let post = app.create_post(author.id, "commentable", None).await;
    let base = format!("/api/posts/{}/comments/", post.id);

    let resp = app
        .post_json(
            &base,
            json!({ "text": "nice post", "author": author.username }),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["author"], json!(reader.username));
    assert_eq!(body["post"], json!(post.id));
    let path = format!("{}{}/", base, body["id"].as_str().unwrap());

    let resp = app.get(&base, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().unwrap().len(), 1);

    let resp = app
        .patch_json(&path, json!({ "text": "edited" }), Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .patch_json(&path, json!({ "text": "edited" }), Some(&reader.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["text"], json!("edited"));

    let resp = app.delete(&path, Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.delete(&path, Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_comments_on_unknown_post() {
    let app = app().await;
    let user = app.create_user("api_comment_ghost").await;
    let base = format!("/api/posts/{}/comments/", Uuid::new_v4());

    let resp = app.get(&base, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .post_json(&base, json!({ "text": "hello?" }), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_comment_requires_text() {
    let app = app().await;
    let user = app.create_user("api_comment_empty").await;
    let post = app.create_post(user.id, "silent", None).await;

    let resp = app
        .post_json(
            &format!("/api/posts/{}/comments/", post.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("text"), "This field is required.");
}

// ===========================================================================
// Groups
// ===========================================================================

#[tokio::test]
async fn api_group_lifecycle() {
    let app = app().await;
    let author = app.create_user("api_group_author").await;
    let other = app.create_user("api_group_other").await;

    let resp = app
        .post_json(
            "/api/groups/",
            json!({ "title": "Api Group", "slug": "api-group", "description": "Made by API" }),
            Some(&author.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["author"], json!(author.username));
    let path = format!("/api/groups/{}/", body["id"].as_str().unwrap());

    let resp = app
        .post_json(
            "/api/groups/",
            json!({ "title": "Copy", "slug": "api-group", "description": "Again" }),
            Some(&other.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("slug"), "group with this slug already exists.");

    let resp = app
        .patch_json(&path, json!({ "title": "Stolen" }), Some(&other.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .patch_json(&path, json!({ "title": "Renamed Group" }), Some(&author.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["title"], json!("Renamed Group"));
    assert_eq!(body["slug"], json!("api-group"));
    assert_eq!(body["description"], json!("Made by API"));

    let resp = app.get("/api/groups/", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .any(|group| group["slug"] == json!("api-group")));

    let resp = app.delete(&path, Some(&other.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.delete(&path, Some(&author.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&path, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_group_requires_fields() {
    let app = app().await;
    let user = app.create_user("api_group_invalid").await;

    let resp = app
        .post_json("/api/groups/", json!({ "slug": "no title" }), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.field_error("title"), "This field is required.");
    assert_eq!(resp.field_error("description"), "This field is required.");
    assert!(!resp.field_error("slug").is_empty());
}

// ===========================================================================
// Fallback
// ===========================================================================

#[tokio::test]
async fn unknown_api_path_is_json_404() {
    let app = app().await;

    let resp = app.get("/api/nothing/here/", None).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(!resp.error_message().is_empty());
}
