use axum::{routing::get, routing::post, Router};

use crate::http::{api, handlers, pages};
use crate::AppState;

pub fn ops() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/admin/cache/clear", post(handlers::clear_page_cache))
}

pub fn accounts() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", get(pages::signup_form).post(pages::signup))
        .route("/auth/login/", get(pages::login_form).post(pages::login))
        .route("/auth/logout/", get(pages::logout))
}

pub fn pages() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::index))
        .route("/groups/", get(pages::groups_list))
        .route("/group/:slug", get(pages::group_posts))
        .route(
            "/group/:slug/edit/",
            get(pages::edit_group_form).post(pages::edit_group),
        )
        .route(
            "/create_group/",
            get(pages::new_group_form).post(pages::create_group),
        )
        .route("/delete_group/:slug", post(pages::delete_group))
        .route("/new/", get(pages::new_post_form).post(pages::create_post))
        .route("/follow/", get(pages::follow_index))
        .route("/:username/", get(pages::profile))
        .route("/:username/follow/", get(pages::profile_follow))
        .route("/:username/unfollow/", get(pages::profile_unfollow))
        .route("/:username/:post_id/", get(pages::post_view))
        .route(
            "/:username/:post_id/edit/",
            get(pages::edit_post_form).post(pages::edit_post),
        )
        .route("/:username/:post_id/delete/", post(pages::delete_post))
        .route("/:username/:post_id/comment", post(pages::add_comment))
}

pub fn api() -> Router<AppState> {
    Router::new()
        .route("/api/auth/token/", post(api::obtain_token))
        .route("/api/auth/token/refresh/", post(api::refresh_token))
        .route("/api/auth/token/revoke/", post(api::revoke_token))
        .route("/api/posts/", get(api::list_posts).post(api::create_post))
        .route(
            "/api/posts/:post_id/",
            get(api::get_post)
                .put(api::update_post)
                .patch(api::partial_update_post)
                .delete(api::delete_post),
        )
        .route(
            "/api/posts/:post_id/comments/",
            get(api::list_comments).post(api::create_comment),
        )
        .route(
            "/api/posts/:post_id/comments/:comment_id/",
            get(api::get_comment)
                .put(api::update_comment)
                .patch(api::partial_update_comment)
                .delete(api::delete_comment),
        )
        .route("/api/groups/", get(api::list_groups).post(api::create_group))
        .route(
            "/api/groups/:group_id/",
            get(api::get_group)
                .put(api::update_group)
                .patch(api::partial_update_group)
                .delete(api::delete_group),
        )
        .route("/api/follow/", get(api::list_follows).post(api::create_follow))
        .route(
            "/api/follow/:follow_id/",
            get(api::get_follow)
                .put(api::update_follow)
                .patch(api::update_follow)
                .delete(api::delete_follow),
        )
}
