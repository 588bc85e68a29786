use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::forms::{validate_group, FormErrors, GroupInput, REQUIRED};
use crate::app::groups::GroupService;
use crate::app::media::MediaService;
use crate::app::posts::{PostChanges, PostService};
use crate::app::social::{FollowError, SocialService};
use crate::app::users::UserService;
use crate::domain::engagement::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::social_graph::Follow;
use crate::domain::user::User;
use crate::http::{AppError, AuthUser};
use crate::infra::db::is_unique_violation;
use crate::AppState;

const SLUG_TAKEN: &str = "group with this slug already exists.";
const SELF_FOLLOW: &str = "You can't subscribe to yourself";

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub group: Option<Uuid>,
    pub image: Option<String>,
}

impl PostResponse {
    fn new(post: Post, media: &MediaService) -> Self {
        Self {
            image: post.image_key.as_deref().map(|key| media.url(key)),
            id: post.id,
            text: post.text,
            author: post.author_username,
            pub_date: post.pub_date,
            group: post.group.map(|group| group.id),
        }
    }
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author: String,
    pub post: Uuid,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author_username,
            post: comment.post_id,
            text: comment.text,
            created: comment.created,
        }
    }
}

#[derive(Serialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub author: Option<String>,
    pub title: String,
    pub description: String,
    pub slug: String,
}

impl From<Group> for GroupResponse {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            author: group.author_username,
            title: group.title,
            description: group.description,
            slug: group.slug,
        }
    }
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub id: Uuid,
    pub user: String,
    pub following: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            id: follow.id,
            user: follow.user_username,
            following: follow.following_username,
        }
    }
}

// Auth tokens

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn obtain_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let tokens = AuthService::from_state(&state)
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = AuthService::from_state(&state)
        .refresh(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = AuthService::from_state(&state)
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    tracing::debug!(revoked, "refresh token revocation requested");
    Ok(StatusCode::NO_CONTENT)
}

// Posts

#[derive(Deserialize)]
pub struct PostListQuery {
    pub group: Option<String>,
}

#[derive(Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub group: Option<Option<Uuid>>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let group_id = match query.group.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| {
            AppError::validation(FormErrors::single("group", "Enter a valid UUID."))
        })?),
    };

    let posts = PostService::new(state.db.clone())
        .list_all(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let media = MediaService::new(state.storage.clone());
    Ok(Json(
        posts
            .into_iter()
            .map(|post| PostResponse::new(post, &media))
            .collect(),
    ))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let mut errors = FormErrors::new();
    let text = required_text(payload.text.as_deref(), &mut errors);
    let group_id = payload.group.flatten();
    check_group_exists(&state, group_id, &mut errors).await?;
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let post = PostService::new(state.db.clone())
        .create_post(auth.user_id, text, group_id, None)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    let media = MediaService::new(state.storage.clone());
    Ok((StatusCode::CREATED, Json(PostResponse::new(post, &media))))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostResponse>, AppError> {
    let post = fetch_post(&state, post_id).await?;
    let media = MediaService::new(state.storage.clone());
    Ok(Json(PostResponse::new(post, &media)))
}

pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    apply_post_update(auth, state, post_id, payload, false).await
}

pub async fn partial_update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    apply_post_update(auth, state, post_id, payload, true).await
}

async fn apply_post_update(
    auth: AuthUser,
    state: AppState,
    post_id: Uuid,
    payload: PostRequest,
    partial: bool,
) -> Result<Json<PostResponse>, AppError> {
    let post = fetch_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can change this post"));
    }

    let mut errors = FormErrors::new();
    let text = match (&payload.text, partial) {
        (None, true) => None,
        (text, _) => Some(required_text(text.as_deref(), &mut errors)),
    };
    check_group_exists(&state, payload.group.flatten(), &mut errors).await?;
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let changes = PostChanges {
        text,
        group_id: payload.group,
        image_key: None,
    };
    let post = PostService::new(state.db.clone())
        .update_post(post_id, auth.user_id, changes)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to update post");
            AppError::internal("failed to update post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    let media = MediaService::new(state.storage.clone());
    Ok(Json(PostResponse::new(post, &media)))
}

pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let post = fetch_post(&state, post_id).await?;
    if !post.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can delete this post"));
    }

    let deleted = PostService::new(state.db.clone())
        .delete_post(post_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;
    if !deleted {
        return Err(AppError::not_found("post not found"));
    }

    if let Some(key) = &post.image_key {
        MediaService::new(state.storage.clone()).discard(key).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_post(state: &AppState, post_id: Uuid) -> Result<Post, AppError> {
    PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

fn required_text(text: Option<&str>, errors: &mut FormErrors) -> String {
    let text = text.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }
    text.to_string()
}

async fn check_group_exists(
    state: &AppState,
    group_id: Option<Uuid>,
    errors: &mut FormErrors,
) -> Result<(), AppError> {
    let Some(group_id) = group_id else {
        return Ok(());
    };

    let exists = GroupService::new(state.db.clone())
        .exists(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = %group_id, "failed to check group");
            AppError::internal("failed to check group")
        })?;
    if !exists {
        errors.add(
            "group",
            format!("Invalid pk \"{}\" - object does not exist.", group_id),
        );
    }
    Ok(())
}

// Comments

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: Option<String>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    fetch_post(&state, post_id).await?;

    let comments = CommentService::new(state.db.clone())
        .list_for_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    fetch_post(&state, post_id).await?;

    let mut errors = FormErrors::new();
    let text = required_text(payload.text.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let comment = CommentService::new(state.db.clone())
        .add_comment(post_id, auth.user_id, text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to create comment");
            AppError::internal("failed to create comment")
        })?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    Ok(Json(comment.into()))
}

pub async fn update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    apply_comment_update(auth, state, post_id, comment_id, payload, false).await
}

pub async fn partial_update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    apply_comment_update(auth, state, post_id, comment_id, payload, true).await
}

async fn apply_comment_update(
    auth: AuthUser,
    state: AppState,
    post_id: Uuid,
    comment_id: Uuid,
    payload: CommentRequest,
    partial: bool,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    if !comment.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can change this comment"));
    }
    if partial && payload.text.is_none() {
        return Ok(Json(comment.into()));
    }

    let mut errors = FormErrors::new();
    let text = required_text(payload.text.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let comment = CommentService::new(state.db.clone())
        .update_comment(post_id, comment_id, auth.user_id, text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    Ok(Json(comment.into()))
}

pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    if !comment.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can delete this comment"));
    }

    let deleted = CommentService::new(state.db.clone())
        .delete_comment(post_id, comment_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;
    if !deleted {
        return Err(AppError::not_found("comment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_comment(state: &AppState, post_id: Uuid, comment_id: Uuid) -> Result<Comment, AppError> {
    CommentService::new(state.db.clone())
        .get_comment(post_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
            AppError::internal("failed to fetch comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))
}

// Groups

#[derive(Deserialize)]
pub struct GroupRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<GroupResponse>>, AppError> {
    let groups = GroupService::new(state.db.clone())
        .list_all()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to list groups")
        })?;

    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

pub async fn create_group(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<GroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    let input = GroupInput {
        title: payload.title.unwrap_or_default(),
        slug: payload.slug.unwrap_or_default(),
        description: payload.description.unwrap_or_default(),
    };
    let valid = validate_group(&input).map_err(AppError::validation)?;

    let groups = GroupService::new(state.db.clone());
    if slug_taken(&groups, &valid.slug, None).await? {
        return Err(AppError::validation(FormErrors::single("slug", SLUG_TAKEN)));
    }

    let group = groups
        .create_group(auth.user_id, valid)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, "groups_slug_key") {
                return AppError::validation(FormErrors::single("slug", SLUG_TAKEN));
            }
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?;

    Ok((StatusCode::CREATED, Json(group.into())))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupResponse>, AppError> {
    let group = fetch_group(&state, group_id).await?;
    Ok(Json(group.into()))
}

pub async fn update_group(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<GroupRequest>,
) -> Result<Json<GroupResponse>, AppError> {
    apply_group_update(auth, state, group_id, payload, false).await
}

pub async fn partial_update_group(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<GroupRequest>,
) -> Result<Json<GroupResponse>, AppError> {
    apply_group_update(auth, state, group_id, payload, true).await
}

async fn apply_group_update(
    auth: AuthUser,
    state: AppState,
    group_id: Uuid,
    payload: GroupRequest,
    partial: bool,
) -> Result<Json<GroupResponse>, AppError> {
    let group = fetch_group(&state, group_id).await?;
    if !group.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can change this group"));
    }

    // A partial update fills the gaps from the stored group.
    let input = if partial {
        GroupInput {
            title: payload.title.unwrap_or(group.title),
            slug: payload.slug.unwrap_or(group.slug),
            description: payload.description.unwrap_or(group.description),
        }
    } else {
        GroupInput {
            title: payload.title.unwrap_or_default(),
            slug: payload.slug.unwrap_or_default(),
            description: payload.description.unwrap_or_default(),
        }
    };
    let valid = validate_group(&input).map_err(AppError::validation)?;

    let groups = GroupService::new(state.db.clone());
    if slug_taken(&groups, &valid.slug, Some(group_id)).await? {
        return Err(AppError::validation(FormErrors::single("slug", SLUG_TAKEN)));
    }

    let group = groups
        .update_group(group_id, auth.user_id, valid)
        .await
        .map_err(|err| {
            if is_unique_violation(&err, "groups_slug_key") {
                return AppError::validation(FormErrors::single("slug", SLUG_TAKEN));
            }
            tracing::error!(error = ?err, group_id = %group_id, "failed to update group");
            AppError::internal("failed to update group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    Ok(Json(group.into()))
}

pub async fn delete_group(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let group = fetch_group(&state, group_id).await?;
    if !group.is_authored_by(auth.user_id) {
        return Err(AppError::forbidden("only the author can delete this group"));
    }

    let deleted = GroupService::new(state.db.clone())
        .delete_group(group_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = %group_id, "failed to delete group");
            AppError::internal("failed to delete group")
        })?;
    if !deleted {
        return Err(AppError::not_found("group not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_group(state: &AppState, group_id: Uuid) -> Result<Group, AppError> {
    GroupService::new(state.db.clone())
        .get_group(group_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, group_id = %group_id, "failed to fetch group");
            AppError::internal("failed to fetch group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))
}

async fn slug_taken(groups: &GroupService, slug: &str, except: Option<Uuid>) -> Result<bool, AppError> {
    groups.slug_taken(slug, except).await.map_err(|err| {
        tracing::error!(error = ?err, slug, "failed to check slug");
        AppError::internal("failed to check slug")
    })
}

// Follows

#[derive(Deserialize)]
pub struct FollowListQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct FollowRequest {
    #[serde(default)]
    pub following: Option<String>,
}

pub async fn list_follows(
    State(state): State<AppState>,
    Query(query): Query<FollowListQuery>,
) -> Result<Json<Vec<FollowResponse>>, AppError> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let follows = SocialService::new(state.db.clone())
        .list_follows(search)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list follows");
            AppError::internal("failed to list follows")
        })?;

    Ok(Json(follows.into_iter().map(FollowResponse::from).collect()))
}

pub async fn create_follow(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<FollowRequest>,
) -> Result<(StatusCode, Json<FollowResponse>), AppError> {
    let target = resolve_follow_target(&state, payload.following.as_deref()).await?;

    let follow = SocialService::new(state.db.clone())
        .follow(auth.user_id, target.id)
        .await
        .map_err(|err| follow_error(err, &target.username))?;

    Ok((StatusCode::CREATED, Json(follow.into())))
}

pub async fn get_follow(
    State(state): State<AppState>,
    Path(follow_id): Path<Uuid>,
) -> Result<Json<FollowResponse>, AppError> {
    let follow = fetch_follow(&state, follow_id).await?;
    Ok(Json(follow.into()))
}

pub async fn update_follow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(follow_id): Path<Uuid>,
    Json(payload): Json<FollowRequest>,
) -> Result<Json<FollowResponse>, AppError> {
    let follow = fetch_follow(&state, follow_id).await?;
    if follow.user_id != auth.user_id {
        return Err(AppError::forbidden("only the follower can change this subscription"));
    }

    let target = resolve_follow_target(&state, payload.following.as_deref()).await?;
    let follow = SocialService::new(state.db.clone())
        .retarget_follow(follow_id, auth.user_id, target.id)
        .await
        .map_err(|err| follow_error(err, &target.username))?
        .ok_or_else(|| AppError::not_found("follow not found"))?;

    Ok(Json(follow.into()))
}

pub async fn delete_follow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(follow_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let follow = fetch_follow(&state, follow_id).await?;
    if follow.user_id != auth.user_id {
        return Err(AppError::forbidden("only the follower can delete this subscription"));
    }

    let deleted = SocialService::new(state.db.clone())
        .delete_follow(follow_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follow_id = %follow_id, "failed to delete follow");
            AppError::internal("failed to delete follow")
        })?;
    if !deleted {
        return Err(AppError::not_found("follow not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_follow(state: &AppState, follow_id: Uuid) -> Result<Follow, AppError> {
    SocialService::new(state.db.clone())
        .get_follow(follow_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follow_id = %follow_id, "failed to fetch follow");
            AppError::internal("failed to fetch follow")
        })?
        .ok_or_else(|| AppError::not_found("follow not found"))
}

async fn resolve_follow_target(state: &AppState, following: Option<&str>) -> Result<User, AppError> {
    let username = following.map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(AppError::validation(FormErrors::single("following", REQUIRED)));
    }

    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to fetch follow target");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::validation(FormErrors::single("following", missing_user(username))))
}

fn follow_error(err: FollowError, username: &str) -> AppError {
    let message = match err {
        FollowError::SelfFollow => SELF_FOLLOW.to_string(),
        FollowError::AlreadyFollowing => format!("You are already subscribed to {}", username),
        FollowError::UnknownUser => missing_user(username),
        FollowError::Storage(err) => {
            tracing::error!(error = ?err, "failed to store follow");
            return AppError::internal("failed to store follow");
        }
    };
    AppError::validation(FormErrors::single("following", message))
}

fn missing_user(username: &str) -> String {
    format!("Object with username={} does not exist.", username)
}
