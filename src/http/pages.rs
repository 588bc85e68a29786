use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use maud::Markup;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::forms::{
    invalid_choice, validate_comment, validate_group, validate_post, validate_signup,
    CommentInput, FormErrors, GroupInput, PostInput, SignupInput, ValidPost,
};
use crate::app::groups::GroupService;
use crate::app::images::{validate_image, ValidImage};
use crate::app::media::MediaService;
use crate::app::pagination::{
    PageRequest, PageWindow, GROUPS_PER_PAGE, POSTS_PER_PAGE, PROFILE_POSTS_PER_PAGE,
};
use crate::app::posts::{PostChanges, PostScope, PostService};
use crate::app::social::{FollowError, SocialService};
use crate::app::users::UserService;
use crate::domain::post::Post;
use crate::domain::user::User;
use crate::http::auth::{SessionUser, SESSION_COOKIE};
use crate::http::upload::PostSubmission;
use crate::http::views::{self, CommentForm, PostForm};
use crate::http::PageError;
use crate::infra::db::is_unique_violation;
use crate::AppState;

type PageResult = Result<Response, PageError>;

const SLUG_TAKEN: &str = "Group with this Slug already exists.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

fn render(markup: Markup) -> Response {
    Html(markup.into_string()).into_response()
}

fn parse_id(raw: &str) -> Result<Uuid, PageError> {
    Uuid::parse_str(raw).map_err(|_| PageError::NotFound)
}

pub async fn index(
    viewer: Option<SessionUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    let listing = index_listing(&state, query.page.as_deref()).await?;
    Ok(render(views::index(viewer.as_ref(), &listing)))
}

/// The index post listing, served from the page cache when possible.
async fn index_listing(state: &AppState, page: Option<&str>) -> Result<String, PageError> {
    let key = format!("index:{}", PageRequest::parse(page).cache_key());

    match state.cache.get_page(&key).await {
        Ok(Some(listing)) => return Ok(listing),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = ?err, key = %key, "page cache read failed"),
    }

    let posts = PostService::new(state.db.clone());
    let total = posts.count(PostScope::All).await?;
    let window = PageWindow::resolve(page, total, POSTS_PER_PAGE);
    let items = posts
        .list(PostScope::All, window.offset(), window.limit())
        .await?;
    let media = MediaService::new(state.storage.clone());
    let listing = views::post_listing(&window.into_page(items), &media, "/").into_string();

    if let Err(err) = state
        .cache
        .put_page(&key, &listing, state.page_cache_ttl_seconds)
        .await
    {
        tracing::warn!(error = ?err, key = %key, "page cache write failed");
    }

    Ok(listing)
}

pub async fn group_posts(
    viewer: Option<SessionUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await?
        .ok_or(PageError::NotFound)?;

    let posts = PostService::new(state.db.clone())
        .page(PostScope::Group(group.id), query.page.as_deref(), POSTS_PER_PAGE)
        .await?;
    let media = MediaService::new(state.storage.clone());

    Ok(render(views::group_page(viewer.as_ref(), &group, &posts, &media)))
}

pub async fn groups_list(
    viewer: Option<SessionUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    let groups = GroupService::new(state.db.clone())
        .page(query.page.as_deref(), GROUPS_PER_PAGE)
        .await?;
    Ok(render(views::groups_page(viewer.as_ref(), &groups)))
}

pub async fn follow_index(
    viewer: SessionUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    let posts = FeedService::new(state.db.clone())
        .follow_feed(viewer.user_id, query.page.as_deref())
        .await?;
    let media = MediaService::new(state.storage.clone());
    Ok(render(views::follow_feed(&viewer, &posts, &media)))
}

pub async fn profile(
    viewer: Option<SessionUser>,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    let users = UserService::new(state.db.clone());
    let author = users
        .get_by_username(&username)
        .await?
        .ok_or(PageError::NotFound)?;
    let stats = users.profile_stats(author.id).await?;

    let following = match &viewer {
        Some(viewer) => {
            SocialService::new(state.db.clone())
                .is_following(viewer.user_id, author.id)
                .await?
        }
        None => false,
    };

    let posts = PostService::new(state.db.clone())
        .page(
            PostScope::Author(author.id),
            query.page.as_deref(),
            PROFILE_POSTS_PER_PAGE,
        )
        .await?;
    let media = MediaService::new(state.storage.clone());

    Ok(render(views::profile(
        viewer.as_ref(),
        &author,
        stats,
        following,
        &posts,
        &media,
    )))
}

/// Resolves `/:username/:post_id/`. A post filed under another author is
/// treated as missing.
async fn load_post(state: &AppState, username: &str, raw_id: &str) -> Result<(User, Post), PageError> {
    let post_id = parse_id(raw_id)?;
    let author = UserService::new(state.db.clone())
        .get_by_username(username)
        .await?
        .ok_or(PageError::NotFound)?;
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await?
        .filter(|post| post.author_id == author.id)
        .ok_or(PageError::NotFound)?;
    Ok((author, post))
}

async fn render_post_detail(
    state: &AppState,
    viewer: Option<&SessionUser>,
    author: &User,
    post: &Post,
    form: &CommentForm<'_>,
) -> PageResult {
    let stats = UserService::new(state.db.clone())
        .profile_stats(author.id)
        .await?;
    let comments = CommentService::new(state.db.clone())
        .list_for_post(post.id)
        .await?;
    let media = MediaService::new(state.storage.clone());

    Ok(render(views::post_detail(
        viewer, author, stats, post, &comments, form, &media,
    )))
}

pub async fn post_view(
    viewer: Option<SessionUser>,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let (author, post) = load_post(&state, &username, &post_id).await?;
    render_post_detail(&state, viewer.as_ref(), &author, &post, &CommentForm::default()).await
}

pub async fn add_comment(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    Form(input): Form<CommentInput>,
) -> PageResult {
    let (author, post) = load_post(&state, &username, &post_id).await?;

    let text = match validate_comment(&input) {
        Ok(text) => text,
        Err(errors) => {
            let form = CommentForm {
                text: &input.text,
                errors,
            };
            return render_post_detail(&state, Some(&viewer), &author, &post, &form).await;
        }
    };

    let comment = CommentService::new(state.db.clone())
        .add_comment(post.id, viewer.user_id, text)
        .await?;
    tracing::info!(comment_id = %comment.id, post_id = %post.id, "comment added");

    Ok(Redirect::to(&views::post_path(&post)).into_response())
}

/// A post submission that passed every check.
struct CheckedPost {
    post: ValidPost,
    image: Option<ValidImage>,
}

/// Runs the form rules, the group lookup and the image sniffing together so
/// the visitor sees every problem at once.
async fn check_post_submission(
    state: &AppState,
    submission: &PostSubmission,
) -> anyhow::Result<Result<CheckedPost, FormErrors>> {
    let mut errors = FormErrors::new();

    let post = match validate_post(&submission.input) {
        Ok(post) => Some(post),
        Err(found) => {
            errors = found;
            None
        }
    };

    if let Some(group_id) = post.as_ref().and_then(|post| post.group_id) {
        if !GroupService::new(state.db.clone()).exists(group_id).await? {
            errors.add("group", invalid_choice());
        }
    }

    let image = match &submission.image {
        Some(bytes) => match validate_image(bytes.clone()) {
            Ok(image) => Some(image),
            Err(err) => {
                errors.add("image", err.to_string());
                None
            }
        },
        None => None,
    };

    match post {
        Some(post) if errors.is_empty() => Ok(Ok(CheckedPost { post, image })),
        _ => Ok(Err(errors)),
    }
}

async fn render_post_form(
    state: &AppState,
    viewer: &SessionUser,
    heading: &str,
    action: String,
    input: &PostInput,
    errors: &FormErrors,
    current_image: Option<String>,
) -> PageResult {
    let groups = GroupService::new(state.db.clone()).list_all().await?;
    let group = input
        .group
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    Ok(render(views::post_form(
        viewer,
        &PostForm {
            heading,
            action,
            text: &input.text,
            group,
            groups: &groups,
            errors,
            current_image,
        },
    )))
}

pub async fn new_post_form(viewer: SessionUser, State(state): State<AppState>) -> PageResult {
    render_post_form(
        &state,
        &viewer,
        "New post",
        "/new/".to_string(),
        &PostInput::default(),
        &FormErrors::new(),
        None,
    )
    .await
}

pub async fn create_post(
    viewer: SessionUser,
    State(state): State<AppState>,
    submission: PostSubmission,
) -> PageResult {
    let checked = match check_post_submission(&state, &submission).await? {
        Ok(checked) => checked,
        Err(errors) => {
            return render_post_form(
                &state,
                &viewer,
                "New post",
                "/new/".to_string(),
                &submission.input,
                &errors,
                None,
            )
            .await;
        }
    };

    let media = MediaService::new(state.storage.clone());
    let image_key = match &checked.image {
        Some(image) => Some(media.store_post_image(image).await?),
        None => None,
    };

    let created = PostService::new(state.db.clone())
        .create_post(
            viewer.user_id,
            checked.post.text,
            checked.post.group_id,
            image_key.clone(),
        )
        .await;
    let post = match created {
        Ok(post) => post,
        Err(err) => {
            if let Some(key) = &image_key {
                media.discard(key).await;
            }
            return Err(err.into());
        }
    };

    tracing::info!(post_id = %post.id, author = %viewer.username, "post created");
    Ok(Redirect::to("/").into_response())
}

pub async fn edit_post_form(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let (_, post) = load_post(&state, &username, &post_id).await?;
    if !post.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&views::post_path(&post)).into_response());
    }

    let media = MediaService::new(state.storage.clone());
    let input = PostInput {
        text: post.text.clone(),
        group: post.group.as_ref().map(|group| group.id.to_string()),
    };
    render_post_form(
        &state,
        &viewer,
        "Edit post",
        format!("{}edit/", views::post_path(&post)),
        &input,
        &FormErrors::new(),
        post.image_key.as_deref().map(|key| media.url(key)),
    )
    .await
}

pub async fn edit_post(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
    submission: PostSubmission,
) -> PageResult {
    let (_, post) = load_post(&state, &username, &post_id).await?;
    let path = views::post_path(&post);
    if !post.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&path).into_response());
    }

    let media = MediaService::new(state.storage.clone());
    let checked = match check_post_submission(&state, &submission).await? {
        Ok(checked) => checked,
        Err(errors) => {
            return render_post_form(
                &state,
                &viewer,
                "Edit post",
                format!("{}edit/", path),
                &submission.input,
                &errors,
                post.image_key.as_deref().map(|key| media.url(key)),
            )
            .await;
        }
    };

    let image_key = match &checked.image {
        Some(image) => Some(Some(media.store_post_image(image).await?)),
        None if submission.clear_image => Some(None),
        None => None,
    };
    let replaces_image = image_key.is_some();

    let changes = PostChanges {
        text: Some(checked.post.text),
        group_id: Some(checked.post.group_id),
        image_key,
    };
    let updated = PostService::new(state.db.clone())
        .update_post(post.id, viewer.user_id, changes)
        .await?
        .ok_or(PageError::NotFound)?;

    if replaces_image {
        if let Some(old_key) = &post.image_key {
            media.discard(old_key).await;
        }
    }

    tracing::info!(post_id = %updated.id, "post edited");
    Ok(Redirect::to(&views::post_path(&updated)).into_response())
}

pub async fn delete_post(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> PageResult {
    let (author, post) = load_post(&state, &username, &post_id).await?;
    if !post.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&views::post_path(&post)).into_response());
    }

    let deleted = PostService::new(state.db.clone())
        .delete_post(post.id, viewer.user_id)
        .await?;
    if deleted {
        if let Some(key) = &post.image_key {
            MediaService::new(state.storage.clone()).discard(key).await;
        }
        tracing::info!(post_id = %post.id, "post deleted");
    }

    Ok(Redirect::to(&format!("/{}/", author.username)).into_response())
}

pub async fn profile_follow(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> PageResult {
    let author = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await?
        .ok_or(PageError::NotFound)?;

    match SocialService::new(state.db.clone())
        .follow(viewer.user_id, author.id)
        .await
    {
        Ok(_) => Ok(Redirect::to(&format!("/{}/", author.username)).into_response()),
        Err(FollowError::SelfFollow | FollowError::AlreadyFollowing) => {
            Ok(Redirect::to("/").into_response())
        }
        Err(FollowError::UnknownUser) => Err(PageError::NotFound),
        Err(FollowError::Storage(err)) => Err(err.into()),
    }
}

pub async fn profile_unfollow(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> PageResult {
    let author = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await?
        .ok_or(PageError::NotFound)?;

    let removed = SocialService::new(state.db.clone())
        .unfollow(viewer.user_id, author.id)
        .await?;
    if !removed {
        return Ok(Redirect::to("/").into_response());
    }

    tracing::info!(follower_id = %viewer.user_id, followee_id = %author.id, "follow removed");
    Ok(Redirect::to(&format!("/{}/", author.username)).into_response())
}

pub async fn new_group_form(viewer: SessionUser) -> PageResult {
    Ok(render(views::group_form(
        &viewer,
        "New group",
        "/create_group/",
        &GroupInput::default(),
        &FormErrors::new(),
    )))
}

pub async fn create_group(
    viewer: SessionUser,
    State(state): State<AppState>,
    Form(input): Form<GroupInput>,
) -> PageResult {
    let groups = GroupService::new(state.db.clone());
    let rerender = |errors: FormErrors| {
        render(views::group_form(
            &viewer,
            "New group",
            "/create_group/",
            &input,
            &errors,
        ))
    };

    let valid = match validate_group(&input) {
        Ok(valid) => valid,
        Err(errors) => return Ok(rerender(errors)),
    };
    if groups.slug_taken(&valid.slug, None).await? {
        return Ok(rerender(FormErrors::single("slug", SLUG_TAKEN)));
    }

    let group = match groups.create_group(viewer.user_id, valid).await {
        Ok(group) => group,
        Err(err) if is_unique_violation(&err, "groups_slug_key") => {
            return Ok(rerender(FormErrors::single("slug", SLUG_TAKEN)));
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(group_id = %group.id, slug = %group.slug, "group created");
    Ok(Redirect::to(&format!("/group/{}", group.slug)).into_response())
}

pub async fn edit_group_form(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> PageResult {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await?
        .ok_or(PageError::NotFound)?;
    if !group.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&format!("/group/{}", group.slug)).into_response());
    }

    let input = GroupInput {
        title: group.title,
        slug: group.slug.clone(),
        description: group.description,
    };
    Ok(render(views::group_form(
        &viewer,
        "Edit group",
        &format!("/group/{}/edit/", group.slug),
        &input,
        &FormErrors::new(),
    )))
}

pub async fn edit_group(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(input): Form<GroupInput>,
) -> PageResult {
    let groups = GroupService::new(state.db.clone());
    let group = groups.get_by_slug(&slug).await?.ok_or(PageError::NotFound)?;
    if !group.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&format!("/group/{}", group.slug)).into_response());
    }

    let action = format!("/group/{}/edit/", group.slug);
    let rerender = |errors: FormErrors| {
        render(views::group_form(&viewer, "Edit group", &action, &input, &errors))
    };

    let valid = match validate_group(&input) {
        Ok(valid) => valid,
        Err(errors) => return Ok(rerender(errors)),
    };
    if groups.slug_taken(&valid.slug, Some(group.id)).await? {
        return Ok(rerender(FormErrors::single("slug", SLUG_TAKEN)));
    }

    let updated = match groups.update_group(group.id, viewer.user_id, valid).await {
        Ok(updated) => updated.ok_or(PageError::NotFound)?,
        Err(err) if is_unique_violation(&err, "groups_slug_key") => {
            return Ok(rerender(FormErrors::single("slug", SLUG_TAKEN)));
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Redirect::to(&format!("/group/{}", updated.slug)).into_response())
}

pub async fn delete_group(
    viewer: SessionUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> PageResult {
    let groups = GroupService::new(state.db.clone());
    let group = groups.get_by_slug(&slug).await?.ok_or(PageError::NotFound)?;
    if !group.is_authored_by(viewer.user_id) {
        return Ok(Redirect::to(&format!("/group/{}", group.slug)).into_response());
    }

    if groups.delete_group(group.id, viewer.user_id).await? {
        tracing::info!(group_id = %group.id, "group deleted");
    }
    Ok(Redirect::to("/groups/").into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

pub async fn login_form(Query(query): Query<LoginQuery>) -> PageResult {
    let next = query.next.unwrap_or_default();
    Ok(render(views::login("", &next, None)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult {
    let identifier = form.username.trim();
    if identifier.is_empty() || form.password.is_empty() {
        return Ok(render(views::login(identifier, &form.next, Some(BAD_CREDENTIALS))));
    }

    let session = AuthService::from_state(&state)
        .login_session(identifier, &form.password)
        .await?;
    let Some((user, token)) = session else {
        return Ok(render(views::login(identifier, &form.next, Some(BAD_CREDENTIALS))));
    };

    let cookie = Cookie::build((SESSION_COOKIE, token.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(state.session_ttl_hours as i64));

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((jar.add(cookie), Redirect::to(safe_next(&form.next))).into_response())
}

pub async fn logout(jar: CookieJar) -> PageResult {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn signup_form() -> PageResult {
    Ok(render(views::signup(&SignupInput::default(), &FormErrors::new())))
}

pub async fn signup(State(state): State<AppState>, Form(input): Form<SignupInput>) -> PageResult {
    let valid = match validate_signup(&input) {
        Ok(valid) => valid,
        Err(errors) => return Ok(render(views::signup(&input, &errors))),
    };

    let users = UserService::new(state.db.clone());
    if users.username_taken(&valid.username).await? {
        let errors = FormErrors::single("username", USERNAME_TAKEN);
        return Ok(render(views::signup(&input, &errors)));
    }

    let created = AuthService::from_state(&state)
        .signup(valid.username, valid.email, valid.password)
        .await;
    let pending = match created {
        Ok(pending) => pending,
        Err(err) if is_unique_violation(&err, "users_username_key") => {
            let errors = FormErrors::single("username", USERNAME_TAKEN);
            return Ok(render(views::signup(&input, &errors)));
        }
        Err(err) => return Err(err.into()),
    };

    // The account only exists once the registration notice went out.
    state.mailer.send_signup_notice(&pending.user.email).await?;
    let user = pending.commit().await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user signed up");

    Ok(Redirect::to("/auth/login/").into_response())
}

/// Only local absolute paths are followed after login.
fn safe_next(next: &str) -> &str {
    let next = next.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_keeps_local_paths() {
        assert_eq!(safe_next("/new/"), "/new/");
        assert_eq!(safe_next("/alice/follow/"), "/alice/follow/");
    }

    #[test]
    fn safe_next_rejects_foreign_targets() {
        assert_eq!(safe_next(""), "/");
        assert_eq!(safe_next("https://evil.example/"), "/");
        assert_eq!(safe_next("//evil.example/"), "/");
        assert_eq!(safe_next("/\\evil.example"), "/");
    }
}
