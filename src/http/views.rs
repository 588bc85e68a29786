//! HTML rendering for the server-side pages.
//!
//! Every page goes through [`layout`]. Listing fragments are plain
//! `Markup` so the index can cache them as strings.

use maud::{html, Markup, PreEscaped, DOCTYPE};
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::forms::{FormErrors, GroupInput, SignupInput};
use crate::app::media::MediaService;
use crate::app::pagination::Page;
use crate::domain::engagement::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::{ProfileStats, User};
use crate::http::auth::SessionUser;

pub fn layout(title: &str, viewer: Option<&SessionUser>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | murmur" }
            }
            body {
                header {
                    nav {
                        a href="/" { "murmur" }
                        " "
                        a href="/groups/" { "Groups" }
                        @if let Some(viewer) = viewer {
                            " "
                            a href="/follow/" { "Following" }
                            " "
                            a href="/new/" { "New post" }
                            " "
                            a href="/create_group/" { "New group" }
                            " "
                            a href={ "/" (viewer.username) "/" } { (viewer.username) }
                            " "
                            a href="/auth/logout/" { "Log out" }
                        } @else {
                            " "
                            a href="/auth/login/" { "Log in" }
                            " "
                            a href="/auth/signup/" { "Sign up" }
                        }
                    }
                }
                main { (content) }
            }
        }
    }
}

/// Post cards followed by the paginator.
pub fn post_listing(posts: &Page<Post>, media: &MediaService, base: &str) -> Markup {
    html! {
        @if posts.items.is_empty() {
            p.empty { "No posts yet." }
        }
        @for post in &posts.items {
            (post_card(post, media))
        }
        (paginator(posts, base))
    }
}

fn post_card(post: &Post, media: &MediaService) -> Markup {
    html! {
        article.post {
            p.meta {
                "by "
                a href={ "/" (post.author_username) "/" } { (post.author_username) }
                " on "
                (format_date(post.pub_date))
            }
            @if let Some(key) = &post.image_key {
                img.post-image src=(media.url(key)) alt="post image";
            }
            p.text { (post.text) }
            p.links {
                a href=(post_path(post)) { "Open" }
                @if let Some(group) = &post.group {
                    " | "
                    a href={ "/group/" (group.slug) } { "#" (group.title) }
                }
            }
        }
    }
}

fn paginator<T>(page: &Page<T>, base: &str) -> Markup {
    html! {
        @if page.num_pages > 1 {
            nav.paginator {
                @if page.has_previous {
                    a href={ (base) "?page=1" } { "first" }
                    " "
                    a href={ (base) "?page=" (page.number - 1) } { "previous" }
                    " "
                }
                span.current { "Page " (page.number) " of " (page.num_pages) }
                @if page.has_next {
                    " "
                    a href={ (base) "?page=" (page.number + 1) } { "next" }
                    " "
                    a href={ (base) "?page=" (page.num_pages) } { "last" }
                }
            }
        }
    }
}

pub fn index(viewer: Option<&SessionUser>, listing: &str) -> Markup {
    layout(
        "Latest posts",
        viewer,
        html! {
            h1 { "Latest posts" }
            (PreEscaped(listing))
        },
    )
}

pub fn follow_feed(viewer: &SessionUser, posts: &Page<Post>, media: &MediaService) -> Markup {
    layout(
        "Following",
        Some(viewer),
        html! {
            h1 { "Posts by authors you follow" }
            (post_listing(posts, media, "/follow/"))
        },
    )
}

pub fn group_page(
    viewer: Option<&SessionUser>,
    group: &Group,
    posts: &Page<Post>,
    media: &MediaService,
) -> Markup {
    let is_author = viewer
        .map(|viewer| group.is_authored_by(viewer.user_id))
        .unwrap_or(false);
    let base = format!("/group/{}", group.slug);

    layout(
        &group.title,
        viewer,
        html! {
            h1 { (group.title) }
            p.description { (group.description) }
            @if let Some(author) = &group.author_username {
                p.meta { "created by " a href={ "/" (author) "/" } { (author) } }
            }
            @if is_author {
                p.actions {
                    a href={ (base) "/edit/" } { "Edit group" }
                }
                form method="post" action={ "/delete_group/" (group.slug) } {
                    button type="submit" { "Delete group" }
                }
            }
            (post_listing(posts, media, &base))
        },
    )
}

pub fn groups_page(viewer: Option<&SessionUser>, groups: &Page<Group>) -> Markup {
    layout(
        "Groups",
        viewer,
        html! {
            h1 { "Groups" }
            @if groups.items.is_empty() {
                p.empty { "No groups yet." }
            }
            ul.groups {
                @for group in &groups.items {
                    li {
                        a href={ "/group/" (group.slug) } { (group.title) }
                        " "
                        span.description { (group.description) }
                    }
                }
            }
            (paginator(groups, "/groups/"))
        },
    )
}

fn profile_card(author: &User, stats: ProfileStats) -> Markup {
    html! {
        section.profile {
            h2 { a href={ "/" (author.username) "/" } { (author.username) } }
            ul.stats {
                li { "Posts: " (stats.posts_count) }
                li { "Followers: " (stats.followers_count) }
                li { "Following: " (stats.following_count) }
            }
        }
    }
}

pub fn profile(
    viewer: Option<&SessionUser>,
    author: &User,
    stats: ProfileStats,
    following: bool,
    posts: &Page<Post>,
    media: &MediaService,
) -> Markup {
    let is_self = viewer.map(|viewer| viewer.user_id == author.id).unwrap_or(false);
    let base = format!("/{}/", author.username);

    layout(
        &author.username,
        viewer,
        html! {
            (profile_card(author, stats))
            @if viewer.is_some() && !is_self {
                p.actions {
                    @if following {
                        a href={ (base) "unfollow/" } { "Unfollow" }
                    } @else {
                        a href={ (base) "follow/" } { "Follow" }
                    }
                }
            }
            (post_listing(posts, media, &base))
        },
    )
}

/// State of the comment box under a post.
#[derive(Debug, Default)]
pub struct CommentForm<'a> {
    pub text: &'a str,
    pub errors: FormErrors,
}

pub fn post_detail(
    viewer: Option<&SessionUser>,
    author: &User,
    stats: ProfileStats,
    post: &Post,
    comments: &[Comment],
    form: &CommentForm<'_>,
    media: &MediaService,
) -> Markup {
    let is_author = viewer
        .map(|viewer| post.is_authored_by(viewer.user_id))
        .unwrap_or(false);
    let path = post_path(post);

    layout(
        "Post",
        viewer,
        html! {
            (profile_card(author, stats))
            (post_card(post, media))
            p.meta { "Comments: " (comments.len()) }
            @if is_author {
                p.actions { a href={ (path) "edit/" } { "Edit" } }
                form method="post" action={ (path) "delete/" } {
                    button type="submit" { "Delete" }
                }
            }
            section.comments {
                @for comment in comments {
                    div.comment {
                        p.meta {
                            a href={ "/" (comment.author_username) "/" } { (comment.author_username) }
                            " on "
                            (format_date(comment.created))
                        }
                        p { (comment.text) }
                    }
                }
            }
            @if viewer.is_some() {
                form method="post" action={ (path) "comment" } {
                    label for="id_text" { "Add a comment" }
                    textarea id="id_text" name="text" { (form.text) }
                    (field_errors(&form.errors, "text"))
                    button type="submit" { "Send" }
                }
            }
        },
    )
}

/// Everything the new/edit post form needs.
pub struct PostForm<'a> {
    pub heading: &'a str,
    pub action: String,
    pub text: &'a str,
    pub group: Option<Uuid>,
    pub groups: &'a [Group],
    pub errors: &'a FormErrors,
    pub current_image: Option<String>,
}

pub fn post_form(viewer: &SessionUser, form: &PostForm<'_>) -> Markup {
    layout(
        form.heading,
        Some(viewer),
        html! {
            h1 { (form.heading) }
            form method="post" action=(form.action) enctype="multipart/form-data" {
                p {
                    label for="id_text" { "Text" }
                    textarea id="id_text" name="text" { (form.text) }
                    (field_errors(form.errors, "text"))
                }
                p {
                    label for="id_group" { "Group" }
                    select id="id_group" name="group" {
                        option value="" selected[form.group.is_none()] { "---------" }
                        @for group in form.groups {
                            option value=(group.id) selected[form.group == Some(group.id)] { (group.title) }
                        }
                    }
                    (field_errors(form.errors, "group"))
                }
                p {
                    @if let Some(url) = &form.current_image {
                        "Currently: " a href=(url) { (url) }
                        " "
                        input type="checkbox" id="id_image_clear" name="image-clear";
                        label for="id_image_clear" { "Clear" }
                        br;
                    }
                    label for="id_image" { "Image" }
                    input type="file" id="id_image" name="image" accept="image/*";
                    (field_errors(form.errors, "image"))
                }
                button type="submit" { "Save" }
            }
        },
    )
}

pub fn group_form(
    viewer: &SessionUser,
    heading: &str,
    action: &str,
    input: &GroupInput,
    errors: &FormErrors,
) -> Markup {
    layout(
        heading,
        Some(viewer),
        html! {
            h1 { (heading) }
            form method="post" action=(action) {
                p {
                    label for="id_title" { "Title" }
                    input type="text" id="id_title" name="title" value=(input.title) maxlength="200";
                    (field_errors(errors, "title"))
                }
                p {
                    label for="id_slug" { "Slug" }
                    input type="text" id="id_slug" name="slug" value=(input.slug) maxlength="50";
                    (field_errors(errors, "slug"))
                }
                p {
                    label for="id_description" { "Description" }
                    textarea id="id_description" name="description" { (input.description) }
                    (field_errors(errors, "description"))
                }
                button type="submit" { "Save" }
            }
        },
    )
}

pub fn login(identifier: &str, next: &str, error: Option<&str>) -> Markup {
    layout(
        "Log in",
        None,
        html! {
            h1 { "Log in" }
            @if let Some(error) = error {
                p.error { (error) }
            }
            form method="post" action="/auth/login/" {
                input type="hidden" name="next" value=(next);
                p {
                    label for="id_username" { "Username or email" }
                    input type="text" id="id_username" name="username" value=(identifier);
                }
                p {
                    label for="id_password" { "Password" }
                    input type="password" id="id_password" name="password";
                }
                button type="submit" { "Log in" }
            }
        },
    )
}

pub fn signup(input: &SignupInput, errors: &FormErrors) -> Markup {
    layout(
        "Sign up",
        None,
        html! {
            h1 { "Sign up" }
            form method="post" action="/auth/signup/" {
                p {
                    label for="id_username" { "Username" }
                    input type="text" id="id_username" name="username" value=(input.username) maxlength="150";
                    (field_errors(errors, "username"))
                }
                p {
                    label for="id_email" { "Email" }
                    input type="email" id="id_email" name="email" value=(input.email);
                    (field_errors(errors, "email"))
                }
                p {
                    label for="id_password1" { "Password" }
                    input type="password" id="id_password1" name="password1";
                    (field_errors(errors, "password1"))
                }
                p {
                    label for="id_password2" { "Password confirmation" }
                    input type="password" id="id_password2" name="password2";
                    (field_errors(errors, "password2"))
                }
                button type="submit" { "Sign up" }
            }
        },
    )
}

pub fn not_found(path: Option<&str>) -> Markup {
    layout(
        "Page not found",
        None,
        html! {
            h1 { "Page not found" }
            @if let Some(path) = path {
                p { "Nothing lives at " code { (path) } "." }
            } @else {
                p { "The page you asked for does not exist." }
            }
            a href="/" { "Back to the front page" }
        },
    )
}

pub fn server_error() -> Markup {
    layout(
        "Server error",
        None,
        html! {
            h1 { "Something went wrong" }
            p { "The server failed to handle this request. Try again later." }
        },
    )
}

fn field_errors(errors: &FormErrors, field: &str) -> Markup {
    html! {
        @for message in errors.field(field) {
            span.error { (message) }
        }
    }
}

pub fn post_path(post: &Post) -> String {
    format!("/{}/{}/", post.author_username, post.id)
}

fn format_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[day] [month repr:short] [year] [hour]:[minute]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of<T>(items: Vec<T>, number: i64, num_pages: i64) -> Page<T> {
        Page {
            total: items.len() as i64,
            items,
            number,
            num_pages,
            has_previous: number > 1,
            has_next: number < num_pages,
        }
    }

    #[test]
    fn paginator_hidden_for_single_page() {
        let page = page_of(vec![1, 2, 3], 1, 1);
        assert!(paginator(&page, "/").into_string().is_empty());
    }

    #[test]
    fn paginator_links_neighbours() {
        let page = page_of(vec![1], 2, 3);
        let html = paginator(&page, "/groups/").into_string();
        assert!(html.contains("/groups/?page=1"));
        assert!(html.contains("/groups/?page=3"));
        assert!(html.contains("Page 2 of 3"));
    }

    #[test]
    fn not_found_escapes_path() {
        let html = not_found(Some("/<script>/")).into_string();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
