use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const REQUIRED: &str = "This field is required.";

const TITLE_MAX_CHARS: usize = 200;
const SLUG_MAX_CHARS: usize = 50;
const USERNAME_MAX_CHARS: usize = 150;
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 128;

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }

    fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<Uuid>,
}

/// Checks the text and the shape of the group reference. Whether the group
/// exists is up to the caller.
pub fn validate_post(input: &PostInput) -> Result<ValidPost, FormErrors> {
    let mut errors = FormErrors::new();

    let text = input.text.trim();
    if text.is_empty() {
        errors.add("text", REQUIRED);
    }

    let group_id = match input.group.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("group", invalid_choice());
                None
            }
        },
    };

    errors.finish(ValidPost {
        text: text.to_string(),
        group_id,
    })
}

pub fn invalid_choice() -> String {
    "Select a valid choice. That choice is not one of the available choices.".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub fn validate_group(input: &GroupInput) -> Result<ValidGroup, FormErrors> {
    let mut errors = FormErrors::new();

    let title = input.title.trim();
    if title.is_empty() {
        errors.add("title", REQUIRED);
    } else if let Some(message) = too_long(title, TITLE_MAX_CHARS) {
        errors.add("title", message);
    }

    let slug = input.slug.trim();
    if slug.is_empty() {
        errors.add("slug", REQUIRED);
    } else if !is_slug(slug) {
        errors.add(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    } else if let Some(message) = too_long(slug, SLUG_MAX_CHARS) {
        errors.add("slug", message);
    }

    let description = input.description.trim();
    if description.is_empty() {
        errors.add("description", REQUIRED);
    }

    errors.finish(ValidGroup {
        title: title.to_string(),
        slug: slug.to_string(),
        description: description.to_string(),
    })
}

pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

pub fn validate_comment(input: &CommentInput) -> Result<String, FormErrors> {
    let text = input.text.trim();
    if text.is_empty() {
        return Err(FormErrors::single("text", REQUIRED));
    }
    Ok(text.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub fn validate_signup(input: &SignupInput) -> Result<ValidSignup, FormErrors> {
    let mut errors = FormErrors::new();

    let username = input.username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if !is_username(username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    } else if let Some(message) = too_long(username, USERNAME_MAX_CHARS) {
        errors.add("username", message);
    }

    let email = input.email.trim();
    if email.is_empty() {
        errors.add("email", REQUIRED);
    } else if !is_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    if input.password1.is_empty() {
        errors.add("password1", REQUIRED);
    } else if input.password1.trim().chars().count() < PASSWORD_MIN_CHARS {
        errors.add(
            "password1",
            "This password is too short. It must contain at least 8 characters.",
        );
    } else if input.password1.len() > PASSWORD_MAX_CHARS {
        errors.add("password1", "Password must be at most 128 characters.");
    }

    if input.password2.is_empty() {
        errors.add("password2", REQUIRED);
    } else if input.password1 != input.password2 {
        errors.add("password2", "The two password fields didn't match.");
    }

    errors.finish(ValidSignup {
        username: username.to_string(),
        email: email.to_string(),
        password: input.password1.clone(),
    })
}

pub fn is_username(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

/// Anything the mail transport would refuse is refused here too.
fn is_email(value: &str) -> bool {
    value.parse::<lettre::Address>().is_ok()
}

fn too_long(value: &str, max: usize) -> Option<String> {
    let count = value.chars().count();
    (count > max).then(|| {
        format!(
            "Ensure this value has at most {} characters (it has {}).",
            max, count
        )
    })
}
