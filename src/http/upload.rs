use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use bytes::Bytes;
use serde::Deserialize;

use crate::app::forms::PostInput;

/// Body of the new/edit post form. Browsers send it as multipart because of
/// the image field; plain urlencoded bodies are accepted too.
#[derive(Debug, Default)]
pub struct PostSubmission {
    pub input: PostInput,
    pub image: Option<Bytes>,
    pub clear_image: bool,
}

#[derive(Deserialize)]
struct UrlencodedPost {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: Option<String>,
    #[serde(default, rename = "image-clear")]
    image_clear: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequest<S> for PostSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(form) = Form::<UrlencodedPost>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(PostSubmission {
                input: PostInput {
                    text: form.text,
                    group: form.group,
                },
                image: None,
                clear_image: form.image_clear.is_some(),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let mut submission = PostSubmission::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => submission.input.text = field.text().await.map_err(bad_multipart)?,
                "group" => submission.input.group = Some(field.text().await.map_err(bad_multipart)?),
                "image" => {
                    let has_name = field.file_name().map(|name| !name.is_empty()).unwrap_or(false);
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    // An untouched file input still arrives as an empty part.
                    if has_name || !bytes.is_empty() {
                        submission.image = Some(bytes);
                    }
                }
                "image-clear" => {
                    field.bytes().await.map_err(bad_multipart)?;
                    submission.clear_image = true;
                }
                _ => {
                    field.bytes().await.map_err(bad_multipart)?;
                }
            }
        }

        Ok(submission)
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> Response {
    tracing::debug!(error = %err, "rejected multipart body");
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}
