use bytes::Bytes;
use image::ImageFormat;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("The submitted file is empty.")]
    Empty,
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    NotAnImage,
    #[error("Unsupported image format. Use JPEG, PNG, GIF or WebP.")]
    UnsupportedFormat,
}

/// An upload whose bytes were sniffed and decoded successfully.
#[derive(Debug, Clone)]
pub struct ValidImage {
    bytes: Bytes,
    format: ImageFormat,
}

impl ValidImage {
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            _ => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            _ => "webp",
        }
    }

    /// Fresh object key under the posts prefix.
    pub fn object_key(&self) -> String {
        format!("posts/{}.{}", Uuid::new_v4(), self.extension())
    }
}

/// Accepts JPEG, PNG, GIF and WebP. The declared content type of the upload
/// is ignored; only the bytes count.
pub fn validate_image(bytes: Bytes) -> Result<ValidImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let format = image::guess_format(&bytes).map_err(|_| ImageError::NotAnImage)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(ImageError::UnsupportedFormat);
    }

    image::load_from_memory_with_format(&bytes, format).map_err(|_| ImageError::NotAnImage)?;

    Ok(ValidImage { bytes, format })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn accepts_png() {
        let image = validate_image(Bytes::from(png_bytes())).unwrap();
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.extension(), "png");
        assert!(image.object_key().starts_with("posts/"));
        assert!(image.object_key().ends_with(".png"));
    }

    #[test]
    fn rejects_text_file() {
        let err = validate_image(Bytes::from_static(b"axum==0.7\nserde==1\n")).unwrap_err();
        assert_eq!(err, ImageError::NotAnImage);
    }

    #[test]
    fn rejects_truncated_png() {
        let mut bytes = png_bytes();
        bytes.truncate(20);
        let err = validate_image(Bytes::from(bytes)).unwrap_err();
        assert_eq!(err, ImageError::NotAnImage);
    }

    #[test]
    fn rejects_empty_upload() {
        assert_eq!(validate_image(Bytes::new()).unwrap_err(), ImageError::Empty);
    }
}
