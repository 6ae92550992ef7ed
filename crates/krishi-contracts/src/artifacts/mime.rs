use std::fmt;
use std::path::Path;

use crate::errors::ScanError;

pub const NOT_AN_IMAGE_MESSAGE: &str = "Please upload an image file (JPG, PNG, or WEBP).";

/// The image encodings the diagnosis backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageMime {
    Jpeg,
    Png,
    Webp,
}

impl ImageMime {
    /// Validates a declared content type.
    ///
    /// Anything outside `image/*` is rejected outright; image types the
    /// backend cannot decode (gif, heic, ...) are rejected with a message
    /// that names them.
    pub fn from_declared(declared: &str) -> Result<Self, ScanError> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !essence.starts_with("image/") {
            return Err(ScanError::InvalidInput(NOT_AN_IMAGE_MESSAGE.to_string()));
        }
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/webp" => Ok(Self::Webp),
            _ => Err(ScanError::InvalidInput(format!(
                "Unsupported image type '{essence}'. Please upload a JPG, PNG, or WEBP image."
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content type a file picker would report for `path`, derived from its
/// extension.
pub fn declared_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" | "heif" => "image/heic",
        "bmp" => "image/bmp",
        "txt" | "md" | "csv" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{declared_type_for_path, ImageMime, NOT_AN_IMAGE_MESSAGE};
    use crate::errors::ScanError;

    #[test]
    fn accepts_backend_image_types() {
        assert_eq!(ImageMime::from_declared("image/jpeg"), Ok(ImageMime::Jpeg));
        assert_eq!(ImageMime::from_declared("image/jpg"), Ok(ImageMime::Jpeg));
        assert_eq!(ImageMime::from_declared(" IMAGE/PNG "), Ok(ImageMime::Png));
        assert_eq!(
            ImageMime::from_declared("image/webp; charset=binary"),
            Ok(ImageMime::Webp)
        );
    }

    #[test]
    fn rejects_non_image_types() {
        for declared in ["text/plain", "application/pdf", "", "imagejpeg"] {
            assert_eq!(
                ImageMime::from_declared(declared),
                Err(ScanError::InvalidInput(NOT_AN_IMAGE_MESSAGE.to_string())),
                "{declared}"
            );
        }
    }

    #[test]
    fn rejects_images_the_backend_cannot_read() {
        let err = ImageMime::from_declared("image/gif").unwrap_err();
        assert!(err.message().contains("image/gif"));
    }

    #[test]
    fn declared_type_follows_extension() {
        assert_eq!(declared_type_for_path(Path::new("leaf.JPG")), "image/jpeg");
        assert_eq!(declared_type_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(
            declared_type_for_path(Path::new("no_extension")),
            "application/octet-stream"
        );
    }
}
