mod artifact;
mod mime;

pub use artifact::{ArtifactOrigin, ImageArtifact, PreviewHandle};
pub use mime::{declared_type_for_path, ImageMime, NOT_AN_IMAGE_MESSAGE};
