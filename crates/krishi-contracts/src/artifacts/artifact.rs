use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use super::mime::ImageMime;

/// Where an artifact entered the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    FilePicker,
    DragDrop,
    Camera,
}

impl ArtifactOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FilePicker => "file_picker",
            Self::DragDrop => "drag_drop",
            Self::Camera => "camera",
        }
    }
}

/// Renderable copy of an artifact's content, for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn from_bytes(mime: ImageMime, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime.as_str(), BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Image bytes plus their preview, treated as one unit from capture to
/// submission. Only constructible from an already validated [`ImageMime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    bytes: Vec<u8>,
    mime: ImageMime,
    file_name: String,
    origin: ArtifactOrigin,
    preview: PreviewHandle,
}

impl ImageArtifact {
    pub fn new(
        bytes: Vec<u8>,
        mime: ImageMime,
        file_name: impl Into<String>,
        origin: ArtifactOrigin,
    ) -> Self {
        let preview = PreviewHandle::from_bytes(mime, &bytes);
        Self {
            bytes,
            mime,
            file_name: file_name.into(),
            origin,
            preview,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn origin(&self) -> ArtifactOrigin {
        self.origin
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}
