use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use chrono::{DateTime, Utc};
use krishi_contracts::artifacts::{
    declared_type_for_path, ArtifactOrigin, ImageArtifact, ImageMime,
};
use krishi_contracts::errors::ScanError;

/// Backend upload ceiling; larger files are refused before any bytes move.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// A file as a picker or drop target hands it over: a path plus the
/// content type it was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    declared_type: String,
}

impl FileHandle {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let declared_type = declared_type_for_path(&path);
        Self {
            path,
            declared_type,
        }
    }

    pub fn with_declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = declared_type.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string())
    }
}

/// Validates `handle` and materializes it as an artifact.
///
/// The declared type is checked before the file is touched, so a rejected
/// selection costs nothing and changes nothing.
pub fn accept_file(
    handle: &FileHandle,
    origin: ArtifactOrigin,
) -> Result<ImageArtifact, ScanError> {
    let mime = ImageMime::from_declared(handle.declared_type())?;
    let size = fs::metadata(handle.path())
        .map_err(|err| unreadable(handle.path(), &err))?
        .len();
    if size == 0 {
        return Err(ScanError::InvalidInput("Uploaded file is empty.".to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ScanError::InvalidInput(
            "Image too large. Maximum size is 10 MB.".to_string(),
        ));
    }
    let bytes = fs::read(handle.path()).map_err(|err| unreadable(handle.path(), &err))?;
    Ok(ImageArtifact::new(bytes, mime, handle.file_name(), origin))
}

/// Runs [`accept_file`] off the caller's thread. The receiver yields
/// exactly one message.
pub fn spawn_accept_file(
    handle: FileHandle,
    origin: ArtifactOrigin,
) -> Receiver<Result<ImageArtifact, ScanError>> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let _ = tx.send(accept_file(&handle, origin));
    });
    rx
}

/// Wraps an encoded camera frame. The file name carries the capture time
/// so repeated scans never collide.
pub fn artifact_from_snapshot(jpeg: Vec<u8>, captured_at: DateTime<Utc>) -> ImageArtifact {
    ImageArtifact::new(
        jpeg,
        ImageMime::Jpeg,
        format!("scan-{}.jpg", captured_at.timestamp_millis()),
        ArtifactOrigin::Camera,
    )
}

fn unreadable(path: &Path, err: &std::io::Error) -> ScanError {
    ScanError::InvalidInput(format!("Could not read {}: {err}", path.display()))
}

/// Drop target state. `is_drag_over` only drives visual feedback.
#[derive(Debug, Default)]
pub struct DropZone {
    is_drag_over: bool,
}

impl DropZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drag_over(&self) -> bool {
        self.is_drag_over
    }

    pub fn drag_enter(&mut self) {
        self.is_drag_over = true;
    }

    pub fn drag_over(&mut self) {
        self.is_drag_over = true;
    }

    pub fn drag_leave(&mut self) {
        self.is_drag_over = false;
    }

    /// Ends the drag. Returns `None` when the drop carried no file.
    pub fn drop_file(
        &mut self,
        handle: Option<&FileHandle>,
    ) -> Option<Result<ImageArtifact, ScanError>> {
        self.is_drag_over = false;
        handle.map(|handle| accept_file(handle, ArtifactOrigin::DragDrop))
    }
}
