//! Live camera capture for in-app scanning.
//!
//! A [`CameraSession`] owns at most one acquired [`LiveStream`] and stops it
//! exactly once, whichever way the session ends: explicit
//! [`CameraSession::release`], [`CameraSession::snapshot_and_close`], or drop.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use krishi_contracts::artifacts::ImageArtifact;
use krishi_contracts::errors::ScanError;
use krishi_contracts::events::{emit_quiet, EventKind, EventWriter};
use serde_json::{json, Value};

use crate::error_chain_text;
use crate::source::artifact_from_snapshot;

pub const SNAPSHOT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear camera, pointed at the leaf.
    Environment,
}

impl FacingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "environment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackCapabilities {
    pub torch: bool,
    pub width: u32,
    pub height: u32,
}

/// An acquired video feed.
pub trait LiveStream {
    fn capabilities(&self) -> TrackCapabilities;
    /// Current frame at the feed's native resolution.
    fn grab_frame(&mut self) -> Result<RgbImage>;
    fn apply_torch(&mut self, enabled: bool) -> Result<()>;
    /// Stops every track. Must not panic.
    fn stop(&mut self);
}

pub trait CaptureDevice {
    fn acquire(&self, facing: FacingMode) -> Result<Box<dyn LiveStream>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Requesting,
    Active,
    Denied,
}

pub struct CameraSession {
    stream: Option<Box<dyn LiveStream>>,
    status: CameraStatus,
    torch_supported: bool,
    torch_enabled: bool,
    denial: Option<ScanError>,
    events: Option<EventWriter>,
}

impl CameraSession {
    /// Requests the rear camera. Always yields a session: failures land in
    /// `Denied` with the reason kept for display.
    pub fn open(device: &dyn CaptureDevice, events: Option<EventWriter>) -> Self {
        let mut session = Self {
            stream: None,
            status: CameraStatus::Requesting,
            torch_supported: false,
            torch_enabled: false,
            denial: None,
            events,
        };

        match device.acquire(FacingMode::Environment) {
            Ok(stream) => {
                let caps = stream.capabilities();
                session.torch_supported = caps.torch;
                session.stream = Some(stream);
                session.status = CameraStatus::Active;
                session.emit(
                    EventKind::CameraAcquired,
                    json!({
                        "facing": FacingMode::Environment.as_str(),
                        "width": caps.width,
                        "height": caps.height,
                        "torch_supported": caps.torch,
                    }),
                );
            }
            Err(err) => {
                let reason = error_chain_text(&err, 240);
                session.status = CameraStatus::Denied;
                session.denial = Some(ScanError::CaptureUnavailable(format!(
                    "Camera unavailable ({reason}). You can still pick a photo from the gallery."
                )));
                session.emit(EventKind::CameraDenied, json!({ "reason": reason }));
            }
        }
        session
    }

    pub fn status(&self) -> CameraStatus {
        self.status
    }

    /// Persistent message for a denied session.
    pub fn denial(&self) -> Option<&ScanError> {
        self.denial.as_ref()
    }

    pub fn torch_supported(&self) -> bool {
        self.torch_supported
    }

    pub fn torch_enabled(&self) -> bool {
        self.torch_enabled
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_some()
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.stream.as_ref().map(|stream| {
            let caps = stream.capabilities();
            (caps.width, caps.height)
        })
    }

    /// Flips the torch. A failed constraint update keeps the previous state
    /// and the stream stays live.
    pub fn toggle_torch(&mut self) -> Result<bool, ScanError> {
        if self.status != CameraStatus::Active {
            return Err(self.not_active());
        }
        if !self.torch_supported {
            return Err(ScanError::TransientDeviceFailure(
                "This camera has no torch.".to_string(),
            ));
        }
        let target = !self.torch_enabled;
        let applied = match self.stream.as_mut() {
            Some(stream) => stream.apply_torch(target),
            None => return Err(self.not_active()),
        };
        match applied {
            Ok(()) => {
                self.torch_enabled = target;
                self.emit(EventKind::TorchToggled, json!({ "enabled": target }));
                Ok(target)
            }
            Err(err) => {
                let reason = error_chain_text(&err, 240);
                self.emit(
                    EventKind::TorchToggleFailed,
                    json!({ "requested": target, "reason": reason }),
                );
                Err(ScanError::TransientDeviceFailure(format!(
                    "Failed to toggle flashlight: {reason}"
                )))
            }
        }
    }

    /// Grabs the current frame and encodes it as JPEG.
    pub fn snapshot(&mut self) -> Result<Vec<u8>, ScanError> {
        if self.status != CameraStatus::Active {
            return Err(self.not_active());
        }
        let frame = match self.stream.as_mut() {
            Some(stream) => stream.grab_frame(),
            None => return Err(self.not_active()),
        };
        let frame = frame.map_err(|err| {
            ScanError::CaptureUnavailable(format!(
                "Could not capture a frame: {}",
                error_chain_text(&err, 240)
            ))
        })?;
        encode_jpeg(&frame).map_err(|err| {
            ScanError::CaptureUnavailable(format!(
                "Could not encode the captured frame: {}",
                error_chain_text(&err, 240)
            ))
        })
    }

    /// Captures one frame and closes the camera. The stream is released
    /// even when the capture fails.
    pub fn snapshot_and_close(mut self) -> Result<ImageArtifact, ScanError> {
        let captured = self.snapshot();
        self.release_stream();
        let jpeg = captured?;
        Ok(artifact_from_snapshot(jpeg, Utc::now()))
    }

    pub fn release(mut self) {
        self.release_stream();
    }

    fn release_stream(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        stream.stop();
        self.torch_enabled = false;
        self.emit(EventKind::CameraReleased, json!({}));
    }

    fn not_active(&self) -> ScanError {
        self.denial.clone().unwrap_or_else(|| {
            ScanError::CaptureUnavailable("The camera is not active.".to_string())
        })
    }

    fn emit(&self, kind: EventKind, payload: Value) {
        emit_quiet(self.events.as_ref(), kind, payload);
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}

pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, SNAPSHOT_JPEG_QUALITY);
    encoder
        .encode_image(frame)
        .context("jpeg encode failed")?;
    Ok(bytes)
}

/// Serves a still image as its live feed.
///
/// Stands in for a webcam on headless rigs; an unreadable image is an
/// acquisition failure, exactly like a denied permission.
#[derive(Debug, Clone)]
pub struct StillFrameDevice {
    path: PathBuf,
    torch: bool,
}

impl StillFrameDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            torch: false,
        }
    }

    pub fn with_torch(mut self, torch: bool) -> Self {
        self.torch = torch;
        self
    }
}

impl CaptureDevice for StillFrameDevice {
    fn acquire(&self, _facing: FacingMode) -> Result<Box<dyn LiveStream>> {
        let frame = image::open(&self.path)
            .with_context(|| format!("failed to open camera feed {}", self.path.display()))?
            .to_rgb8();
        Ok(Box::new(StillFrameStream {
            frame,
            torch_supported: self.torch,
            torch_on: false,
            stopped: false,
        }))
    }
}

struct StillFrameStream {
    frame: RgbImage,
    torch_supported: bool,
    torch_on: bool,
    stopped: bool,
}

impl LiveStream for StillFrameStream {
    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities {
            torch: self.torch_supported,
            width: self.frame.width(),
            height: self.frame.height(),
        }
    }

    fn grab_frame(&mut self) -> Result<RgbImage> {
        if self.stopped {
            bail!("stream already stopped");
        }
        Ok(self.frame.clone())
    }

    fn apply_torch(&mut self, enabled: bool) -> Result<()> {
        if !self.torch_supported {
            bail!("torch constraint not supported");
        }
        self.torch_on = enabled;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.torch_on = false;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::fs;
    use std::rc::Rc;

    use anyhow::{anyhow, bail, Result};
    use image::{Rgb, RgbImage};
    use krishi_contracts::artifacts::{ArtifactOrigin, ImageMime};
    use krishi_contracts::errors::ScanError;
    use krishi_contracts::events::EventWriter;
    use serde_json::Value;

    use super::{
        CameraSession, CameraStatus, CaptureDevice, FacingMode, LiveStream, StillFrameDevice,
        TrackCapabilities,
    };

    #[derive(Default)]
    struct DeviceLog {
        stops: Cell<usize>,
        torch_calls: Cell<usize>,
        facing: RefCell<Option<FacingMode>>,
    }

    struct FakeDevice {
        log: Rc<DeviceLog>,
        deny: bool,
        torch: bool,
        torch_fails: bool,
        frame_fails: bool,
    }

    impl FakeDevice {
        fn new(log: &Rc<DeviceLog>) -> Self {
            Self {
                log: Rc::clone(log),
                deny: false,
                torch: true,
                torch_fails: false,
                frame_fails: false,
            }
        }
    }

    struct FakeStream {
        log: Rc<DeviceLog>,
        torch: bool,
        torch_fails: bool,
        frame_fails: bool,
    }

    impl CaptureDevice for FakeDevice {
        fn acquire(&self, facing: FacingMode) -> Result<Box<dyn LiveStream>> {
            *self.log.facing.borrow_mut() = Some(facing);
            if self.deny {
                bail!("Permission denied");
            }
            Ok(Box::new(FakeStream {
                log: Rc::clone(&self.log),
                torch: self.torch,
                torch_fails: self.torch_fails,
                frame_fails: self.frame_fails,
            }))
        }
    }

    impl LiveStream for FakeStream {
        fn capabilities(&self) -> TrackCapabilities {
            TrackCapabilities {
                torch: self.torch,
                width: 4,
                height: 3,
            }
        }

        fn grab_frame(&mut self) -> Result<RgbImage> {
            if self.frame_fails {
                return Err(anyhow!("sensor glitch"));
            }
            Ok(RgbImage::from_pixel(4, 3, Rgb([30, 160, 60])))
        }

        fn apply_torch(&mut self, _enabled: bool) -> Result<()> {
            self.log.torch_calls.set(self.log.torch_calls.get() + 1);
            if self.torch_fails {
                bail!("OverconstrainedError");
            }
            Ok(())
        }

        fn stop(&mut self) {
            self.log.stops.set(self.log.stops.get() + 1);
        }
    }

    #[test]
    fn grant_activates_rear_camera_and_reads_torch_support() {
        let log = Rc::new(DeviceLog::default());
        let session = CameraSession::open(&FakeDevice::new(&log), None);
        assert_eq!(session.status(), CameraStatus::Active);
        assert!(session.torch_supported());
        assert!(!session.torch_enabled());
        assert_eq!(session.frame_size(), Some((4, 3)));
        assert_eq!(*log.facing.borrow(), Some(FacingMode::Environment));
        drop(session);
        assert_eq!(log.stops.get(), 1);
    }

    #[test]
    fn denial_needs_no_release() {
        let log = Rc::new(DeviceLog::default());
        let mut device = FakeDevice::new(&log);
        device.deny = true;
        let mut session = CameraSession::open(&device, None);

        assert_eq!(session.status(), CameraStatus::Denied);
        assert!(!session.is_live());
        assert!(matches!(
            session.denial(),
            Some(ScanError::CaptureUnavailable(msg)) if msg.contains("gallery")
        ));
        assert!(matches!(session.snapshot(), Err(ScanError::CaptureUnavailable(_))));
        assert!(session.toggle_torch().is_err());
        session.release();
        assert_eq!(log.stops.get(), 0);
    }

    #[test]
    fn explicit_release_then_drop_stops_once() {
        let log = Rc::new(DeviceLog::default());
        let session = CameraSession::open(&FakeDevice::new(&log), None);
        session.release();
        assert_eq!(log.stops.get(), 1);
    }

    #[test]
    fn snapshot_and_close_releases_and_yields_jpeg() -> Result<()> {
        let log = Rc::new(DeviceLog::default());
        let session = CameraSession::open(&FakeDevice::new(&log), None);
        let artifact = session.snapshot_and_close()?;

        assert_eq!(log.stops.get(), 1);
        assert_eq!(artifact.mime(), ImageMime::Jpeg);
        assert_eq!(artifact.origin(), ArtifactOrigin::Camera);
        assert!(artifact.file_name().starts_with("scan-"));
        assert_eq!(&artifact.bytes()[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(artifact.bytes())?;
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        Ok(())
    }

    #[test]
    fn failed_capture_still_releases() {
        let log = Rc::new(DeviceLog::default());
        let mut device = FakeDevice::new(&log);
        device.frame_fails = true;
        let session = CameraSession::open(&device, None);
        let outcome = session.snapshot_and_close();

        assert!(matches!(
            outcome,
            Err(ScanError::CaptureUnavailable(msg)) if msg.contains("sensor glitch")
        ));
        assert_eq!(log.stops.get(), 1);
    }

    #[test]
    fn torch_toggles_while_active() -> Result<()> {
        let log = Rc::new(DeviceLog::default());
        let mut session = CameraSession::open(&FakeDevice::new(&log), None);
        assert!(session.toggle_torch()?);
        assert!(session.torch_enabled());
        assert!(!session.toggle_torch()?);
        assert_eq!(log.torch_calls.get(), 2);
        Ok(())
    }

    #[test]
    fn torch_failure_keeps_state_and_session() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let log = Rc::new(DeviceLog::default());
        let mut device = FakeDevice::new(&log);
        device.torch_fails = true;
        let mut session = CameraSession::open(&device, Some(EventWriter::new(&events_path, "s-1")));

        let err = session.toggle_torch().unwrap_err();
        assert_eq!(err.kind(), "transient_device_failure");
        assert!(!session.torch_enabled());
        assert_eq!(session.status(), CameraStatus::Active);
        assert!(session.is_live());
        assert_eq!(log.stops.get(), 0);
        drop(session);

        let types: Vec<String> = fs::read_to_string(&events_path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<Vec<Value>, _>>()?
            .iter()
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect();
        assert_eq!(types, vec!["camera_acquired", "torch_toggle_failed", "camera_released"]);
        Ok(())
    }

    #[test]
    fn unsupported_torch_is_not_applied() {
        let log = Rc::new(DeviceLog::default());
        let mut device = FakeDevice::new(&log);
        device.torch = false;
        let mut session = CameraSession::open(&device, None);
        assert!(matches!(session.toggle_torch(), Err(ScanError::TransientDeviceFailure(_))));
        assert_eq!(log.torch_calls.get(), 0);
    }

    #[test]
    fn still_frame_device_serves_image_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("leaf.png");
        RgbImage::from_pixel(8, 6, Rgb([10, 200, 40])).save(&path)?;

        let mut session = CameraSession::open(&StillFrameDevice::new(&path).with_torch(true), None);
        assert_eq!(session.status(), CameraStatus::Active);
        assert_eq!(session.frame_size(), Some((8, 6)));
        assert!(session.toggle_torch()?);
        let artifact = session.snapshot_and_close()?;
        assert_eq!(artifact.mime(), ImageMime::Jpeg);

        let missing_frame = StillFrameDevice::new(temp.path().join("nope.png"));
        let missing = CameraSession::open(&missing_frame, None);
        assert_eq!(missing.status(), CameraStatus::Denied);
        Ok(())
    }
}
