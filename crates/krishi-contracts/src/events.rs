//! Scan-session event log.
//!
//! Every line of a session's `events.jsonl` is one JSON object carrying
//! `type`, `session_id` and `ts`, followed by the fields of its kind:
//!
//! | `type` | fields |
//! |---|---|
//! | `camera_acquired` | `facing`, `width`, `height`, `torch_supported` |
//! | `camera_denied` | `reason` |
//! | `torch_toggled` | `enabled` |
//! | `torch_toggle_failed` | `requested`, `reason` |
//! | `camera_released` | none |
//! | `diagnosis_submitted` | `file_name`, `mime`, `origin`, `size_bytes`, `sha256`, `endpoint` |
//! | `diagnosis_succeeded` | `disease`, `crop`, `confidence_percent`, `response_ms`, `settled_ms` |
//! | `diagnosis_failed` | `error_kind`, `error`, `response_ms`, `settled_ms` |
//! | `diagnosis_reset` | `previous_state` |
//!
//! A camera session logs `camera_acquired` or `camera_denied` first and
//! `camera_released` at most once. Each submission logs
//! `diagnosis_submitted` followed by exactly one of `diagnosis_succeeded`
//! or `diagnosis_failed`. `response_ms` is the backend round trip and
//! `settled_ms` includes the pacing floor.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CameraAcquired,
    CameraDenied,
    TorchToggled,
    TorchToggleFailed,
    CameraReleased,
    DiagnosisSubmitted,
    DiagnosisSucceeded,
    DiagnosisFailed,
    DiagnosisReset,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CameraAcquired => "camera_acquired",
            Self::CameraDenied => "camera_denied",
            Self::TorchToggled => "torch_toggled",
            Self::TorchToggleFailed => "torch_toggle_failed",
            Self::CameraReleased => "camera_released",
            Self::DiagnosisSubmitted => "diagnosis_submitted",
            Self::DiagnosisSucceeded => "diagnosis_succeeded",
            Self::DiagnosisFailed => "diagnosis_failed",
            Self::DiagnosisReset => "diagnosis_reset",
        }
    }
}

/// Appends one session's events. Clones share the file and the lock.
///
/// Payload keys are merged after the defaults and may override them.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

/// Emits to an optional writer and swallows write failures. Non-object
/// payloads are logged with the default fields only.
///
/// Flow state never depends on whether the log line landed.
pub fn emit_quiet(events: Option<&EventWriter>, kind: EventKind, payload: Value) {
    let Some(writer) = events else {
        return;
    };
    let payload = match payload {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    };
    let _ = writer.emit(kind, payload);
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
