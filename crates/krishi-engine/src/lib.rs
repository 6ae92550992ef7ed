pub mod camera;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod flow;
pub mod pipeline;
pub mod source;
pub mod transport;

#[cfg(test)]
mod testing;

pub use camera::{
    CameraSession, CameraStatus, CaptureDevice, FacingMode, LiveStream, StillFrameDevice,
    TrackCapabilities,
};
pub use clock::{Clock, SystemClock};
pub use config::ClientConfig;
pub use dashboard::DashboardClient;
pub use flow::ScanFlow;
pub use pipeline::{interpret_reply, DiagnosisPipeline, DiagnosisState};
pub use source::{accept_file, artifact_from_snapshot, spawn_accept_file, DropZone, FileHandle};
pub use transport::{DiagnosisTransport, HttpDiagnosisTransport, TransportReply};

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
