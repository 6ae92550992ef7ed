use thiserror::Error;

/// Failures a scan flow can surface to the user.
///
/// None of these end the process. Each is scoped to the current
/// submission or camera session and clears on reset or on the next
/// user-initiated attempt; nothing is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Wrong or unreadable file. Reported inline, no state changes.
    #[error("{0}")]
    InvalidInput(String),
    /// Camera denied or broken. The gallery path stays available.
    #[error("{0}")]
    CaptureUnavailable(String),
    /// Torch toggles and similar device hiccups; logged, not shown.
    #[error("{0}")]
    TransientDeviceFailure(String),
    /// The backend answered but refused (or garbled) the diagnosis.
    #[error("{0}")]
    RequestRejected(String),
    /// No response reached us at all.
    #[error("{0}")]
    TransportFailure(String),
    #[error("a diagnosis request is already in flight")]
    SubmissionInFlight,
}

impl ScanError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::CaptureUnavailable(_) => "capture_unavailable",
            Self::TransientDeviceFailure(_) => "transient_device_failure",
            Self::RequestRejected(_) => "request_rejected",
            Self::TransportFailure(_) => "transport_failure",
            Self::SubmissionInFlight => "submission_in_flight",
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}
