use std::time::{Duration, Instant};

use krishi_contracts::artifacts::{ImageArtifact, PreviewHandle};
use krishi_contracts::diagnosis::{rejection_message, DiagnosisResult};
use krishi_contracts::errors::ScanError;
use krishi_contracts::events::{emit_quiet, EventKind, EventWriter};
use serde_json::{json, Value};

use crate::clock::{Clock, SystemClock};
use crate::config::DEFAULT_PACING_FLOOR;
use crate::error_chain_text;
use crate::transport::{DiagnosisTransport, TransportReply};

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisState {
    Idle,
    Submitting,
    Succeeded(DiagnosisResult),
    Failed(ScanError),
}

impl DiagnosisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// One artifact at a time, from submission to a terminal outcome.
///
/// Every terminal transition lands no sooner than `pacing_floor` after
/// [`DiagnosisPipeline::begin`]. No request is ever retried.
pub struct DiagnosisPipeline<T, C = SystemClock> {
    transport: T,
    clock: C,
    pacing_floor: Duration,
    state: DiagnosisState,
    artifact: Option<ImageArtifact>,
    started_at: Option<Instant>,
    events: Option<EventWriter>,
}

impl<T: DiagnosisTransport> DiagnosisPipeline<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            clock: SystemClock,
            pacing_floor: DEFAULT_PACING_FLOOR,
            state: DiagnosisState::Idle,
            artifact: None,
            started_at: None,
            events: None,
        }
    }
}

impl<T: DiagnosisTransport, C: Clock> DiagnosisPipeline<T, C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> DiagnosisPipeline<T, C2> {
        DiagnosisPipeline {
            transport: self.transport,
            clock,
            pacing_floor: self.pacing_floor,
            state: self.state,
            artifact: self.artifact,
            started_at: self.started_at,
            events: self.events,
        }
    }

    pub fn with_pacing_floor(mut self, pacing_floor: Duration) -> Self {
        self.pacing_floor = pacing_floor;
        self
    }

    pub fn with_events(mut self, events: Option<EventWriter>) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> &DiagnosisState {
        &self.state
    }

    pub fn artifact(&self) -> Option<&ImageArtifact> {
        self.artifact.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.artifact.as_ref().map(ImageArtifact::preview)
    }

    pub fn result(&self) -> Option<&DiagnosisResult> {
        match &self.state {
            DiagnosisState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match &self.state {
            DiagnosisState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.state == DiagnosisState::Submitting
    }

    /// Takes ownership of `artifact` and enters `Submitting`, dropping any
    /// previous outcome.
    pub fn begin(&mut self, artifact: ImageArtifact) -> Result<(), ScanError> {
        if self.is_submitting() {
            return Err(ScanError::SubmissionInFlight);
        }
        self.emit(
            EventKind::DiagnosisSubmitted,
            json!({
                "file_name": artifact.file_name(),
                "mime": artifact.mime().as_str(),
                "origin": artifact.origin().as_str(),
                "size_bytes": artifact.size_bytes(),
                "sha256": artifact.sha256(),
                "endpoint": self.transport.endpoint(),
            }),
        );
        self.artifact = Some(artifact);
        self.state = DiagnosisState::Submitting;
        self.started_at = Some(self.clock.now());
        Ok(())
    }

    /// Sends the held artifact and settles the outcome. Outside
    /// `Submitting` this is a no-op.
    pub fn finish(&mut self) -> &DiagnosisState {
        if !self.is_submitting() {
            return &self.state;
        }
        let outcome = match &self.artifact {
            Some(artifact) => match self.transport.predict(artifact) {
                Ok(reply) => interpret_reply(&reply),
                Err(err) => Err(unreachable_backend(self.transport.endpoint(), &err)),
            },
            None => Err(ScanError::InvalidInput(
                "No image selected for diagnosis.".to_string(),
            )),
        };

        let started_at = self.started_at.take().unwrap_or_else(|| self.clock.now());
        let elapsed = self.clock.now().saturating_duration_since(started_at);
        if elapsed < self.pacing_floor {
            self.clock.sleep(self.pacing_floor - elapsed);
        }
        let settled_ms = self.clock.now().saturating_duration_since(started_at).as_millis() as u64;

        self.state = match outcome {
            Ok(result) => {
                self.emit(
                    EventKind::DiagnosisSucceeded,
                    json!({
                        "disease": result.disease,
                        "crop": result.crop,
                        "confidence_percent": result.confidence_percent,
                        "response_ms": elapsed.as_millis() as u64,
                        "settled_ms": settled_ms,
                    }),
                );
                DiagnosisState::Succeeded(result)
            }
            Err(err) => {
                self.emit(
                    EventKind::DiagnosisFailed,
                    json!({
                        "error_kind": err.kind(),
                        "error": err.message(),
                        "response_ms": elapsed.as_millis() as u64,
                        "settled_ms": settled_ms,
                    }),
                );
                DiagnosisState::Failed(err)
            }
        };
        &self.state
    }

    pub fn submit(&mut self, artifact: ImageArtifact) -> Result<&DiagnosisState, ScanError> {
        self.begin(artifact)?;
        Ok(self.finish())
    }

    /// Back to `Idle`, discarding the artifact and its preview.
    pub fn reset(&mut self) -> Result<(), ScanError> {
        if self.is_submitting() {
            return Err(ScanError::SubmissionInFlight);
        }
        let previous = self.state.as_str();
        self.state = DiagnosisState::Idle;
        self.artifact = None;
        self.started_at = None;
        self.emit(EventKind::DiagnosisReset, json!({ "previous_state": previous }));
        Ok(())
    }

    fn emit(&self, kind: EventKind, payload: Value) {
        emit_quiet(self.events.as_ref(), kind, payload);
    }
}

/// Maps a raw `/predict` reply to the result or the user-facing rejection.
pub fn interpret_reply(reply: &TransportReply) -> Result<DiagnosisResult, ScanError> {
    if !reply.is_success() {
        return Err(ScanError::RequestRejected(rejection_message(
            reply.status,
            &reply.body,
        )));
    }
    DiagnosisResult::from_json(&reply.body)
}

fn unreachable_backend(endpoint: &str, err: &anyhow::Error) -> ScanError {
    ScanError::TransportFailure(format!(
        "Could not reach the diagnosis server at {endpoint}. Is the backend running? ({})",
        error_chain_text(err, 240)
    ))
}
