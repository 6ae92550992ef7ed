use krishi_contracts::artifacts::{ArtifactOrigin, ImageArtifact};
use krishi_contracts::diagnosis::{present, DisplayModel};
use krishi_contracts::errors::ScanError;

use crate::camera::CameraSession;
use crate::clock::{Clock, SystemClock};
use crate::pipeline::{DiagnosisPipeline, DiagnosisState};
use crate::source::{accept_file, DropZone, FileHandle};
use crate::transport::DiagnosisTransport;

/// The capture-and-diagnose screen: three ways in, one pipeline out.
///
/// Input problems (wrong file type, camera failure) are parked in
/// `input_error` and never touch the pipeline state.
pub struct ScanFlow<T, C = SystemClock> {
    pipeline: DiagnosisPipeline<T, C>,
    drop_zone: DropZone,
    input_error: Option<ScanError>,
}

impl<T: DiagnosisTransport, C: Clock> ScanFlow<T, C> {
    pub fn new(pipeline: DiagnosisPipeline<T, C>) -> Self {
        Self {
            pipeline,
            drop_zone: DropZone::new(),
            input_error: None,
        }
    }

    pub fn pipeline(&self) -> &DiagnosisPipeline<T, C> {
        &self.pipeline
    }

    pub fn state(&self) -> &DiagnosisState {
        self.pipeline.state()
    }

    pub fn input_error(&self) -> Option<&ScanError> {
        self.input_error.as_ref()
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    pub fn drop_zone_mut(&mut self) -> &mut DropZone {
        &mut self.drop_zone
    }

    pub fn select_file(&mut self, handle: &FileHandle) -> &DiagnosisState {
        let accepted = accept_file(handle, ArtifactOrigin::FilePicker);
        self.submit_selection(accepted)
    }

    pub fn drop_file(&mut self, handle: Option<&FileHandle>) -> &DiagnosisState {
        match self.drop_zone.drop_file(handle) {
            Some(accepted) => self.submit_selection(accepted),
            None => self.pipeline.state(),
        }
    }

    /// Snapshots the live camera, closes it, and submits the frame.
    pub fn capture(&mut self, session: CameraSession) -> &DiagnosisState {
        let captured = session.snapshot_and_close();
        self.submit_selection(captured)
    }

    /// Display model for a successful diagnosis.
    pub fn display(&self) -> Option<DisplayModel> {
        self.pipeline.result().map(present)
    }

    pub fn reset(&mut self) -> Result<(), ScanError> {
        self.pipeline.reset()?;
        self.input_error = None;
        Ok(())
    }

    /// Submits a selection validated elsewhere, typically the result
    /// received from [`crate::source::spawn_accept_file`]. A rejected
    /// selection lands in `input_error` like any other input problem.
    pub fn submit_selection(
        &mut self,
        accepted: Result<ImageArtifact, ScanError>,
    ) -> &DiagnosisState {
        let artifact = match accepted {
            Ok(artifact) => artifact,
            Err(err) => {
                self.input_error = Some(err);
                return self.pipeline.state();
            }
        };
        self.input_error = None;
        if let Err(err) = self.pipeline.submit(artifact) {
            self.input_error = Some(err);
        }
        self.pipeline.state()
    }
}
