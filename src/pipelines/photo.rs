// SPDX-License-Identifier: GPL-3.0-only

//! Still capture
//!
//! Two paths:
//! - **Plain**: camera idle; the preview freezes around the shutter and is
//!   resumed by the session once the still is handled
//! - **Dual**: recording with dual shutter enabled; the recording keeps
//!   running and a flash acknowledgment is emitted instead

use super::{ArtifactKind, ArtifactMeta, CaptureEvent, CapturePipeline, CaptureRequest, CapturedArtifact};
use crate::backends::camera::{CameraResource, HardwareFuture, HardwareResult, PictureRequest, RecordingState};
use crate::constants::DualShotBudget;
use crate::errors::CaptureError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillPath {
    Plain,
    Dual,
}

/// In-flight still capture
pub struct StillTicket {
    pub generation: u64,
    pub path: StillPath,
    pub future: HardwareFuture<Vec<u8>>,
}

#[derive(Debug)]
pub(crate) struct StillInFlight {
    generation: u64,
    path: StillPath,
    meta: ArtifactMeta,
}

impl CapturePipeline {
    /// Start a still capture
    ///
    /// Only one still may be in flight. While recording, stills are only
    /// possible through the dual-shutter path.
    pub fn capture_still(
        &mut self,
        camera: &mut CameraResource,
        request: &CaptureRequest,
    ) -> Result<StillTicket, CaptureError> {
        if !camera.is_acquired() {
            return Err(CaptureError::NotAcquired);
        }
        if self.still.is_some() {
            debug!("Still capture rejected, one already in flight");
            return Err(CaptureError::CaptureInProgress);
        }

        let path = match camera.recording_state() {
            RecordingState::Idle => StillPath::Plain,
            RecordingState::Recording if self.dual_shutter => StillPath::Dual,
            RecordingState::Recording => {
                return Err(CaptureError::RecordingConflict(
                    "still capture while recording requires dual shutter",
                ));
            }
            RecordingState::Starting | RecordingState::Stopping => {
                return Err(CaptureError::RecordingConflict("recording is starting or stopping"));
            }
        };

        let future = camera.take_picture(PictureRequest {
            position: request.position_hint,
            pause_preview: path == StillPath::Plain,
            timestamp: request.timestamp,
        })?;

        self.still_generation += 1;
        self.still = Some(StillInFlight {
            generation: self.still_generation,
            path,
            meta: ArtifactMeta::new(camera, ArtifactKind::Image, request),
        });
        if path == StillPath::Dual {
            self.emit(CaptureEvent::DualShutterFlash);
        }

        info!(camera = %camera.selected(), path = ?path, "Still capture started");
        Ok(StillTicket {
            generation: self.still_generation,
            path,
            future,
        })
    }

    /// Path of the still in flight, if any
    pub fn still_path(&self) -> Option<StillPath> {
        self.still.as_ref().map(|still| still.path)
    }

    /// Turn the hardware result into an artifact
    ///
    /// `Ok(None)` when the still was cancelled before the result arrived.
    pub fn complete_still(
        &mut self,
        generation: u64,
        result: HardwareResult<Vec<u8>>,
    ) -> Result<Option<(CapturedArtifact, StillPath)>, CaptureError> {
        if self.still.as_ref().is_none_or(|still| still.generation != generation) {
            debug!(generation, "Dropping result of cancelled still capture");
            return Ok(None);
        }
        let Some(still) = self.still.take() else {
            return Ok(None);
        };

        let blob = result.map_err(|e| {
            warn!(error = %e, "Still capture failed");
            CaptureError::from(e)
        })?;

        if still.path == StillPath::Dual
            && self.dual_shot_budget == DualShotBudget::SharedWithRecording
            && let Some(recording) = self.recording.as_mut()
        {
            recording.add_still_bytes(blob.len() as u64);
        }

        let artifact = CapturedArtifact::new(
            blob,
            ArtifactKind::Image,
            None,
            still.meta,
            self.max_artifact_size,
        )
        .inspect_err(|e| warn!(error = %e, "Still rejected"))?;

        debug!(size = artifact.size_bytes(), "Still captured");
        Ok(Some((artifact, still.path)))
    }

    /// Forget the still in flight; its result will be dropped
    pub fn cancel_still(&mut self) -> bool {
        self.still.take().is_some()
    }
}
