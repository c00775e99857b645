// SPDX-License-Identifier: GPL-3.0-only

//! Capture operations handlers
//!
//! Stills, recordings, the storage hand-off and the size limit.

use crate::backends::camera::{CaptureMode, HardwareResult, RecordedVideo, RecordingState};
use crate::collaborators::AlertKey;
use crate::constants::timing;
use crate::errors::{CaptureError, StorageError};
use crate::pipelines::{
    ArtifactKind, ArtifactParts, CaptureEvent, CaptureRequest, CaptureTicket, CapturedArtifact,
    StillPath, StopReason,
};
use crate::session::{Dispatch, IgnoreReason, Message, SessionController, SessionEvent};
use crate::storage::StorageCondition;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SessionController {
    // =========================================================================
    // Capture Operations Handlers
    // =========================================================================

    /// Capture in the current mode
    ///
    /// Picture mode takes a still. Video mode starts a recording, or takes a
    /// dual-shutter still while one is running.
    pub fn capture(&mut self) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        match self.camera.recording_state() {
            RecordingState::Recording => return self.capture_still(),
            RecordingState::Starting | RecordingState::Stopping => {
                return Dispatch::Ignored(IgnoreReason::InFlight);
            }
            RecordingState::Idle => {}
        }
        match self.settings.desired().mode {
            CaptureMode::Picture => self.capture_still(),
            CaptureMode::Video => self.start_recording(),
        }
    }

    /// Start or stop recording
    pub fn toggle_recording(&mut self) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        match self.camera.recording_state() {
            RecordingState::Idle => self.start_recording(),
            RecordingState::Recording => {
                if self.stop_recording_for(StopReason::User) {
                    self.refresh_state();
                    Dispatch::Dispatched
                } else {
                    Dispatch::Ignored(IgnoreReason::NotRecording)
                }
            }
            RecordingState::Starting | RecordingState::Stopping => {
                Dispatch::Ignored(IgnoreReason::InFlight)
            }
        }
    }

    fn capture_still(&mut self) -> Dispatch {
        if !self.collaborators.activity.allowed_kinds().allows(ArtifactKind::Image) {
            info!("Still capture not allowed by activity");
            return Dispatch::Ignored(IgnoreReason::KindNotAllowed);
        }

        match self.submit(&CaptureRequest::still(self.position)) {
            Ok(()) => {
                self.refresh_state();
                Dispatch::Dispatched
            }
            Err(CaptureError::CaptureInProgress) => Dispatch::Ignored(IgnoreReason::InFlight),
            Err(CaptureError::RecordingConflict(reason)) => {
                debug!(reason, "Still capture rejected while recording");
                Dispatch::Ignored(IgnoreReason::Recording)
            }
            Err(e) => {
                warn!(error = %e, "Still capture failed to start");
                self.emit(SessionEvent::Error(e.into()));
                Dispatch::Ignored(IgnoreReason::Failed)
            }
        }
    }

    fn start_recording(&mut self) -> Dispatch {
        if self.settings.desired().mode != CaptureMode::Video {
            return Dispatch::Ignored(IgnoreReason::WrongMode);
        }
        if !self.collaborators.activity.allowed_kinds().allows(ArtifactKind::Video) {
            info!("Recording not allowed by activity");
            return Dispatch::Ignored(IgnoreReason::KindNotAllowed);
        }
        if self.pipeline.is_capturing() {
            return Dispatch::Ignored(IgnoreReason::InFlight);
        }

        match self.submit(&CaptureRequest::video_start(self.position)) {
            Ok(()) => {
                self.refresh_state();
                Dispatch::Dispatched
            }
            Err(CaptureError::AlreadyRecording) => Dispatch::Ignored(IgnoreReason::Recording),
            Err(e) => {
                warn!(error = %e, "Recording failed to start");
                self.emit(SessionEvent::Error(e.into()));
                Dispatch::Ignored(IgnoreReason::Failed)
            }
        }
    }

    /// Stop a running recording; false if none was running
    pub(crate) fn stop_recording_for(&mut self, reason: StopReason) -> bool {
        if self.camera.recording_state() != RecordingState::Recording {
            return false;
        }
        match self.submit(&CaptureRequest::video_stop(reason)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, reason = ?reason, "Failed to stop recording");
                false
            }
        }
    }

    /// Hand a request to the pipeline and queue the hardware work it starts
    fn submit(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        match self.pipeline.capture(&mut self.camera, request)? {
            CaptureTicket::Still(ticket) => {
                if ticket.path == StillPath::Dual {
                    self.collaborators.presentation.flash_acknowledge();
                }
                let generation = ticket.generation;
                self.perform(ticket.future, move |result| Message::StillCaptured {
                    generation,
                    result,
                });
            }
            CaptureTicket::VideoStart(future) => self.perform(future, Message::RecordingStarted),
            CaptureTicket::VideoStop(future) => {
                self.ticker = None;
                self.perform(future, Message::RecordingStopped);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_still_captured(&mut self, generation: u64, result: HardwareResult<Vec<u8>>) {
        match self.pipeline.complete_still(generation, result) {
            Ok(Some((artifact, path))) => self.persist(artifact, Some(path)),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Still capture failed");
                self.emit(SessionEvent::Error(e.into()));
                self.resume_preview_after_still();
            }
        }
        if !self.camera.recording_state().is_active() {
            self.apply_pending_camera();
        }
    }

    pub(crate) fn handle_recording_started(&mut self, result: HardwareResult<()>) {
        match self.pipeline.complete_start(&mut self.camera, result) {
            Ok(true) => {
                let start = tokio::time::Instant::now() + timing::RECORDING_TICK;
                self.ticker = Some(tokio::time::interval_at(start, timing::RECORDING_TICK));
                if self.tearing_down {
                    self.stop_recording_for(StopReason::Teardown);
                }
            }
            Ok(false) => debug!("Recording start arrived after release"),
            Err(e) => {
                self.emit(SessionEvent::Error(e.into()));
                if self.tearing_down {
                    self.finish_teardown();
                } else {
                    self.apply_pending_camera();
                }
            }
        }
    }

    pub(crate) fn handle_recording_stopped(&mut self, result: HardwareResult<RecordedVideo>) {
        self.ticker = None;
        match self.pipeline.complete_stop(&mut self.camera, result) {
            Ok(Some(artifact)) => self.persist(artifact, None),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Recording could not be finalized");
                self.emit(SessionEvent::Error(e.into()));
            }
        }

        if self.tearing_down {
            self.finish_teardown();
        } else {
            self.apply_pending_camera();
        }
    }

    /// Recording reached the artifact size limit
    pub(crate) fn handle_size_limit_reached(&mut self) {
        info!(limit = ?self.pipeline.max_artifact_size(), "Recording reached maximum file size");
        self.pipeline.emit(CaptureEvent::FileSizeLimitReached);
        self.show_alert(AlertKey::FileSizeLimitReached);
        self.stop_recording_for(StopReason::SizeLimit);
    }

    // =========================================================================
    // Storage Hand-off
    // =========================================================================

    /// Hand an artifact to storage; there are no retries
    fn persist(&mut self, artifact: CapturedArtifact, still_path: Option<StillPath>) {
        let parts = artifact.into_parts();
        let hint = self.collaborators.activity.file_name_hint();
        info!(kind = %parts.kind, bytes = parts.blob.len(), "Handing artifact to storage");

        let future = self
            .collaborators
            .storage
            .persist(Arc::clone(&parts.blob), parts.kind, hint);
        let generation = self.teardown_generation;
        self.spawn(Box::pin(async move {
            let result = future.await;
            Some(Message::Persisted {
                generation,
                parts,
                still_path,
                result,
            })
        }));
    }

    /// Storage finished with an artifact
    ///
    /// In secure mode an artifact that outlived a teardown is stored but
    /// stays out of the filmstrip the teardown cleared.
    pub(crate) fn handle_persisted(
        &mut self,
        generation: u64,
        parts: ArtifactParts,
        still_path: Option<StillPath>,
        result: Result<PathBuf, StorageError>,
    ) {
        match result {
            Ok(path) => {
                let torn_down = generation != self.teardown_generation;
                if self.config.secure_mode && torn_down {
                    info!(
                        path = %path.display(),
                        "Secure mode, artifact persisted after teardown stays out of filmstrip"
                    );
                } else if !self.collaborators.activity.is_active() {
                    let filmstrip = &self.collaborators.filmstrip;
                    match parts.kind {
                        ArtifactKind::Image => filmstrip.add_image(&path, &parts.meta),
                        ArtifactKind::Video => {
                            filmstrip.add_video(&path, parts.poster.as_deref(), &parts.meta)
                        }
                    }
                }
                self.pipeline.announce(path, &parts);
                self.check_storage();
            }
            Err(e) => {
                warn!(kind = %parts.kind, error = %e, "Artifact dropped");
                self.report_storage(StorageCondition::from(&e));
                self.emit(SessionEvent::Error(e.into()));
            }
        }

        if still_path == Some(StillPath::Plain) {
            self.resume_preview_after_still();
        }
    }

    /// Plain stills freeze the preview; inside an activity it stays frozen
    /// so the user can confirm the picture
    fn resume_preview_after_still(&mut self) {
        if self.collaborators.activity.is_active() {
            debug!("Activity session, preview stays frozen");
            return;
        }
        if !self.camera.is_acquired() || self.camera.recording_state().is_active() {
            return;
        }
        if let Err(e) = self.camera.resume_preview() {
            warn!(error = %e, "Failed to resume preview");
        }
    }
}
