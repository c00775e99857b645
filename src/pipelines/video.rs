// SPDX-License-Identifier: GPL-3.0-only

//! Recording lifecycle
//!
//! `Idle -> Starting -> Recording -> Stopping -> Idle`, with the transitions
//! held by the camera resource and the bookkeeping (temp file, elapsed clock,
//! size budget) held here.
//!
//! The recorder writes into a temporary file and is told the artifact size
//! limit. Progress reports and the recorder's own limit notification both go
//! through [`CapturePipeline::observe_progress`] /
//! [`CapturePipeline::mark_limit_reached`], which report the breach once per
//! recording no matter how many notifications arrive.

use super::{
    ArtifactKind, ArtifactMeta, CaptureEvent, CapturePipeline, CaptureRequest, CapturedArtifact,
    StopReason,
};
use crate::backends::camera::{
    CameraResource, HardwareFuture, HardwareResult, RawFrame, RecordedVideo, RecordingRequest,
    RecordingState,
};
use crate::constants::{file_formats, sizing};
use crate::errors::CaptureError;
use chrono::Local;
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, ImageError, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Bookkeeping for the recording in progress
#[derive(Debug)]
pub struct ActiveRecording {
    temp_path: PathBuf,
    started_at: Option<Instant>,
    limit: Option<u64>,
    recorded_bytes: u64,
    still_bytes: u64,
    limit_reached: bool,
    stop_reason: Option<StopReason>,
    meta: ArtifactMeta,
}

impl ActiveRecording {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Time since the recorder confirmed the start
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Bytes counted against the limit
    pub fn consumed_bytes(&self) -> u64 {
        self.recorded_bytes + self.still_bytes
    }

    pub(super) fn add_still_bytes(&mut self, bytes: u64) {
        self.still_bytes += bytes;
    }

    /// Flag the limit as reached; true only the first time
    fn reach_limit(&mut self) -> bool {
        !std::mem::replace(&mut self.limit_reached, true)
    }
}

impl CapturePipeline {
    /// Idle -> Starting
    pub fn start_recording(
        &mut self,
        camera: &mut CameraResource,
        request: &CaptureRequest,
    ) -> Result<HardwareFuture<()>, CaptureError> {
        if !camera.is_acquired() {
            return Err(CaptureError::NotAcquired);
        }
        if camera.recording_state() != RecordingState::Idle || self.recording.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let temp_path = self.temp_path();
        let future = camera.begin_recording(RecordingRequest {
            path: temp_path.clone(),
            max_file_size_bytes: self.max_artifact_size,
            position: request.position_hint,
        })?;

        info!(path = %temp_path.display(), limit = ?self.max_artifact_size, "Starting recording");
        self.recording = Some(ActiveRecording {
            temp_path,
            started_at: None,
            limit: self.max_artifact_size,
            recorded_bytes: 0,
            still_bytes: 0,
            limit_reached: false,
            stop_reason: None,
            meta: ArtifactMeta::new(camera, ArtifactKind::Video, request),
        });
        Ok(future)
    }

    /// Starting -> Recording, or back to Idle on failure
    ///
    /// `Ok(false)` when the camera was released while starting.
    pub fn complete_start(
        &mut self,
        camera: &mut CameraResource,
        result: HardwareResult<()>,
    ) -> Result<bool, CaptureError> {
        if !camera.complete_start(result.is_ok()) {
            debug!("Recording start completed after release");
            self.recording = None;
            return Ok(false);
        }
        if let Err(e) = result {
            warn!(error = %e, "Recorder failed to start");
            self.recording = None;
            return Err(e.into());
        }

        let Some(recording) = self.recording.as_mut() else {
            return Ok(false);
        };
        recording.started_at = Some(Instant::now());
        let path = recording.temp_path.clone();
        info!(path = %path.display(), "Recording started");
        self.emit(CaptureEvent::RecordingStart { path });
        Ok(true)
    }

    /// Recording -> Stopping
    pub fn stop_recording(
        &mut self,
        camera: &mut CameraResource,
        reason: StopReason,
    ) -> Result<HardwareFuture<RecordedVideo>, CaptureError> {
        let future = camera.begin_stop()?;
        if let Some(recording) = self.recording.as_mut() {
            recording.stop_reason = Some(reason);
        }
        info!(reason = ?reason, "Stopping recording");
        Ok(future)
    }

    /// Stopping -> Idle, finalizing the recording into an artifact
    ///
    /// `Ok(None)` when the recording was already abandoned.
    pub fn complete_stop(
        &mut self,
        camera: &mut CameraResource,
        result: HardwareResult<RecordedVideo>,
    ) -> Result<Option<CapturedArtifact>, CaptureError> {
        if !camera.complete_stop() {
            debug!("Recording stop completed after release");
        }
        let Some(recording) = self.recording.take() else {
            return Ok(None);
        };

        let reason = recording.stop_reason.unwrap_or(StopReason::User);
        let elapsed = recording.elapsed();
        info!(reason = ?reason, elapsed_secs = elapsed.as_secs(), "Recording ended");
        self.emit(CaptureEvent::RecordingEnd { reason, elapsed });

        let video = result.map_err(|e| {
            warn!(error = %e, "Recorder failed to finalize");
            CaptureError::from(e)
        })?;

        let poster = video.poster.or_else(|| {
            let frame = video.last_frame.as_ref()?;
            encode_poster(frame)
                .inspect_err(|e| warn!(error = %e, "Failed to encode poster from last frame"))
                .ok()
        });

        CapturedArtifact::new(video.blob, ArtifactKind::Video, poster, recording.meta, recording.limit)
            .inspect_err(|e| warn!(error = %e, "Recording rejected"))
            .map(Some)
    }

    /// Record a progress report; true the first time the limit is reached
    pub fn observe_progress(&mut self, bytes: u64) -> bool {
        let Some(recording) = self.recording.as_mut() else {
            return false;
        };
        recording.recorded_bytes = bytes;
        match recording.limit {
            Some(limit) if recording.consumed_bytes() >= limit => {
                debug!(bytes, limit, "Recording reached size limit");
                recording.reach_limit()
            }
            _ => false,
        }
    }

    /// Recorder hit its size limit; true the first time per recording
    pub fn mark_limit_reached(&mut self) -> bool {
        self.recording
            .as_mut()
            .is_some_and(ActiveRecording::reach_limit)
    }

    pub fn active_recording(&self) -> Option<&ActiveRecording> {
        self.recording.as_ref()
    }

    /// Elapsed recording time, if a recording is running
    pub fn elapsed(&self) -> Option<Duration> {
        self.recording
            .as_ref()
            .filter(|recording| recording.started_at.is_some())
            .map(ActiveRecording::elapsed)
    }

    /// Emit the elapsed time
    pub fn tick(&mut self) {
        if let Some(elapsed) = self.elapsed() {
            self.emit(CaptureEvent::TimeUpdate(elapsed));
        }
    }

    /// Forget the recording after the handle was released under it
    pub fn abandon_recording(&mut self) -> bool {
        let Some(recording) = self.recording.take() else {
            return false;
        };
        info!(path = %recording.temp_path.display(), "Recording abandoned");
        self.emit(CaptureEvent::RecordingEnd {
            reason: recording.stop_reason.unwrap_or(StopReason::Teardown),
            elapsed: recording.elapsed(),
        });
        true
    }

    fn temp_path(&self) -> PathBuf {
        let name = format!(
            "{}{}_{}.{}",
            file_formats::VIDEO_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            uuid::Uuid::new_v4().simple(),
            file_formats::VIDEO_EXTENSION
        );
        self.temp_dir.join(name)
    }
}

/// Encode a raw RGBA frame as a JPEG poster
pub fn encode_poster(frame: &RawFrame) -> Result<Vec<u8>, ImageError> {
    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or_else(|| {
        ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::DimensionMismatch))
    })?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, sizing::POSTER_JPEG_QUALITY);
    encoder.encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(buffer)
}
