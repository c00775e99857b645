// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines for stills and recordings
//!
//! ```text
//! ┌────────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ CaptureRequest │ ──▶ │  Photo Pipeline   │ ──▶ │   Artifact   │ ──▶ Storage
//! │                │     │  - plain / dual   │     │  (size       │
//! │                │     │  - in-flight guard│     │   checked)   │
//! └────────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌────────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ CaptureRequest │ ──▶ │  Video Pipeline   │ ──▶ │   Artifact   │ ──▶ Storage
//! │                │     │  - temp file      │     │  + poster    │
//! │                │     │  - size budget    │     │              │
//! └────────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! The pipeline never holds the camera handle. It drives the
//! [`CameraResource`] it is given and keeps its own bookkeeping: the still
//! in flight, the active recording and the artifact size limit.
//!
//! # Modules
//!
//! - [`photo`]: Still capture, plain and dual-shutter paths
//! - [`video`]: Recording lifecycle, size governance and posters

pub mod photo;
pub mod video;

pub use photo::{StillPath, StillTicket};
pub use video::{ActiveRecording, encode_poster};

use crate::backends::camera::{
    CameraId, CameraResource, CaptureMode, GeoPosition, HardwareFuture, RecordedVideo,
};
use crate::config::Config;
use crate::constants::DualShotBudget;
use crate::errors::CaptureError;
use crate::events::EventChannel;
use crate::storage::StorageCondition;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// What a persisted artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

impl ArtifactKind {
    /// Artifact kind produced in a capture mode
    pub fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Picture => ArtifactKind::Image,
            CaptureMode::Video => ArtifactKind::Video,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Still,
    VideoStart,
    VideoStop(StopReason),
}

/// A capture as requested by the session
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub kind: CaptureKind,
    pub position_hint: Option<GeoPosition>,
    pub timestamp: DateTime<Local>,
}

impl CaptureRequest {
    fn new(kind: CaptureKind, position_hint: Option<GeoPosition>) -> Self {
        Self {
            kind,
            position_hint,
            timestamp: Local::now(),
        }
    }

    pub fn still(position_hint: Option<GeoPosition>) -> Self {
        Self::new(CaptureKind::Still, position_hint)
    }

    pub fn video_start(position_hint: Option<GeoPosition>) -> Self {
        Self::new(CaptureKind::VideoStart, position_hint)
    }

    pub fn video_stop(reason: StopReason) -> Self {
        Self::new(CaptureKind::VideoStop(reason), None)
    }
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// User toggled recording off
    User,
    /// Maximum artifact size reached
    SizeLimit,
    /// Session blurred or torn down
    Teardown,
    /// Recorder reported a write failure
    FileError,
}

/// Metadata travelling with an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMeta {
    pub camera: CameraId,
    pub captured_at: DateTime<Local>,
    pub position: Option<GeoPosition>,
    pub width: u32,
    pub height: u32,
}

impl ArtifactMeta {
    /// Dimensions come from the picture size or recorder profile in use
    pub fn new(camera: &CameraResource, kind: ArtifactKind, request: &CaptureRequest) -> Self {
        let settings = camera.applied_settings();
        let (width, height) = match kind {
            ArtifactKind::Image => settings
                .picture_size
                .map(|size| (size.width, size.height))
                .unwrap_or_default(),
            ArtifactKind::Video => settings
                .recorder_profile
                .as_deref()
                .and_then(|name| camera.capabilities()?.recorder_profile(name))
                .map(|profile| (profile.width, profile.height))
                .unwrap_or_default(),
        };
        Self {
            camera: camera.selected().clone(),
            captured_at: request.timestamp,
            position: request.position_hint,
            width,
            height,
        }
    }
}

/// Captured media waiting for storage
///
/// Not `Clone`: the blob is handed to storage exactly once through
/// [`CapturedArtifact::into_parts`].
#[derive(Debug)]
pub struct CapturedArtifact {
    blob: Arc<[u8]>,
    kind: ArtifactKind,
    poster: Option<Arc<[u8]>>,
    meta: ArtifactMeta,
}

/// Pieces of a consumed artifact
#[derive(Debug)]
pub struct ArtifactParts {
    pub blob: Arc<[u8]>,
    pub kind: ArtifactKind,
    pub poster: Option<Arc<[u8]>>,
    pub meta: ArtifactMeta,
}

impl CapturedArtifact {
    /// Accept a blob, rejecting it when it is larger than `limit`
    pub fn new(
        blob: Vec<u8>,
        kind: ArtifactKind,
        poster: Option<Vec<u8>>,
        meta: ArtifactMeta,
        limit: Option<u64>,
    ) -> Result<Self, CaptureError> {
        let size = blob.len() as u64;
        if let Some(limit) = limit
            && size > limit
        {
            return Err(CaptureError::SizeLimitExceeded { size, limit });
        }
        Ok(Self {
            blob: blob.into(),
            kind,
            poster: poster.map(Into::into),
            meta,
        })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn size_bytes(&self) -> u64 {
        self.blob.len() as u64
    }

    pub fn poster(&self) -> Option<&[u8]> {
        self.poster.as_deref()
    }

    pub fn meta(&self) -> &ArtifactMeta {
        &self.meta
    }

    pub fn into_parts(self) -> ArtifactParts {
        ArtifactParts {
            blob: self.blob,
            kind: self.kind,
            poster: self.poster,
            meta: self.meta,
        }
    }
}

/// Events emitted by the capture pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Shutter,
    /// Visual acknowledgment of a dual-shutter still
    DualShutterFlash,
    RecordingStart { path: PathBuf },
    RecordingEnd { reason: StopReason, elapsed: Duration },
    TimeUpdate(Duration),
    NewImage {
        path: PathBuf,
        blob: Arc<[u8]>,
        meta: ArtifactMeta,
    },
    NewVideo {
        path: PathBuf,
        blob: Arc<[u8]>,
        poster: Option<Arc<[u8]>>,
        meta: ArtifactMeta,
    },
    FileSizeLimitReached,
    StorageCondition(StorageCondition),
}

/// Hardware operation started by [`CapturePipeline::capture`]
pub enum CaptureTicket {
    Still(StillTicket),
    VideoStart(HardwareFuture<()>),
    VideoStop(HardwareFuture<RecordedVideo>),
}

pub struct CapturePipeline {
    dual_shutter: bool,
    dual_shot_budget: DualShotBudget,
    max_artifact_size: Option<u64>,
    temp_dir: PathBuf,
    still: Option<photo::StillInFlight>,
    still_generation: u64,
    recording: Option<ActiveRecording>,
    events: EventChannel<CaptureEvent>,
}

impl CapturePipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            dual_shutter: config.dual_shutter,
            dual_shot_budget: config.dual_shot_budget,
            max_artifact_size: None,
            temp_dir: config.temp_dir(),
            still: None,
            still_generation: 0,
            recording: None,
            events: EventChannel::new(),
        }
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&mut self, event: CaptureEvent) {
        self.events.emit(event);
    }

    /// Dispatch a request to the still or recording path
    pub fn capture(
        &mut self,
        camera: &mut CameraResource,
        request: &CaptureRequest,
    ) -> Result<CaptureTicket, CaptureError> {
        match request.kind {
            CaptureKind::Still => self.capture_still(camera, request).map(CaptureTicket::Still),
            CaptureKind::VideoStart => self
                .start_recording(camera, request)
                .map(CaptureTicket::VideoStart),
            CaptureKind::VideoStop(reason) => self
                .stop_recording(camera, reason)
                .map(CaptureTicket::VideoStop),
        }
    }

    pub fn max_artifact_size(&self) -> Option<u64> {
        self.max_artifact_size
    }

    pub fn set_max_artifact_size(&mut self, bytes: Option<u64>) {
        self.max_artifact_size = bytes;
    }

    /// A still is in flight
    pub fn is_capturing(&self) -> bool {
        self.still.is_some()
    }

    /// Announce an artifact storage accepted
    pub fn announce(&mut self, path: PathBuf, parts: &ArtifactParts) {
        let event = match parts.kind {
            ArtifactKind::Image => CaptureEvent::NewImage {
                path,
                blob: parts.blob.clone(),
                meta: parts.meta.clone(),
            },
            ArtifactKind::Video => CaptureEvent::NewVideo {
                path,
                blob: parts.blob.clone(),
                poster: parts.poster.clone(),
                meta: parts.meta.clone(),
            },
        };
        self.events.emit(event);
    }

    pub fn report_storage(&mut self, condition: StorageCondition) {
        self.events.emit(CaptureEvent::StorageCondition(condition));
    }
}
