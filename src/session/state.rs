// SPDX-License-Identifier: GPL-3.0-only

//! Session state, events and messages

use crate::backends::camera::{
    CameraHardware, CameraId, CameraSettings, CaptureMode, FocusRegion, GeoPosition, HardwareEvent,
    HardwareResult, RecordedVideo,
};
use crate::errors::{SessionError, StorageError};
use crate::pipelines::{ArtifactParts, StillPath};
use crate::settings::SettingChange;
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No camera handle
    #[default]
    Unloaded,
    /// Acquire in flight
    Loading,
    Ready,
    /// A configuration, still capture or focus cycle is in flight
    Busy,
    /// Recording is starting, running or stopping
    Recording,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unloaded => write!(f, "unloaded"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Busy => write!(f, "busy"),
            SessionState::Recording => write!(f, "recording"),
        }
    }
}

/// What happened to a public operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Started, or applied synchronously
    Dispatched,
    /// Queued until the session can honour it
    Deferred,
    /// Not applicable in the current state; nothing changed
    Ignored(IgnoreReason),
}

impl Dispatch {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Dispatch::Dispatched)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Unloaded,
    AlreadyLoaded,
    /// Same kind of operation already in flight
    InFlight,
    Recording,
    NotRecording,
    /// The activity does not accept this artifact kind
    KindNotAllowed,
    /// Operation belongs to the other capture mode
    WrongMode,
    TearingDown,
    UnknownCamera,
    /// The camera lacks the capability
    Unsupported,
    Unchanged,
    /// Rejected by the camera or pipeline; the error was emitted
    Failed,
}

/// Events emitted by the session controller
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Ready,
    Busy,
    /// A failure the session recovered from
    Error(SessionError),
    /// Storage answered its first health check; location may be watched now
    StorageReady { watch_location: bool },
}

/// Completions and notifications fed back into the session
#[derive(Debug)]
pub enum Message {
    Acquired {
        generation: u64,
        result: HardwareResult<Arc<dyn CameraHardware>>,
    },
    Configured {
        generation: u64,
        settings: CameraSettings,
        result: HardwareResult<()>,
    },
    AutoFocusDone {
        generation: u64,
        result: HardwareResult<bool>,
    },
    FocusHoldElapsed {
        generation: u64,
    },
    StillCaptured {
        generation: u64,
        result: HardwareResult<Vec<u8>>,
    },
    RecordingStarted(HardwareResult<()>),
    RecordingStopped(HardwareResult<RecordedVideo>),
    Persisted {
        /// Teardown generation when the artifact was handed over
        generation: u64,
        parts: ArtifactParts,
        still_path: Option<StillPath>,
        result: Result<PathBuf, StorageError>,
    },
    TeardownDeadline {
        generation: u64,
    },
    Hardware(HardwareEvent),
    Tick,
}

/// Requests accepted by [`super::SessionController::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load,
    Focus,
    Blur,
    Teardown,
    Capture,
    ToggleRecording,
    ChangeCamera(CameraId),
    ToggleCamera,
    ChangeMode(CaptureMode),
    ChangeSetting(SettingChange),
    ToggleFlash,
    SetZoom(f32),
    SetFocusArea(FocusRegion),
    FocusAt { x: f32, y: f32 },
    TriggerAutoFocus,
    DismissAlert,
    UpdatePosition(Option<GeoPosition>),
}
