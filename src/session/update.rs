// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! `update()` routes every completion to a handler method in the
//! `handlers` submodules and then recomputes the session state.

use super::{Message, SessionController, SessionEvent};
use crate::backends::camera::HardwareEvent;
use crate::errors::{CaptureError, SessionError};
use crate::pipelines::{CaptureEvent, StopReason};
use tracing::{debug, warn};

impl SessionController {
    /// Handle one completion or notification
    pub fn update(&mut self, message: Message) {
        match message {
            // ===== Lifecycle =====
            Message::Acquired { generation, result } => self.handle_acquired(generation, result),
            Message::TeardownDeadline { generation } => self.handle_teardown_deadline(generation),

            // ===== Settings =====
            Message::Configured {
                generation,
                settings,
                result,
            } => self.handle_configured(generation, settings, result),

            // ===== Focus =====
            Message::AutoFocusDone { generation, result } => {
                self.handle_auto_focus_done(generation, result)
            }
            Message::FocusHoldElapsed { generation } => self.handle_focus_hold_elapsed(generation),

            // ===== Capture =====
            Message::StillCaptured { generation, result } => {
                self.handle_still_captured(generation, result)
            }
            Message::RecordingStarted(result) => self.handle_recording_started(result),
            Message::RecordingStopped(result) => self.handle_recording_stopped(result),
            Message::Persisted {
                generation,
                parts,
                still_path,
                result,
            } => self.handle_persisted(generation, parts, still_path, result),
            Message::Tick => self.pipeline.tick(),

            // ===== Hardware =====
            Message::Hardware(event) => self.handle_hardware_event(event),
        }
        self.refresh_state();
    }

    fn handle_hardware_event(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::Shutter => self.pipeline.emit(CaptureEvent::Shutter),
            HardwareEvent::RecordingProgress { bytes } => {
                if self.pipeline.observe_progress(bytes) {
                    self.handle_size_limit_reached();
                }
            }
            HardwareEvent::FileSizeLimitReached => {
                if self.pipeline.mark_limit_reached() {
                    self.handle_size_limit_reached();
                } else {
                    debug!("Duplicate file size limit notification");
                }
            }
            HardwareEvent::RecorderError(reason) => {
                warn!(reason = %reason, "Recorder reported an error");
                self.emit(SessionEvent::Error(SessionError::Capture(CaptureError::Hardware(
                    reason,
                ))));
                self.stop_recording_for(StopReason::FileError);
            }
        }
    }
}
