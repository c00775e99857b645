// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle handlers
//!
//! Load, focus, blur and teardown. Teardown waits for a recording it has to
//! stop (bounded by the configured stop timeout) and then releases
//! everything in one pass.

use crate::backends::camera::{AcquireOutcome, CameraHardware, CameraId, HardwareResult, RecordingState};
use crate::collaborators::AlertKey;
use crate::pipelines::StopReason;
use crate::session::{Dispatch, IgnoreReason, Message, SessionController, SessionEvent};
use crate::storage::StorageCondition;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SessionController {
    // =========================================================================
    // Lifecycle Handlers
    // =========================================================================

    /// Acquire the selected camera
    ///
    /// A load arriving while a teardown is still finishing is replayed once
    /// the teardown completes.
    pub fn load(&mut self) -> Dispatch {
        if self.tearing_down {
            info!("Load requested during teardown, deferring");
            self.reload_after_teardown = true;
            return Dispatch::Deferred;
        }
        if self.camera.is_acquired() || self.camera.is_acquiring() {
            return Dispatch::Ignored(IgnoreReason::AlreadyLoaded);
        }

        let camera = self
            .pending_camera
            .take()
            .unwrap_or_else(|| self.camera.selected().clone());
        let dispatch = self.acquire(camera);
        self.refresh_state();
        dispatch
    }

    pub fn boot(&mut self) -> Dispatch {
        info!("Boot");
        self.load()
    }

    /// Host gained focus: check storage, then load
    pub fn focus(&mut self) -> Dispatch {
        info!("Focus");
        self.check_storage();
        self.load()
    }

    /// Host lost focus: tear down and cancel the activity
    pub fn blur(&mut self) -> Dispatch {
        info!("Blur");
        let dispatch = self.teardown();
        if self.collaborators.activity.is_active() {
            info!("Cancelling activity");
            self.collaborators.activity.cancel();
        }
        dispatch
    }

    /// Release the camera
    ///
    /// Stops a running recording first. While the recorder is starting or
    /// stopping the teardown waits for it, up to the stop timeout.
    pub fn teardown(&mut self) -> Dispatch {
        self.reload_after_teardown = false;
        if self.tearing_down {
            return Dispatch::Ignored(IgnoreReason::TearingDown);
        }
        if !self.camera.is_acquired() && !self.camera.is_acquiring() {
            return Dispatch::Ignored(IgnoreReason::Unloaded);
        }

        let recording = self.camera.recording_state();
        info!(recording = ?recording, "Tearing down camera session");
        if recording == RecordingState::Idle {
            self.finish_teardown();
            return Dispatch::Dispatched;
        }

        self.tearing_down = true;
        self.teardown_generation += 1;
        if recording == RecordingState::Recording {
            self.stop_recording_for(StopReason::Teardown);
        }
        let generation = self.teardown_generation;
        self.perform(tokio::time::sleep(self.config.stop_timeout()), move |()| {
            Message::TeardownDeadline { generation }
        });
        self.refresh_state();
        Dispatch::Deferred
    }

    pub(crate) fn handle_teardown_deadline(&mut self, generation: u64) {
        if !self.tearing_down || generation != self.teardown_generation {
            return;
        }
        warn!(
            timeout_ms = self.config.stop_timeout_ms,
            "Recorder did not settle in time, forcing teardown"
        );
        self.finish_teardown();
    }

    /// Release everything; each step runs even if an earlier one failed
    pub(crate) fn finish_teardown(&mut self) {
        self.tearing_down = false;
        self.teardown_generation += 1;

        if self.pipeline.cancel_still() {
            debug!("Cancelled still capture in flight");
        }
        self.pipeline.abandon_recording();
        self.settings.abandon_in_flight();
        self.ticker = None;

        if let Err(e) = self.camera.stop_preview() {
            debug!(error = %e, "Stop preview during teardown");
        }
        self.collaborators.presentation.render_preview(None);
        self.collaborators.presentation.set_focus_indicator(None);

        let released = self.camera.release();
        self.hardware_events = None;
        self.abandon_hardware_work();
        debug!(released, "Camera released by teardown");

        if self.config.secure_mode {
            info!("Secure mode, clearing filmstrip");
            self.collaborators.filmstrip.clear();
        }
        if let Some(camera) = self.pending_camera.take() {
            info!(camera = %camera, "Applying deferred camera change");
            self.camera.select(camera);
        }
        self.refresh_state();

        if std::mem::take(&mut self.reload_after_teardown) {
            info!("Replaying load deferred during teardown");
            self.load();
        }
    }

    /// Start acquiring `camera`, releasing the current handle first
    pub(crate) fn acquire(&mut self, camera: CameraId) -> Dispatch {
        self.settings.abandon_in_flight();
        self.hardware_events = None;
        self.abandon_hardware_work();
        match self.camera.acquire(camera) {
            Ok(ticket) => {
                let generation = ticket.generation;
                self.perform(ticket.future, move |result| Message::Acquired { generation, result });
                Dispatch::Dispatched
            }
            Err(e) => {
                warn!(error = %e, "Acquire rejected");
                self.emit(SessionEvent::Error(e.into()));
                Dispatch::Ignored(IgnoreReason::UnknownCamera)
            }
        }
    }

    pub(crate) fn handle_acquired(
        &mut self,
        generation: u64,
        result: HardwareResult<Arc<dyn CameraHardware>>,
    ) {
        match self.camera.complete_acquire(generation, result) {
            Ok(AcquireOutcome::Stale) => debug!(generation, "Ignoring superseded acquire"),
            Ok(AcquireOutcome::Acquired(events)) => {
                self.hardware_events = events;
                if let Some(capabilities) = self.camera.capabilities().cloned() {
                    self.settings.adopt_capabilities(&capabilities);
                }
                self.settings.prepare_for_new_handle();
                self.preview_stale = true;

                if let Err(e) = self.camera.start_preview() {
                    warn!(error = %e, "Failed to start preview");
                }
                self.collaborators
                    .presentation
                    .set_zoom_indicator(self.camera.zoom().current);
                self.apply_settings();
            }
            Err(e) => {
                warn!(error = %e, "Camera could not be acquired");
                self.show_alert(AlertKey::CameraUnavailable);
                self.emit(SessionEvent::Error(e.into()));
            }
        }
    }

    /// Ask storage whether it can take artifacts
    ///
    /// The first healthy answer emits [`SessionEvent::StorageReady`] once.
    pub(crate) fn check_storage(&mut self) {
        let health = self.collaborators.storage.check_health();
        match health.condition() {
            Some(condition) => {
                warn!(health = ?health, "Storage not healthy");
                self.report_storage(condition);
            }
            None if !self.storage_ready_sent => {
                self.storage_ready_sent = true;
                let watch_location = !self.collaborators.activity.is_active();
                debug!(watch_location, "Storage ready");
                self.emit(SessionEvent::StorageReady { watch_location });
            }
            None => {}
        }
    }

    pub(crate) fn report_storage(&mut self, condition: StorageCondition) {
        let alert = match condition {
            StorageCondition::Full => AlertKey::StorageFull,
            StorageCondition::Unavailable => AlertKey::StorageUnavailable,
            StorageCondition::Error(_) => AlertKey::StorageError,
        };
        self.show_alert(alert);
        self.pipeline.report_storage(condition);
    }

    /// Show an alert unless one is already up
    pub(crate) fn show_alert(&mut self, alert: AlertKey) -> bool {
        if let Some(visible) = self.alert_visible {
            debug!(visible = ?visible, requested = ?alert, "Alert already visible");
            return false;
        }
        self.alert_visible = Some(alert);
        self.collaborators.presentation.show_alert(alert);
        true
    }

    pub fn dismiss_alert(&mut self) -> Dispatch {
        match self.alert_visible.take() {
            Some(alert) => {
                self.collaborators.presentation.hide_alert(alert);
                Dispatch::Dispatched
            }
            None => Dispatch::Ignored(IgnoreReason::Unchanged),
        }
    }
}
