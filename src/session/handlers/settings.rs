// SPDX-License-Identifier: GPL-3.0-only

//! Settings, zoom and camera selection handlers

use crate::backends::camera::{CameraId, CameraSettings, CaptureMode, ConfigureOutcome, HardwareResult};
use crate::collaborators::PreviewDescriptor;
use crate::constants::max_artifact_size;
use crate::session::{Dispatch, IgnoreReason, Message, SessionController, SessionEvent};
use crate::settings::SettingChange;
use tracing::{debug, info, warn};

impl SessionController {
    // =========================================================================
    // Settings Handlers
    // =========================================================================

    /// Switch between picture and video
    ///
    /// Restores the flash mode last used in `mode`. Rejected while recording
    /// and when the activity does not accept the mode's artifact kind.
    pub fn change_mode(&mut self, mode: CaptureMode) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        if self.settings.desired().mode == mode {
            return Dispatch::Ignored(IgnoreReason::Unchanged);
        }
        if self.camera.recording_state().is_active() {
            return Dispatch::Ignored(IgnoreReason::Recording);
        }
        if !self.collaborators.activity.allowed_kinds().allows_mode(mode) {
            info!(mode = %mode, "Mode not allowed by activity");
            return Dispatch::Ignored(IgnoreReason::KindNotAllowed);
        }

        info!(mode = %mode, "Changing capture mode");
        self.settings.on_setting_changed(SettingChange::Mode(mode));
        self.apply_settings();
        self.refresh_state();
        Dispatch::Dispatched
    }

    /// Change one setting; dependent settings follow
    pub fn change_setting(&mut self, change: SettingChange) -> Dispatch {
        if let SettingChange::Mode(mode) = change {
            return self.change_mode(mode);
        }
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }

        let staged = self.settings.on_setting_changed(change);
        info!(changes = ?staged, "Setting changed");
        self.apply_settings();
        self.refresh_state();
        Dispatch::Dispatched
    }

    /// Cycle through the flash modes the camera offers for the current mode
    pub fn toggle_flash(&mut self) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        let Some(capabilities) = self.camera.capabilities() else {
            return Dispatch::Ignored(IgnoreReason::Unloaded);
        };
        let next = self.settings.next_flash(capabilities);
        if next == self.settings.desired().flash {
            return Dispatch::Ignored(IgnoreReason::Unchanged);
        }
        self.change_setting(SettingChange::Flash(next))
    }

    /// Send staged settings to the camera if no batch is in flight
    pub(crate) fn apply_settings(&mut self) {
        match self.settings.reconcile_and_apply(&mut self.camera) {
            Ok(Some(ticket)) => {
                let generation = ticket.generation;
                let settings = ticket.settings;
                self.perform(ticket.future, move |result| Message::Configured {
                    generation,
                    settings,
                    result,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Configuration rejected");
                self.emit(SessionEvent::Error(e.into()));
            }
        }
    }

    pub(crate) fn handle_configured(
        &mut self,
        generation: u64,
        settings: CameraSettings,
        result: HardwareResult<()>,
    ) {
        let previous = self.settings.applied().clone();
        match self
            .camera
            .complete_configuration(generation, settings.clone(), result)
        {
            Ok(ConfigureOutcome::Stale) => {
                debug!(generation, "Ignoring configuration for a released handle");
                self.settings.abandon_in_flight();
            }
            Ok(ConfigureOutcome::Applied) => {
                self.settings.complete_apply(Ok(settings.clone()));
                self.on_configured(&previous, &settings);
                self.apply_settings();
            }
            Err(e) => {
                self.settings.complete_apply(Err(e.clone()));
                self.emit(SessionEvent::Error(e.into()));
                self.apply_settings();
            }
        }
    }

    /// Follow-up of an applied configuration: size limits and preview
    fn on_configured(&mut self, previous: &CameraSettings, applied: &CameraSettings) {
        let limit = self
            .collaborators
            .activity
            .max_file_size_bytes()
            .or_else(|| applied.picture_size.as_ref().map(max_artifact_size));
        self.pipeline.set_max_artifact_size(limit);
        if let Some(limit) = limit {
            self.collaborators.storage.set_max_artifact_size(limit);
        }

        let size_changed = match applied.mode {
            CaptureMode::Picture => previous.picture_size != applied.picture_size,
            CaptureMode::Video => previous.recorder_profile != applied.recorder_profile,
        };
        let mode_changed = previous.mode != applied.mode;
        if std::mem::take(&mut self.preview_stale) || size_changed || mode_changed {
            self.render_preview();
        } else {
            debug!("Configuration applied, preview size unchanged");
        }
    }

    /// Re-render the preview at the size of the current mode
    fn render_preview(&self) {
        let settings = self.camera.applied_settings();
        let size = match settings.mode {
            CaptureMode::Picture => settings.picture_size.map(|size| (size.width, size.height)),
            CaptureMode::Video => settings
                .recorder_profile
                .as_deref()
                .and_then(|name| self.camera.capabilities()?.recorder_profile(name))
                .map(|profile| (profile.width, profile.height)),
        };
        let Some((width, height)) = size else {
            debug!("No preview size for the current mode");
            return;
        };

        let camera = self.camera.selected().clone();
        let preview = PreviewDescriptor {
            mirrored: camera.is_front(),
            camera,
            width,
            height,
        };
        debug!(?preview, "Rendering preview");
        self.collaborators.presentation.render_preview(Some(&preview));
    }

    /// Clamp and apply a zoom factor
    pub fn set_zoom(&mut self, zoom: f32) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        match self.camera.set_zoom(zoom) {
            Some(applied) => {
                self.collaborators.presentation.set_zoom_indicator(applied);
                Dispatch::Dispatched
            }
            None => Dispatch::Ignored(IgnoreReason::Unchanged),
        }
    }

    // =========================================================================
    // Camera Selection Handlers
    // =========================================================================

    /// Switch to another camera
    ///
    /// Deferred while recording or while a still is in flight; the switch
    /// happens once the recording has stopped.
    pub fn change_camera(&mut self, camera: CameraId) -> Dispatch {
        if !self.camera.cameras().contains(&camera) {
            warn!(camera = %camera, "Unknown camera requested");
            return Dispatch::Ignored(IgnoreReason::UnknownCamera);
        }
        if self.tearing_down {
            info!(camera = %camera, "Camera change deferred until teardown completes");
            self.pending_camera = Some(camera);
            return Dispatch::Deferred;
        }
        if !self.camera.is_acquired() && !self.camera.is_acquiring() {
            return Dispatch::Ignored(IgnoreReason::Unloaded);
        }
        if *self.camera.selected() == camera {
            self.pending_camera = None;
            return Dispatch::Ignored(IgnoreReason::Unchanged);
        }
        if self.camera.recording_state().is_active() || self.pipeline.is_capturing() {
            info!(camera = %camera, "Camera change deferred until capture finishes");
            self.pending_camera = Some(camera);
            return Dispatch::Deferred;
        }

        self.switch_camera(camera)
    }

    /// Next enumerated camera after the current one
    pub fn toggle_camera(&mut self) -> Dispatch {
        let cameras = self.camera.cameras();
        let current = self.pending_camera.as_ref().unwrap_or(self.camera.selected());
        let Some(index) = cameras.iter().position(|id| id == current) else {
            return Dispatch::Ignored(IgnoreReason::UnknownCamera);
        };
        if cameras.len() < 2 {
            return Dispatch::Ignored(IgnoreReason::Unchanged);
        }
        let next = cameras[(index + 1) % cameras.len()].clone();
        self.change_camera(next)
    }

    pub fn has_front_camera(&self) -> bool {
        self.camera.cameras().iter().any(CameraId::is_front)
    }

    /// Apply a camera change requested while busy
    pub(crate) fn apply_pending_camera(&mut self) {
        if let Some(camera) = self.pending_camera.take() {
            info!(camera = %camera, "Applying deferred camera change");
            self.switch_camera(camera);
        }
    }

    fn switch_camera(&mut self, camera: CameraId) -> Dispatch {
        info!(from = %self.camera.selected(), to = %camera, "Switching camera");
        self.pending_camera = None;
        self.focus_region = None;
        self.collaborators.presentation.render_preview(None);
        self.collaborators.presentation.set_focus_indicator(None);
        let dispatch = self.acquire(camera);
        self.refresh_state();
        dispatch
    }
}
