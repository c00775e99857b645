// SPDX-License-Identifier: GPL-3.0-only

//! Exclusive camera resource
//!
//! The resource owns the only handle to the physical camera. Everything that
//! touches the device goes through it, and it tracks the state that must stay
//! consistent with the handle:
//! - Acquire/release with stale-handle cleanup
//! - Validated, atomic configuration
//! - Zoom clamping
//! - Focus cycle and recording transitions
//!
//! Asynchronous operations are split in two: a method that starts the
//! operation and returns a ticket holding the hardware future, and a
//! `complete_*` method the session calls with the result. Each ticket carries
//! a generation so results that arrive after a release are recognised and
//! dropped.

use super::focus::{FocusCycle, FocusOutcome, FocusRegion, FocusState};
use super::types::*;
use super::{CameraHardware, CameraProvider, HardwareEventReceiver, HardwareFuture};
use crate::errors::{AcquireError, CaptureError, ConfigError};
use crate::events::EventChannel;
use crate::settings::{PendingConfiguration, SettingKey};
use futures::future::AbortHandle;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Smallest zoom step reported as a change
const ZOOM_EPSILON: f32 = 0.001;

/// Events emitted by the camera resource
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    Acquired(CameraId),
    Configured(CameraSettings),
    ZoomChanged(f32),
    FocusStateChanged(FocusState),
    Released(CameraId),
}

/// Recording lifecycle as seen by the hardware handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl RecordingState {
    /// Any state other than Idle
    pub fn is_active(&self) -> bool {
        !matches!(self, RecordingState::Idle)
    }
}

/// Current zoom and the range the camera supports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    pub current: f32,
    pub range: ZoomRange,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            current: 1.0,
            range: ZoomRange::default(),
        }
    }
}

/// In-flight acquire
pub struct AcquireTicket {
    pub generation: u64,
    pub camera: CameraId,
    pub future: HardwareFuture<Arc<dyn CameraHardware>>,
}

/// Result of completing an acquire
#[derive(Debug)]
pub enum AcquireOutcome {
    /// Handle is held; hardware events start flowing from the receiver
    Acquired(Option<HardwareEventReceiver>),
    /// The acquire was superseded; any handle it produced was released
    Stale,
}

/// In-flight configuration batch
pub struct ConfigureTicket {
    pub generation: u64,
    pub settings: CameraSettings,
    pub future: HardwareFuture<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    Applied,
    Stale,
}

/// In-flight auto-focus cycle
pub struct FocusTicket {
    pub generation: u64,
    pub future: HardwareFuture<bool>,
    /// Single-fire completion for the caller
    pub outcome: oneshot::Receiver<FocusOutcome>,
}

pub struct CameraResource {
    provider: Arc<dyn CameraProvider>,
    handle: Option<Arc<dyn CameraHardware>>,
    selected: CameraId,
    capabilities: Option<CapabilitySet>,
    applied: CameraSettings,
    zoom: Zoom,
    focus: FocusCycle,
    recording: RecordingState,
    acquire_generation: u64,
    acquiring: bool,
    configure_generation: u64,
    events: EventChannel<CameraEvent>,
}

impl CameraResource {
    /// Create a resource with no handle held
    pub fn new(provider: Arc<dyn CameraProvider>, selected: CameraId) -> Self {
        Self {
            provider,
            handle: None,
            selected,
            capabilities: None,
            applied: CameraSettings::default(),
            zoom: Zoom::default(),
            focus: FocusCycle::default(),
            recording: RecordingState::Idle,
            acquire_generation: 0,
            acquiring: false,
            configure_generation: 0,
            events: EventChannel::new(),
        }
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<CameraEvent> {
        self.events.subscribe()
    }

    // ===== State =====

    pub fn cameras(&self) -> Vec<CameraId> {
        self.provider.list_cameras()
    }

    pub fn selected(&self) -> &CameraId {
        &self.selected
    }

    /// Change the camera used by the next acquire (no handle held)
    pub fn select(&mut self, camera: CameraId) {
        self.selected = camera;
    }

    pub fn is_acquired(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    pub fn capabilities(&self) -> Option<&CapabilitySet> {
        self.capabilities.as_ref()
    }

    /// Settings the hardware last confirmed
    pub fn applied_settings(&self) -> &CameraSettings {
        &self.applied
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn focus_state(&self) -> FocusState {
        self.focus.state()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording
    }

    // ===== Lifecycle =====

    /// Start opening `camera`, releasing any handle currently held
    pub fn acquire(&mut self, camera: CameraId) -> Result<AcquireTicket, AcquireError> {
        if !self.provider.list_cameras().contains(&camera) {
            warn!(camera = %camera, "Acquire requested for unknown camera");
            return Err(AcquireError::HardwareUnavailable(camera));
        }
        if self.handle.is_some() {
            self.release();
        }

        info!(camera = %camera, "Acquiring camera");
        self.selected = camera.clone();
        self.acquire_generation += 1;
        self.acquiring = true;

        Ok(AcquireTicket {
            generation: self.acquire_generation,
            future: self.provider.open(&camera),
            camera,
        })
    }

    /// Finish an acquire started with [`CameraResource::acquire`]
    pub fn complete_acquire(
        &mut self,
        generation: u64,
        result: HardwareResult<Arc<dyn CameraHardware>>,
    ) -> Result<AcquireOutcome, AcquireError> {
        if generation != self.acquire_generation || !self.acquiring {
            if let Ok(stale) = result {
                info!(camera = %stale.id(), "Releasing handle from superseded acquire");
                if let Err(e) = stale.release() {
                    warn!(error = %e, "Failed to release superseded handle");
                }
            }
            return Ok(AcquireOutcome::Stale);
        }
        self.acquiring = false;

        let hardware = result.map_err(|e| {
            warn!(camera = %self.selected, error = %e, "Failed to acquire camera");
            AcquireError::from_hardware(&self.selected, e)
        })?;

        let capabilities = match self.provider.capabilities(&self.selected) {
            Ok(caps) => caps,
            Err(e) => {
                warn!(camera = %self.selected, error = %e, "No capabilities for acquired camera");
                if let Err(e) = hardware.release() {
                    warn!(error = %e, "Failed to release camera without capabilities");
                }
                return Err(AcquireError::from_hardware(&self.selected, e));
            }
        };

        self.zoom = Zoom {
            current: capabilities.zoom.clamp(1.0),
            range: capabilities.zoom,
        };
        self.capabilities = Some(capabilities);
        self.applied = CameraSettings::default();
        self.recording = RecordingState::Idle;
        let events = hardware.take_events();
        self.handle = Some(hardware);

        info!(camera = %self.selected, "Camera acquired");
        self.events.emit(CameraEvent::Acquired(self.selected.clone()));
        Ok(AcquireOutcome::Acquired(events))
    }

    /// Supersede an in-flight acquire; its handle is released on arrival
    pub fn cancel_acquire(&mut self) {
        if self.acquiring {
            debug!(camera = %self.selected, "Cancelling in-flight acquire");
            self.acquiring = false;
            self.acquire_generation += 1;
        }
    }

    /// Release the handle
    ///
    /// Idempotent. Every step is attempted even if an earlier one fails, and
    /// the handle, focus and recording state are always cleared. Returns
    /// `false` when there was nothing to release.
    pub fn release(&mut self) -> bool {
        self.cancel_acquire();
        if self.focus.reset() {
            self.events.emit(CameraEvent::FocusStateChanged(FocusState::None));
        }

        let Some(hardware) = self.handle.take() else {
            return false;
        };

        if self.recording.is_active() {
            info!(camera = %self.selected, state = ?self.recording, "Aborting recording before release");
            if let Err(e) = hardware.abort_recording() {
                warn!(error = %e, "Failed to abort recording during release");
            }
        }
        if let Err(e) = hardware.stop_preview() {
            warn!(error = %e, "Failed to stop preview during release");
        }
        if let Err(e) = hardware.release() {
            warn!(error = %e, "Hardware release reported an error");
        }

        self.recording = RecordingState::Idle;
        self.capabilities = None;
        self.configure_generation += 1;

        info!(camera = %self.selected, "Camera released");
        self.events.emit(CameraEvent::Released(self.selected.clone()));
        true
    }

    // ===== Configuration =====

    /// Validate `pending` and push it, merged over the applied settings, in
    /// one hardware operation
    pub fn apply_configuration(
        &mut self,
        pending: &PendingConfiguration,
    ) -> Result<ConfigureTicket, ConfigError> {
        let hardware = self.handle.as_ref().ok_or(ConfigError::NotAcquired)?;
        let capabilities = self.capabilities.as_ref().ok_or(ConfigError::NotAcquired)?;
        validate(pending, capabilities)?;

        let settings = self.applied.with_pending(pending);
        self.configure_generation += 1;
        debug!(?settings, "Applying configuration");

        Ok(ConfigureTicket {
            generation: self.configure_generation,
            future: hardware.apply(&settings),
            settings,
        })
    }

    /// Finish a configuration batch
    pub fn complete_configuration(
        &mut self,
        generation: u64,
        settings: CameraSettings,
        result: HardwareResult<()>,
    ) -> Result<ConfigureOutcome, ConfigError> {
        if generation != self.configure_generation || self.handle.is_none() {
            debug!("Dropping configuration result for a released handle");
            return Ok(ConfigureOutcome::Stale);
        }
        if let Err(e) = result {
            warn!(error = %e, "Hardware rejected configuration");
            return Err(e.into());
        }

        self.applied = settings;
        self.events.emit(CameraEvent::Configured(self.applied.clone()));
        Ok(ConfigureOutcome::Applied)
    }

    /// Clamp and apply a zoom factor
    ///
    /// Returns the new value, or `None` when nothing changed.
    pub fn set_zoom(&mut self, value: f32) -> Option<f32> {
        let hardware = self.handle.as_ref()?;
        let clamped = self.zoom.range.clamp(value);
        if (clamped - self.zoom.current).abs() < ZOOM_EPSILON {
            return None;
        }
        if let Err(e) = hardware.set_zoom(clamped) {
            warn!(zoom = clamped, error = %e, "Failed to set zoom");
            return None;
        }
        self.zoom.current = clamped;
        self.events.emit(CameraEvent::ZoomChanged(clamped));
        Some(clamped)
    }

    // ===== Focus =====

    pub fn set_focus_area(&mut self, region: FocusRegion) -> HardwareResult<()> {
        let hardware = self.handle.as_ref().ok_or(HardwareError::Released)?;
        hardware.set_focus_area(region)
    }

    /// Start an auto-focus cycle; `None` if not acquired or already focusing
    pub fn trigger_auto_focus(&mut self) -> Option<FocusTicket> {
        let hardware = self.handle.as_ref()?;
        let (generation, outcome) = self.focus.begin()?;
        let future = hardware.auto_focus();
        self.events.emit(CameraEvent::FocusStateChanged(FocusState::Focusing));
        Some(FocusTicket {
            generation,
            future,
            outcome,
        })
    }

    /// Record the auto-focus result; `None` if the cycle was superseded
    pub fn complete_auto_focus(&mut self, generation: u64, result: HardwareResult<bool>) -> Option<FocusState> {
        let focused = match result {
            Ok(focused) => focused,
            Err(e) => {
                warn!(error = %e, "Auto-focus failed");
                false
            }
        };
        let state = self.focus.complete(generation, focused)?;
        self.events.emit(CameraEvent::FocusStateChanged(state));
        Some(state)
    }

    pub fn arm_focus_reset(&mut self, handle: AbortHandle) {
        self.focus.arm_reset(handle);
    }

    /// Focus hold elapsed; returns true if the state returned to None
    pub fn expire_focus(&mut self, generation: u64) -> bool {
        if self.focus.expire(generation) {
            self.events.emit(CameraEvent::FocusStateChanged(FocusState::None));
            true
        } else {
            false
        }
    }

    /// Abandon the focus cycle without releasing
    pub fn reset_focus(&mut self) {
        if self.focus.reset() {
            self.events.emit(CameraEvent::FocusStateChanged(FocusState::None));
        }
    }

    // ===== Preview =====

    pub fn start_preview(&self) -> HardwareResult<()> {
        self.handle.as_ref().ok_or(HardwareError::Released)?.start_preview()
    }

    pub fn stop_preview(&self) -> HardwareResult<()> {
        self.handle.as_ref().ok_or(HardwareError::Released)?.stop_preview()
    }

    pub fn resume_preview(&self) -> HardwareResult<()> {
        self.handle.as_ref().ok_or(HardwareError::Released)?.resume_preview()
    }

    // ===== Capture =====

    pub fn take_picture(&self, request: PictureRequest) -> Result<HardwareFuture<Vec<u8>>, CaptureError> {
        let hardware = self.handle.as_ref().ok_or(CaptureError::NotAcquired)?;
        Ok(hardware.take_picture(request))
    }

    /// Idle -> Starting
    pub fn begin_recording(&mut self, request: RecordingRequest) -> Result<HardwareFuture<()>, CaptureError> {
        let hardware = self.handle.as_ref().ok_or(CaptureError::NotAcquired)?;
        if self.recording != RecordingState::Idle {
            return Err(CaptureError::AlreadyRecording);
        }
        self.recording = RecordingState::Starting;
        Ok(hardware.start_recording(request))
    }

    /// Starting -> Recording on success, Starting -> Idle on failure
    ///
    /// Returns false if the resource was no longer starting (released).
    pub fn complete_start(&mut self, started: bool) -> bool {
        if self.recording != RecordingState::Starting {
            return false;
        }
        self.recording = if started {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        };
        true
    }

    /// Recording -> Stopping
    pub fn begin_stop(&mut self) -> Result<HardwareFuture<RecordedVideo>, CaptureError> {
        let hardware = self.handle.as_ref().ok_or(CaptureError::NotAcquired)?;
        if self.recording != RecordingState::Recording {
            return Err(CaptureError::RecordingConflict("stop requested while not recording"));
        }
        self.recording = RecordingState::Stopping;
        Ok(hardware.stop_recording())
    }

    /// Stopping -> Idle
    pub fn complete_stop(&mut self) -> bool {
        if self.recording != RecordingState::Stopping {
            return false;
        }
        self.recording = RecordingState::Idle;
        true
    }
}

impl Drop for CameraResource {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Camera resource dropped with handle held");
            self.release();
        }
    }
}

/// Check every field of a batch against the capability set
fn validate(pending: &PendingConfiguration, caps: &CapabilitySet) -> Result<(), ConfigError> {
    let unsupported = |setting: SettingKey, value: String| ConfigError::UnsupportedCapability { setting, value };

    if let Some(flash) = pending.flash
        && !caps.supports_flash(flash)
    {
        return Err(unsupported(SettingKey::Flash, flash.to_string()));
    }
    if pending.hdr == Some(true) && !caps.hdr {
        return Err(unsupported(SettingKey::Hdr, "on".to_string()));
    }
    if let Some(size) = &pending.picture_size
        && !caps.supports_picture_size(size)
    {
        return Err(unsupported(SettingKey::PictureSize, size.to_string()));
    }
    if let Some(profile) = &pending.recorder_profile
        && caps.recorder_profile(profile).is_none()
    {
        return Err(unsupported(SettingKey::RecorderProfile, profile.clone()));
    }
    if let Some(wb) = pending.white_balance
        && !caps.supports_white_balance(wb)
    {
        return Err(unsupported(SettingKey::WhiteBalance, format!("{:?}", wb).to_lowercase()));
    }
    Ok(())
}
