// SPDX-License-Identifier: GPL-3.0-only

//! Settings reconciliation
//!
//! Users change one setting at a time, but some settings depend on each
//! other. The coordinator keeps the desired configuration consistent and
//! turns bursts of changes into single configuration batches:
//!
//! - HDR on while the flash is on turns the flash off
//! - Flash on while HDR is on turns HDR off
//! - Switching mode restores the flash mode last chosen for that mode
//!
//! Only one batch is in flight at a time. Changes arriving meanwhile are
//! staged and sent as the next batch. A rejected batch reverts the desired
//! settings to what the hardware last accepted.

pub mod pending;

pub use pending::{PendingConfiguration, SettingChange, SettingKey};

use crate::backends::camera::{
    CameraResource, CameraSettings, CapabilitySet, CaptureMode, ConfigureTicket, FlashMode,
    WhiteBalanceMode,
};
use crate::errors::ConfigError;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SettingsCoordinator {
    desired: CameraSettings,
    applied: CameraSettings,
    staged: PendingConfiguration,
    in_flight: Option<PendingConfiguration>,
    flash_preferences: HashMap<CaptureMode, FlashMode>,
}

impl SettingsCoordinator {
    pub fn new(initial: CameraSettings) -> Self {
        let mut flash_preferences = HashMap::new();
        flash_preferences.insert(initial.mode, initial.flash);
        Self {
            staged: PendingConfiguration::full(&initial),
            desired: initial.clone(),
            applied: initial,
            in_flight: None,
            flash_preferences,
        }
    }

    /// Settings the user asked for, with rules applied
    pub fn desired(&self) -> &CameraSettings {
        &self.desired
    }

    /// Settings the hardware last accepted
    pub fn applied(&self) -> &CameraSettings {
        &self.applied
    }

    /// Changes waiting for the next batch
    pub fn staged(&self) -> &PendingConfiguration {
        &self.staged
    }

    pub fn is_applying(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Flash mode remembered for a capture mode
    pub fn flash_preference(&self, mode: CaptureMode) -> FlashMode {
        self.flash_preferences.get(&mode).copied().unwrap_or_default()
    }

    /// Record a change and the changes the rules force with it
    ///
    /// Returns every change that was staged, the requested one first.
    pub fn on_setting_changed(&mut self, change: SettingChange) -> Vec<SettingChange> {
        let mut effective = vec![change.clone()];
        match change {
            SettingChange::Hdr(true) if !self.desired.flash.is_off() => {
                effective.push(SettingChange::Flash(FlashMode::Off));
            }
            SettingChange::Flash(flash) if !flash.is_off() && self.desired.hdr => {
                effective.push(SettingChange::Hdr(false));
            }
            SettingChange::Mode(mode) => {
                let flash = self.flash_preference(mode);
                effective.push(SettingChange::Flash(flash));
                if !flash.is_off() && self.desired.hdr {
                    effective.push(SettingChange::Hdr(false));
                }
            }
            _ => {}
        }

        for change in &effective {
            self.record(change.clone());
        }
        debug!(changes = ?effective, "Settings staged");
        effective
    }

    fn record(&mut self, change: SettingChange) {
        match &change {
            SettingChange::Mode(mode) => self.desired.mode = *mode,
            SettingChange::Flash(flash) => {
                self.desired.flash = *flash;
                self.flash_preferences.insert(self.desired.mode, *flash);
            }
            SettingChange::Hdr(hdr) => self.desired.hdr = *hdr,
            SettingChange::PictureSize(size) => self.desired.picture_size = Some(*size),
            SettingChange::RecorderProfile(name) => self.desired.recorder_profile = Some(name.clone()),
            SettingChange::WhiteBalance(wb) => self.desired.white_balance = Some(*wb),
        }
        self.staged.set(change);
    }

    /// Next flash mode the camera offers for the current capture mode
    pub fn next_flash(&self, caps: &CapabilitySet) -> FlashMode {
        let modes = caps.flash_modes_for(self.desired.mode);
        match modes.iter().position(|m| *m == self.desired.flash) {
            Some(index) => modes[(index + 1) % modes.len()],
            None => FlashMode::Off,
        }
    }

    /// Replace desired values a newly selected camera cannot honour
    ///
    /// Picture size falls back to the largest supported, the recorder
    /// profile to the first one and the flash to off. White balance is reset
    /// to auto.
    pub fn adopt_capabilities(&mut self, caps: &CapabilitySet) -> Vec<SettingChange> {
        let mut changes = Vec::new();

        let size_supported = self
            .desired
            .picture_size
            .is_some_and(|size| caps.supports_picture_size(&size));
        if !size_supported && let Some(largest) = caps.largest_picture_size() {
            changes.push(SettingChange::PictureSize(largest));
        }

        let profile_supported = self
            .desired
            .recorder_profile
            .as_deref()
            .is_some_and(|name| caps.recorder_profile(name).is_some());
        if !profile_supported && let Some(first) = caps.recorder_profiles.first() {
            changes.push(SettingChange::RecorderProfile(first.name.clone()));
        }

        if !caps.supports_flash(self.desired.flash) || !self.desired.flash.usable_in(self.desired.mode) {
            changes.push(SettingChange::Flash(FlashMode::Off));
        }
        if self.desired.hdr && !caps.hdr {
            changes.push(SettingChange::Hdr(false));
        }

        if caps.supports_white_balance(WhiteBalanceMode::Auto) {
            changes.push(SettingChange::WhiteBalance(WhiteBalanceMode::Auto));
        } else {
            self.desired.white_balance = None;
            self.staged.white_balance = None;
        }

        for change in &changes {
            self.record(change.clone());
        }
        for (mode, flash) in self.flash_preferences.iter_mut() {
            if !caps.supports_flash(*flash) || !flash.usable_in(*mode) {
                *flash = FlashMode::Off;
            }
        }

        if !changes.is_empty() {
            info!(changes = ?changes, "Adopted capabilities of new camera");
        }
        changes
    }

    /// Stage the complete desired configuration for a freshly acquired handle
    pub fn prepare_for_new_handle(&mut self) {
        self.in_flight = None;
        self.staged = PendingConfiguration::full(&self.desired);
    }

    /// Move staged changes into flight; `None` if a batch is already in
    /// flight or nothing is staged
    pub fn begin_apply(&mut self) -> Option<PendingConfiguration> {
        if self.in_flight.is_some() || self.staged.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.staged);
        self.in_flight = Some(batch.clone());
        Some(batch)
    }

    /// Send staged changes to the camera as one batch
    ///
    /// Does nothing while unloaded or while a batch is in flight; staged
    /// changes wait for the next call. A batch the camera rejects up front
    /// is reverted immediately.
    pub fn reconcile_and_apply(
        &mut self,
        camera: &mut CameraResource,
    ) -> Result<Option<ConfigureTicket>, ConfigError> {
        if !camera.is_acquired() {
            return Ok(None);
        }
        let Some(batch) = self.begin_apply() else {
            return Ok(None);
        };
        match camera.apply_configuration(&batch) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(e) => {
                self.complete_apply(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Finish the in-flight batch
    ///
    /// On success `applied` is what the hardware now runs with. On failure the
    /// desired settings revert to the last applied values plus anything staged
    /// since the batch left.
    pub fn complete_apply(&mut self, result: Result<CameraSettings, ConfigError>) {
        let Some(batch) = self.in_flight.take() else {
            return;
        };
        match result {
            Ok(applied) => {
                debug!(keys = ?batch.keys(), "Configuration batch applied");
                self.applied = applied;
            }
            Err(e) => {
                warn!(keys = ?batch.keys(), error = %e, "Configuration batch failed, reverting");
                self.desired = self.applied.with_pending(&self.staged);
                self.flash_preferences.insert(self.desired.mode, self.desired.flash);
            }
        }
    }

    /// Drop the in-flight batch without a result (teardown), keeping its
    /// values staged for the next handle
    pub fn abandon_in_flight(&mut self) {
        if let Some(batch) = self.in_flight.take() {
            let later = std::mem::take(&mut self.staged);
            self.staged = batch.merged(later);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::back_camera_capabilities;
    use crate::backends::camera::{PictureSize, simulated::front_camera_capabilities};
    use proptest::prelude::*;

    fn coordinator() -> SettingsCoordinator {
        let mut settings = SettingsCoordinator::new(CameraSettings::default());
        settings.begin_apply();
        settings.complete_apply(Ok(CameraSettings::default()));
        settings
    }

    fn arb_change() -> impl Strategy<Value = SettingChange> {
        prop_oneof![
            prop_oneof![Just(CaptureMode::Picture), Just(CaptureMode::Video)].prop_map(SettingChange::Mode),
            prop_oneof![
                Just(FlashMode::Off),
                Just(FlashMode::Auto),
                Just(FlashMode::On),
                Just(FlashMode::Torch)
            ]
            .prop_map(SettingChange::Flash),
            any::<bool>().prop_map(SettingChange::Hdr),
        ]
    }

    proptest! {
        #[test]
        fn hdr_and_flash_never_both_on(changes in proptest::collection::vec(arb_change(), 1..32)) {
            let mut settings = coordinator();
            for change in changes {
                settings.on_setting_changed(change);
                let desired = settings.desired();
                prop_assert!(!(desired.hdr && !desired.flash.is_off()));
            }
        }
    }

    #[test]
    fn test_hdr_forces_flash_off() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Flash(FlashMode::On));
        let effective = settings.on_setting_changed(SettingChange::Hdr(true));
        assert_eq!(
            effective,
            vec![SettingChange::Hdr(true), SettingChange::Flash(FlashMode::Off)]
        );
        assert!(settings.desired().hdr);
        assert_eq!(settings.desired().flash, FlashMode::Off);
    }

    #[test]
    fn test_flash_forces_hdr_off() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Hdr(true));
        settings.on_setting_changed(SettingChange::Flash(FlashMode::Auto));
        assert!(!settings.desired().hdr);
        assert_eq!(settings.desired().flash, FlashMode::Auto);
    }

    #[test]
    fn test_mode_change_restores_flash_preference() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Flash(FlashMode::On));
        settings.on_setting_changed(SettingChange::Mode(CaptureMode::Video));
        assert_eq!(settings.desired().flash, FlashMode::Off);

        settings.on_setting_changed(SettingChange::Flash(FlashMode::Torch));
        settings.on_setting_changed(SettingChange::Mode(CaptureMode::Picture));
        assert_eq!(settings.desired().flash, FlashMode::On);
        assert_eq!(settings.flash_preference(CaptureMode::Video), FlashMode::Torch);
    }

    #[test]
    fn test_changes_during_flight_wait_for_next_batch() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Hdr(true));
        let first = settings.begin_apply().unwrap();
        assert_eq!(first.hdr, Some(true));

        settings.on_setting_changed(SettingChange::PictureSize(PictureSize::new(640, 480)));
        assert!(settings.begin_apply().is_none());

        let applied = settings.applied().with_pending(&first);
        settings.complete_apply(Ok(applied));
        let second = settings.begin_apply().unwrap();
        assert_eq!(second.keys(), vec![SettingKey::PictureSize]);
    }

    #[test]
    fn test_failed_batch_reverts_but_keeps_later_changes() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Hdr(true));
        settings.begin_apply().unwrap();
        settings.on_setting_changed(SettingChange::Mode(CaptureMode::Video));

        settings.complete_apply(Err(ConfigError::Hardware("rejected".into())));
        assert!(!settings.desired().hdr);
        assert_eq!(settings.desired().mode, CaptureMode::Video);
    }

    #[test]
    fn test_next_flash_cycles_supported_modes() {
        let mut settings = coordinator();
        let caps = back_camera_capabilities();
        assert_eq!(settings.next_flash(&caps), FlashMode::Auto);
        settings.on_setting_changed(SettingChange::Flash(FlashMode::On));
        assert_eq!(settings.next_flash(&caps), FlashMode::Off);

        let front = front_camera_capabilities();
        assert_eq!(settings.next_flash(&front), FlashMode::Off);
    }

    #[test]
    fn test_adopt_front_camera_capabilities() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::PictureSize(PictureSize::new(2592, 1944)));
        settings.on_setting_changed(SettingChange::RecorderProfile("1080p".to_string()));
        settings.on_setting_changed(SettingChange::Flash(FlashMode::Auto));

        settings.adopt_capabilities(&front_camera_capabilities());
        let desired = settings.desired();
        assert_eq!(desired.picture_size, Some(PictureSize::new(1280, 960)));
        assert_eq!(desired.recorder_profile.as_deref(), Some("cif"));
        assert_eq!(desired.flash, FlashMode::Off);
        assert_eq!(desired.white_balance, Some(WhiteBalanceMode::Auto));
    }

    #[test]
    fn test_abandoned_batch_is_restaged() {
        let mut settings = coordinator();
        settings.on_setting_changed(SettingChange::Hdr(true));
        settings.begin_apply().unwrap();
        settings.abandon_in_flight();
        assert!(!settings.is_applying());
        assert_eq!(settings.staged().hdr, Some(true));
    }
}
