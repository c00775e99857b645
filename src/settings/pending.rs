// SPDX-License-Identifier: GPL-3.0-only

//! Staged setting changes

use crate::backends::camera::{CameraSettings, CaptureMode, FlashMode, PictureSize, WhiteBalanceMode};
use serde::{Deserialize, Serialize};

/// Name of an individually configurable setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    Mode,
    Flash,
    Hdr,
    PictureSize,
    RecorderProfile,
    WhiteBalance,
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingKey::Mode => write!(f, "mode"),
            SettingKey::Flash => write!(f, "flash mode"),
            SettingKey::Hdr => write!(f, "hdr"),
            SettingKey::PictureSize => write!(f, "picture size"),
            SettingKey::RecorderProfile => write!(f, "recorder profile"),
            SettingKey::WhiteBalance => write!(f, "white balance"),
        }
    }
}

/// A single setting change with its value
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    Mode(CaptureMode),
    Flash(FlashMode),
    Hdr(bool),
    PictureSize(PictureSize),
    RecorderProfile(String),
    WhiteBalance(WhiteBalanceMode),
}

impl SettingChange {
    pub fn key(&self) -> SettingKey {
        match self {
            SettingChange::Mode(_) => SettingKey::Mode,
            SettingChange::Flash(_) => SettingKey::Flash,
            SettingChange::Hdr(_) => SettingKey::Hdr,
            SettingChange::PictureSize(_) => SettingKey::PictureSize,
            SettingChange::RecorderProfile(_) => SettingKey::RecorderProfile,
            SettingChange::WhiteBalance(_) => SettingKey::WhiteBalance,
        }
    }
}

/// Setting values accumulated since the last apply, one slot per key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingConfiguration {
    pub mode: Option<CaptureMode>,
    pub flash: Option<FlashMode>,
    pub hdr: Option<bool>,
    pub picture_size: Option<PictureSize>,
    pub recorder_profile: Option<String>,
    pub white_balance: Option<WhiteBalanceMode>,
}

impl PendingConfiguration {
    /// Every field of `settings`, used to configure a freshly acquired handle
    pub fn full(settings: &CameraSettings) -> Self {
        Self {
            mode: Some(settings.mode),
            flash: Some(settings.flash),
            hdr: Some(settings.hdr),
            picture_size: settings.picture_size,
            recorder_profile: settings.recorder_profile.clone(),
            white_balance: settings.white_balance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Record one change, replacing any earlier value for the same key
    pub fn set(&mut self, change: SettingChange) {
        match change {
            SettingChange::Mode(mode) => self.mode = Some(mode),
            SettingChange::Flash(flash) => self.flash = Some(flash),
            SettingChange::Hdr(hdr) => self.hdr = Some(hdr),
            SettingChange::PictureSize(size) => self.picture_size = Some(size),
            SettingChange::RecorderProfile(name) => self.recorder_profile = Some(name),
            SettingChange::WhiteBalance(wb) => self.white_balance = Some(wb),
        }
    }

    /// Merge a later batch into this one; the later value wins per key
    pub fn merge(&mut self, later: PendingConfiguration) {
        if later.mode.is_some() {
            self.mode = later.mode;
        }
        if later.flash.is_some() {
            self.flash = later.flash;
        }
        if later.hdr.is_some() {
            self.hdr = later.hdr;
        }
        if later.picture_size.is_some() {
            self.picture_size = later.picture_size;
        }
        if later.recorder_profile.is_some() {
            self.recorder_profile = later.recorder_profile;
        }
        if later.white_balance.is_some() {
            self.white_balance = later.white_balance;
        }
    }

    pub fn merged(mut self, later: PendingConfiguration) -> Self {
        self.merge(later);
        self
    }

    pub fn keys(&self) -> Vec<SettingKey> {
        let mut keys = Vec::new();
        if self.mode.is_some() {
            keys.push(SettingKey::Mode);
        }
        if self.flash.is_some() {
            keys.push(SettingKey::Flash);
        }
        if self.hdr.is_some() {
            keys.push(SettingKey::Hdr);
        }
        if self.picture_size.is_some() {
            keys.push(SettingKey::PictureSize);
        }
        if self.recorder_profile.is_some() {
            keys.push(SettingKey::RecorderProfile);
        }
        if self.white_balance.is_some() {
            keys.push(SettingKey::WhiteBalance);
        }
        keys
    }
}

impl CameraSettings {
    /// These settings with every staged value of `pending` applied
    pub fn with_pending(&self, pending: &PendingConfiguration) -> CameraSettings {
        CameraSettings {
            mode: pending.mode.unwrap_or(self.mode),
            flash: pending.flash.unwrap_or(self.flash),
            hdr: pending.hdr.unwrap_or(self.hdr),
            picture_size: pending.picture_size.or(self.picture_size),
            recorder_profile: pending
                .recorder_profile
                .clone()
                .or_else(|| self.recorder_profile.clone()),
            white_balance: pending.white_balance.or(self.white_balance),
        }
    }
}
