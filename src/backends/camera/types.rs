// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Identifier of a physical camera as enumerated by the provider
/// (e.g. `"back"`, `"front"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Front cameras get a mirrored preview
    pub fn is_front(&self) -> bool {
        self.0 == "front"
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CameraId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Capture mode the hardware is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Picture,
    Video,
}

impl CaptureMode {
    pub fn toggled(self) -> Self {
        match self {
            CaptureMode::Picture => CaptureMode::Video,
            CaptureMode::Video => CaptureMode::Picture,
        }
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Picture => write!(f, "picture"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}

/// Flash operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    #[default]
    Off,
    /// Fires when the scene is dark enough
    Auto,
    /// Fires on every still capture
    On,
    /// LED stays lit continuously (video)
    Torch,
}

impl FlashMode {
    pub fn is_off(self) -> bool {
        self == FlashMode::Off
    }

    /// Whether the mode makes sense for the given capture mode.
    ///
    /// Still flash modes (auto/on) have no meaning while recording and
    /// torch is a video-only mode.
    pub fn usable_in(self, mode: CaptureMode) -> bool {
        match (self, mode) {
            (FlashMode::Off, _) => true,
            (FlashMode::Auto | FlashMode::On, CaptureMode::Picture) => true,
            (FlashMode::Torch, CaptureMode::Video) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FlashMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlashMode::Off => write!(f, "off"),
            FlashMode::Auto => write!(f, "auto"),
            FlashMode::On => write!(f, "on"),
            FlashMode::Torch => write!(f, "torch"),
        }
    }
}

/// Still picture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PictureSize {
    pub width: u32,
    pub height: u32,
}

impl PictureSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for PictureSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named video recording profile (e.g. "720p")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecorderProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl RecorderProfile {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// Supported zoom factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f32,
    pub max: f32,
}

impl ZoomRange {
    pub fn new(min: f32, max: f32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self { min: 1.0, max: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Auto,
    Continuous,
    Fixed,
    Infinity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteBalanceMode {
    Auto,
    Daylight,
    Cloudy,
    Incandescent,
    Fluorescent,
}

/// Everything a camera reports it can do
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub picture_sizes: Vec<PictureSize>,
    pub recorder_profiles: Vec<RecorderProfile>,
    pub flash_modes: Vec<FlashMode>,
    pub zoom: ZoomRange,
    pub focus_modes: Vec<FocusMode>,
    pub white_balance_modes: Vec<WhiteBalanceMode>,
    /// HDR scene mode available
    pub hdr: bool,
}

impl CapabilitySet {
    /// Flash off is always accepted, even by cameras without a flash unit
    pub fn supports_flash(&self, mode: FlashMode) -> bool {
        mode.is_off() || self.flash_modes.contains(&mode)
    }

    pub fn supports_picture_size(&self, size: &PictureSize) -> bool {
        self.picture_sizes.contains(size)
    }

    pub fn recorder_profile(&self, name: &str) -> Option<&RecorderProfile> {
        self.recorder_profiles.iter().find(|p| p.name == name)
    }

    pub fn supports_white_balance(&self, mode: WhiteBalanceMode) -> bool {
        self.white_balance_modes.contains(&mode)
    }

    pub fn largest_picture_size(&self) -> Option<PictureSize> {
        self.picture_sizes.iter().copied().max_by_key(|s| s.pixels())
    }

    pub fn supports_auto_focus(&self) -> bool {
        self.focus_modes
            .iter()
            .any(|m| matches!(m, FocusMode::Auto | FocusMode::Continuous))
    }

    /// Flash modes the camera offers for a capture mode, `Off` first
    pub fn flash_modes_for(&self, mode: CaptureMode) -> Vec<FlashMode> {
        let mut modes = vec![FlashMode::Off];
        modes.extend(
            self.flash_modes
                .iter()
                .copied()
                .filter(|m| !m.is_off() && m.usable_in(mode)),
        );
        modes
    }
}

/// Complete configuration pushed to the hardware in one operation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraSettings {
    pub mode: CaptureMode,
    pub flash: FlashMode,
    pub hdr: bool,
    pub picture_size: Option<PictureSize>,
    /// Recorder profile name, resolved against the capability set
    pub recorder_profile: Option<String>,
    pub white_balance: Option<WhiteBalanceMode>,
}

/// Geolocation attached to captured media
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

/// Parameters for a single still capture
#[derive(Debug, Clone)]
pub struct PictureRequest {
    pub position: Option<GeoPosition>,
    /// Preview is frozen around the shutter (plain path only)
    pub pause_preview: bool,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

/// Parameters for starting a recording
#[derive(Debug, Clone)]
pub struct RecordingRequest {
    /// Temporary file the hardware writes into
    pub path: PathBuf,
    /// Hardware stops itself and reports `FileSizeLimitReached` at this size
    pub max_file_size_bytes: Option<u64>,
    pub position: Option<GeoPosition>,
}

/// Raw RGBA frame, used when the hardware has no encoded poster
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Finalized recording returned by the hardware
#[derive(Debug, Clone)]
pub struct RecordedVideo {
    pub blob: Vec<u8>,
    /// Encoded poster from a designated keyframe
    pub poster: Option<Vec<u8>>,
    /// Last frame written, used to derive a poster when none was designated
    pub last_frame: Option<RawFrame>,
}

/// Asynchronous notifications pushed by an open camera
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareEvent {
    /// Sensor exposure happened
    Shutter,
    /// Bytes written to the current recording so far
    RecordingProgress { bytes: u64 },
    /// Hardware-enforced size limit was hit
    FileSizeLimitReached,
    /// Recorder failed while writing
    RecorderError(String),
}

/// Result type for hardware operations
pub type HardwareResult<T> = Result<T, HardwareError>;

/// Errors reported by the hardware layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// Another process holds the device
    #[error("camera is held by another process")]
    Busy,
    /// No camera with the requested id
    #[error("camera {0} does not exist")]
    Unavailable(String),
    /// Operation requires a handle that has been released
    #[error("camera handle has been released")]
    Released,
    #[error("operation timed out")]
    TimedOut,
    #[error("hardware failure: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamp() {
        let range = ZoomRange::new(1.0, 4.0);
        assert_eq!(range.clamp(0.5), 1.0);
        assert_eq!(range.clamp(2.5), 2.5);
        assert_eq!(range.clamp(10.0), 4.0);
        assert_eq!(range.clamp(f32::NAN), 1.0);

        // Swapped bounds are normalised
        let swapped = ZoomRange::new(3.0, 1.0);
        assert_eq!(swapped.min, 1.0);
        assert_eq!(swapped.max, 3.0);
    }

    #[test]
    fn test_flash_modes_per_capture_mode() {
        let caps = CapabilitySet {
            flash_modes: vec![FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch],
            ..Default::default()
        };
        assert_eq!(
            caps.flash_modes_for(CaptureMode::Picture),
            vec![FlashMode::Off, FlashMode::Auto, FlashMode::On]
        );
        assert_eq!(
            caps.flash_modes_for(CaptureMode::Video),
            vec![FlashMode::Off, FlashMode::Torch]
        );
    }

    #[test]
    fn test_flash_off_always_supported() {
        let caps = CapabilitySet::default();
        assert!(caps.supports_flash(FlashMode::Off));
        assert!(!caps.supports_flash(FlashMode::On));
    }

    #[test]
    fn test_largest_picture_size() {
        let caps = CapabilitySet {
            picture_sizes: vec![
                PictureSize::new(640, 480),
                PictureSize::new(2592, 1944),
                PictureSize::new(1280, 960),
            ],
            ..Default::default()
        };
        assert_eq!(caps.largest_picture_size(), Some(PictureSize::new(2592, 1944)));
    }
}
