// SPDX-License-Identifier: GPL-3.0-only

//! Session-wide constants

use crate::backends::camera::PictureSize;
use serde::{Deserialize, Serialize};

/// Normalized focus-area lower bound (per axis)
pub const FOCUS_AREA_MIN: i32 = -1000;

/// Normalized focus-area upper bound (per axis)
pub const FOCUS_AREA_MAX: i32 = 1000;

/// Half the side of the focus area placed around a tap, in normalized units
pub const FOCUS_TAP_HALF_EXTENT: i32 = 100;

/// How a dual-shutter still relates to the recording size budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualShotBudget {
    /// Stills taken during recording do not count against the video limit
    #[default]
    Independent,
    /// Still bytes are added to the recorded bytes when checking the limit
    SharedWithRecording,
}

/// Artifact size limits
pub mod sizing {
    /// Worst-case bytes per pixel of an uncompressed still
    pub const BYTES_PER_PIXEL: u64 = 4;

    /// Header and metadata allowance added to every artifact
    pub const HEADER_OVERHEAD_BYTES: u64 = 4096;

    /// JPEG quality for posters derived from a raw frame
    pub const POSTER_JPEG_QUALITY: u8 = 80;
}

/// Maximum artifact size for a picture size: `w * h * 4 + 4096`
pub fn max_artifact_size(size: &PictureSize) -> u64 {
    size.pixels() * sizing::BYTES_PER_PIXEL + sizing::HEADER_OVERHEAD_BYTES
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Focused/Failed indicator hold before returning to None
    pub const FOCUS_RESET_DELAY_MS: u64 = 1000;

    /// Upper bound for a recording stop issued by teardown
    pub const STOP_TIMEOUT_MS: u64 = 5000;

    /// Elapsed-time update cadence while recording
    pub const RECORDING_TICK: Duration = Duration::from_secs(1);
}

/// File naming for persisted artifacts
pub mod file_formats {
    /// DCF prefix for stills
    pub const IMAGE_PREFIX: &str = "IMG_";

    /// DCF prefix for videos
    pub const VIDEO_PREFIX: &str = "VID_";

    pub const IMAGE_EXTENSION: &str = "jpg";

    pub const VIDEO_EXTENSION: &str = "3gp";

    /// Highest DCF file number before wrapping
    pub const MAX_FILE_NUMBER: u32 = 9999;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
