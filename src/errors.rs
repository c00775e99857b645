// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the camera session
//!
//! Every failure the session can surface maps to one of the enums below.
//! None of them is fatal: acquisition errors leave the session unloaded,
//! configuration errors leave it ready with a warning, and storage errors
//! drop the artifact.

use crate::backends::camera::{CameraId, HardwareError};
use crate::settings::SettingKey;
use thiserror::Error;

/// Top-level session error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("acquire failed: {0}")]
    Acquire(#[from] AcquireError),
    #[error("configuration failed: {0}")]
    Config(#[from] ConfigError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Failure to open a camera
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("camera {0} is held by another process")]
    HardwareBusy(CameraId),
    #[error("camera {0} is not available")]
    HardwareUnavailable(CameraId),
    #[error("camera {camera} failed to open: {reason}")]
    Hardware { camera: CameraId, reason: String },
}

impl AcquireError {
    /// Classify a hardware error raised while opening `camera`
    pub fn from_hardware(camera: &CameraId, error: HardwareError) -> Self {
        match error {
            HardwareError::Busy => AcquireError::HardwareBusy(camera.clone()),
            HardwareError::Unavailable(_) => AcquireError::HardwareUnavailable(camera.clone()),
            other => AcquireError::Hardware {
                camera: camera.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Failure to apply a configuration batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported {setting}: {value}")]
    UnsupportedCapability { setting: SettingKey, value: String },
    #[error("no camera is acquired")]
    NotAcquired,
    #[error("hardware rejected configuration: {0}")]
    Hardware(String),
}

impl From<HardwareError> for ConfigError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Released => ConfigError::NotAcquired,
            other => ConfigError::Hardware(other.to_string()),
        }
    }
}

/// Failure in the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("no camera is acquired")]
    NotAcquired,
    #[error("recording already in progress")]
    AlreadyRecording,
    #[error("recording conflict: {0}")]
    RecordingConflict(&'static str),
    #[error("a still capture is already in flight")]
    CaptureInProgress,
    #[error("artifact of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },
    #[error("hardware error: {0}")]
    Hardware(String),
}

impl From<HardwareError> for CaptureError {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Released => CaptureError::NotAcquired,
            other => CaptureError::Hardware(other.to_string()),
        }
    }
}

/// Failure to persist an artifact
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage is full")]
    Full,
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        StorageError::Io(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_error_classification() {
        let id = CameraId::new("back");
        assert_eq!(
            AcquireError::from_hardware(&id, HardwareError::Busy),
            AcquireError::HardwareBusy(id.clone())
        );
        assert_eq!(
            AcquireError::from_hardware(&id, HardwareError::Unavailable("back".into())),
            AcquireError::HardwareUnavailable(id.clone())
        );
        assert!(matches!(
            AcquireError::from_hardware(&id, HardwareError::TimedOut),
            AcquireError::Hardware { .. }
        ));
    }

    #[test]
    fn test_session_error_display() {
        let err: SessionError = StorageError::Full.into();
        assert_eq!(err.to_string(), "storage failed: storage is full");

        let err: SessionError = CaptureError::SizeLimitExceeded { size: 10, limit: 5 }.into();
        assert!(err.to_string().contains("10 bytes"));
    }

    #[test]
    fn test_released_maps_to_not_acquired() {
        assert_eq!(ConfigError::from(HardwareError::Released), ConfigError::NotAcquired);
        assert_eq!(CaptureError::from(HardwareError::Released), CaptureError::NotAcquired);
    }
}
