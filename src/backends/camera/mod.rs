// SPDX-License-Identifier: GPL-3.0-only
// Camera hardware abstraction driven through a narrow asynchronous interface

//! Camera hardware abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CameraResource    │  ← Exclusive handle, focus and recording state
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraHardware Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!       ┌─────────┐
//!       │Simulated│  ← Concrete implementation
//!       └─────────┘
//! ```
//!
//! Sensor, lens and encoder internals stay behind [`CameraHardware`]. Every
//! operation that touches the device returns a [`HardwareFuture`] so the
//! session can keep a single cooperative event loop.

pub mod focus;
pub mod resource;
pub mod simulated;
pub mod types;

pub use focus::{FocusOutcome, FocusRegion, FocusState, ViewportRect};
pub use resource::{
    AcquireOutcome, AcquireTicket, CameraEvent, CameraResource, ConfigureOutcome,
    ConfigureTicket, FocusTicket, RecordingState, Zoom,
};
pub use simulated::{SimulatedControls, SimulatedProvider};
pub use types::*;

use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Future returned by asynchronous hardware operations
pub type HardwareFuture<T> = BoxFuture<'static, HardwareResult<T>>;

/// Stream of notifications pushed by an open camera
pub type HardwareEventReceiver = UnboundedReceiver<HardwareEvent>;

/// Hardware capability provider
///
/// Enumerates the cameras present on the device and opens exclusive handles.
pub trait CameraProvider: Send + Sync {
    /// Enumerate available cameras
    fn list_cameras(&self) -> Vec<CameraId>;

    /// Get the capability set for a camera
    ///
    /// # Returns
    /// * `Ok(CapabilitySet)` - Capabilities of the camera
    /// * `Err(HardwareError::Unavailable)` - No camera with this id
    fn capabilities(&self, id: &CameraId) -> HardwareResult<CapabilitySet>;

    /// Open an exclusive handle to a camera
    ///
    /// # Returns
    /// * `Ok(handle)` - Camera opened
    /// * `Err(HardwareError::Busy)` - Another process holds the device
    /// * `Err(HardwareError::Unavailable)` - No camera with this id
    fn open(&self, id: &CameraId) -> HardwareFuture<Arc<dyn CameraHardware>>;
}

/// Open camera handle
///
/// Only [`CameraResource`] holds a value of this type. Dropping the last
/// reference without calling [`CameraHardware::release`] leaks the device.
pub trait CameraHardware: Send + Sync + std::fmt::Debug {
    // ===== Metadata =====

    /// Camera this handle belongs to
    fn id(&self) -> &CameraId;

    /// Take the event receiver for this handle
    ///
    /// Returns `None` after the first call.
    fn take_events(&self) -> Option<HardwareEventReceiver>;

    // ===== Configuration =====

    /// Push a complete configuration in one hardware operation
    fn apply(&self, settings: &CameraSettings) -> HardwareFuture<()>;

    /// Set the zoom factor (already clamped by the caller)
    fn set_zoom(&self, value: f32) -> HardwareResult<()>;

    /// Set focus and metering area in normalized coordinates
    fn set_focus_area(&self, region: FocusRegion) -> HardwareResult<()>;

    /// Run one auto-focus cycle
    ///
    /// # Returns
    /// * `Ok(true)` - Focus locked
    /// * `Ok(false)` - Focus could not be achieved
    fn auto_focus(&self) -> HardwareFuture<bool>;

    // ===== Preview =====

    fn start_preview(&self) -> HardwareResult<()>;

    fn stop_preview(&self) -> HardwareResult<()>;

    /// Resume a preview frozen by a still capture
    fn resume_preview(&self) -> HardwareResult<()>;

    // ===== Capture: Photo =====

    /// Capture a single encoded still
    fn take_picture(&self, request: PictureRequest) -> HardwareFuture<Vec<u8>>;

    // ===== Capture: Video =====

    /// Start recording into `request.path`
    fn start_recording(&self, request: RecordingRequest) -> HardwareFuture<()>;

    /// Stop recording and finalize the file
    fn stop_recording(&self) -> HardwareFuture<RecordedVideo>;

    /// Abort recording without finalizing, used on release
    fn abort_recording(&self) -> HardwareResult<()>;

    // ===== Lifecycle =====

    /// Release the device
    fn release(&self) -> HardwareResult<()>;
}
