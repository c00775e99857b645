// SPDX-License-Identifier: GPL-3.0-only

//! Presentation surface
//!
//! Viewfinder and HUD rendering belong to the UI. The session only tells it
//! what to show through this narrow interface.

use crate::backends::camera::{CameraId, FocusState, ViewportRect};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Alerts the session can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKey {
    FileSizeLimitReached,
    StorageFull,
    StorageUnavailable,
    StorageError,
    CameraUnavailable,
}

/// What the viewfinder should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewDescriptor {
    pub camera: CameraId,
    pub width: u32,
    pub height: u32,
    /// Front cameras are previewed mirrored
    pub mirrored: bool,
}

/// Focus ring placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusIndicator {
    pub state: FocusState,
    pub area: ViewportRect,
}

pub trait Presentation: Send + Sync {
    /// Show the preview, or tear it down with `None`
    fn render_preview(&self, preview: Option<&PreviewDescriptor>);

    fn set_focus_indicator(&self, indicator: Option<FocusIndicator>);

    fn set_zoom_indicator(&self, zoom: f32);

    fn show_alert(&self, alert: AlertKey);

    fn hide_alert(&self, _alert: AlertKey) {}

    /// Brief visual flash acknowledging a dual-shutter still
    fn flash_acknowledge(&self) {}
}

/// Presentation that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresentation;

impl Presentation for NullPresentation {
    fn render_preview(&self, _preview: Option<&PreviewDescriptor>) {}

    fn set_focus_indicator(&self, _indicator: Option<FocusIndicator>) {}

    fn set_zoom_indicator(&self, _zoom: f32) {}

    fn show_alert(&self, _alert: AlertKey) {}
}

/// A call made on [`RecordingPresentation`]
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationCall {
    RenderPreview(Option<PreviewDescriptor>),
    FocusIndicator(Option<FocusIndicator>),
    ZoomIndicator(f32),
    ShowAlert(AlertKey),
    HideAlert(AlertKey),
    FlashAcknowledge,
}

/// Records every call; clones share the log
#[derive(Debug, Default, Clone)]
pub struct RecordingPresentation {
    calls: Arc<Mutex<Vec<PresentationCall>>>,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<PresentationCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<PresentationCall> {
        self.log().clone()
    }

    pub fn alerts_shown(&self, alert: AlertKey) -> usize {
        self.log()
            .iter()
            .filter(|call| **call == PresentationCall::ShowAlert(alert))
            .count()
    }

    /// Last preview rendered, `None` if never rendered or torn down
    pub fn last_preview(&self) -> Option<PreviewDescriptor> {
        self.log().iter().rev().find_map(|call| match call {
            PresentationCall::RenderPreview(preview) => Some(preview.clone()),
            _ => None,
        })?
    }

    pub fn preview_renders(&self) -> usize {
        self.log()
            .iter()
            .filter(|call| matches!(call, PresentationCall::RenderPreview(Some(_))))
            .count()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl Presentation for RecordingPresentation {
    fn render_preview(&self, preview: Option<&PreviewDescriptor>) {
        self.log().push(PresentationCall::RenderPreview(preview.cloned()));
    }

    fn set_focus_indicator(&self, indicator: Option<FocusIndicator>) {
        self.log().push(PresentationCall::FocusIndicator(indicator));
    }

    fn set_zoom_indicator(&self, zoom: f32) {
        self.log().push(PresentationCall::ZoomIndicator(zoom));
    }

    fn show_alert(&self, alert: AlertKey) {
        self.log().push(PresentationCall::ShowAlert(alert));
    }

    fn hide_alert(&self, alert: AlertKey) {
        self.log().push(PresentationCall::HideAlert(alert));
    }

    fn flash_acknowledge(&self) {
        self.log().push(PresentationCall::FlashAcknowledge);
    }
}
