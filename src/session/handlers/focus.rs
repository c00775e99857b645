// SPDX-License-Identifier: GPL-3.0-only

//! Focus handlers
//!
//! Tap-to-focus maps viewport pixels into the sensor's normalized space and
//! back again for the focus ring.

use crate::backends::camera::{FocusOutcome, FocusRegion, FocusState, HardwareResult};
use crate::collaborators::FocusIndicator;
use crate::constants::FOCUS_TAP_HALF_EXTENT;
use crate::session::{Dispatch, IgnoreReason, Message, SessionController};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

impl SessionController {
    // =========================================================================
    // Focus Handlers
    // =========================================================================

    /// Viewport size in pixels, used for tap and focus-ring mapping
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Some((width, height));
    }

    /// Set the focus and metering area in normalized coordinates
    pub fn set_focus_area(&mut self, region: FocusRegion) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        match self.camera.set_focus_area(region) {
            Ok(()) => {
                debug!(?region, "Focus area set");
                self.focus_region = Some(region);
                Dispatch::Dispatched
            }
            Err(e) => {
                warn!(error = %e, "Failed to set focus area");
                Dispatch::Ignored(IgnoreReason::Failed)
            }
        }
    }

    /// Focus around a tap at viewport position (`x`, `y`)
    pub fn focus_at(&mut self, x: f32, y: f32) -> Dispatch {
        if let Some(reason) = self.unavailable() {
            return Dispatch::Ignored(reason);
        }
        let Some((width, height)) = self.viewport_size() else {
            debug!("No viewport size, ignoring tap");
            return Dispatch::Ignored(IgnoreReason::Unchanged);
        };

        let mirrored = self.camera.selected().is_front();
        let region =
            FocusRegion::around_viewport_point(x, y, width, height, FOCUS_TAP_HALF_EXTENT, mirrored);
        if let Dispatch::Ignored(reason) = self.set_focus_area(region) {
            return Dispatch::Ignored(reason);
        }
        match self.trigger_auto_focus() {
            Ok(_) => Dispatch::Dispatched,
            Err(reason) => Dispatch::Ignored(reason),
        }
    }

    /// Start an auto-focus cycle
    ///
    /// The receiver fires exactly once: with the result, or with
    /// [`FocusOutcome::Cancelled`] if the camera is released first.
    pub fn trigger_auto_focus(&mut self) -> Result<oneshot::Receiver<FocusOutcome>, IgnoreReason> {
        if let Some(reason) = self.unavailable() {
            return Err(reason);
        }
        if !self
            .camera
            .capabilities()
            .is_some_and(|caps| caps.supports_auto_focus())
        {
            debug!(camera = %self.camera.selected(), "Camera has no auto-focus");
            return Err(IgnoreReason::Unsupported);
        }
        let Some(ticket) = self.camera.trigger_auto_focus() else {
            return Err(IgnoreReason::InFlight);
        };

        info!(generation = ticket.generation, "Auto-focus triggered");
        let generation = ticket.generation;
        self.perform(ticket.future, move |result| Message::AutoFocusDone {
            generation,
            result,
        });
        self.show_focus_indicator(FocusState::Focusing);
        self.refresh_state();
        Ok(ticket.outcome)
    }

    pub(crate) fn handle_auto_focus_done(&mut self, generation: u64, result: HardwareResult<bool>) {
        let Some(state) = self.camera.complete_auto_focus(generation, result) else {
            debug!(generation, "Auto-focus result for a superseded cycle");
            return;
        };
        self.show_focus_indicator(state);

        let (hold, reset) = futures::future::abortable(tokio::time::sleep(self.config.focus_hold()));
        self.camera.arm_focus_reset(reset);
        self.spawn(Box::pin(async move {
            hold.await
                .ok()
                .map(|()| Message::FocusHoldElapsed { generation })
        }));
    }

    pub(crate) fn handle_focus_hold_elapsed(&mut self, generation: u64) {
        if self.camera.expire_focus(generation) {
            self.collaborators.presentation.set_focus_indicator(None);
        }
    }

    fn show_focus_indicator(&self, state: FocusState) {
        let Some((width, height)) = self.viewport_size() else {
            return;
        };
        let region = self.focus_region.unwrap_or_else(FocusRegion::full);
        let area = region.to_viewport(width, height, self.camera.selected().is_front());
        self.collaborators
            .presentation
            .set_focus_indicator(Some(FocusIndicator { state, area }));
    }

    fn viewport_size(&self) -> Option<(f32, f32)> {
        self.viewport.or_else(|| {
            let size = self.camera.applied_settings().picture_size?;
            Some((size.width as f32, size.height as f32))
        })
    }
}
