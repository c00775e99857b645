// SPDX-License-Identifier: GPL-3.0-only

//! Focus state machine and focus-area coordinates
//!
//! Focus areas are expressed in the sensor's normalized space: -1000..1000 on
//! each axis with the origin at the sensor centre. The UI works in viewport
//! pixels, so both directions of the mapping live here.
//!
//! A focus cycle runs `None -> Focusing -> Focused|Failed -> None`. The last
//! transition happens after a hold period driven by the session's timer; a new
//! trigger aborts the pending reset and starts over.

use crate::constants::{FOCUS_AREA_MAX, FOCUS_AREA_MIN};
use futures::future::AbortHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FocusState {
    #[default]
    None,
    Focusing,
    Focused,
    Failed,
}

impl std::fmt::Display for FocusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusState::None => write!(f, "none"),
            FocusState::Focusing => write!(f, "focusing"),
            FocusState::Focused => write!(f, "focused"),
            FocusState::Failed => write!(f, "failed"),
        }
    }
}

/// Result delivered to whoever triggered auto-focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Focused,
    Failed,
    /// Handle released or cycle abandoned before the hardware answered
    Cancelled,
}

/// Rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Focus/metering area in normalized sensor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl FocusRegion {
    /// Build a region, clamping to the sensor space and ordering the edges
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        let clamp = |v: i32| v.clamp(FOCUS_AREA_MIN, FOCUS_AREA_MAX);
        let (left, right) = (clamp(left.min(right)), clamp(left.max(right)));
        let (top, bottom) = (clamp(top.min(bottom)), clamp(top.max(bottom)));
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Whole sensor, used to reset metering
    pub fn full() -> Self {
        Self::new(FOCUS_AREA_MIN, FOCUS_AREA_MIN, FOCUS_AREA_MAX, FOCUS_AREA_MAX)
    }

    /// Square region around a tap in viewport pixels
    ///
    /// # Arguments
    /// * `x`, `y` - Tap position in viewport pixels
    /// * `viewport_width`, `viewport_height` - Viewport size in pixels
    /// * `half_extent` - Half the side of the region, in normalized units
    /// * `mirrored` - Preview is horizontally mirrored (front camera)
    pub fn around_viewport_point(
        x: f32,
        y: f32,
        viewport_width: f32,
        viewport_height: f32,
        half_extent: i32,
        mirrored: bool,
    ) -> Self {
        let mut cx = to_normalized(x, viewport_width);
        let cy = to_normalized(y, viewport_height);
        if mirrored {
            cx = -cx;
        }
        let half = half_extent.abs();
        Self::new(cx - half, cy - half, cx + half, cy + half)
    }

    /// Place the region in viewport pixels (for drawing focus rings and faces)
    pub fn to_viewport(&self, viewport_width: f32, viewport_height: f32, mirrored: bool) -> ViewportRect {
        let (mut left, mut right) = (self.left, self.right);
        if mirrored {
            (left, right) = (-right, -left);
        }
        let x = to_pixels(left, viewport_width);
        let y = to_pixels(self.top, viewport_height);
        ViewportRect {
            x,
            y,
            width: to_pixels(right, viewport_width) - x,
            height: to_pixels(self.bottom, viewport_height) - y,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

fn span() -> f32 {
    (FOCUS_AREA_MAX - FOCUS_AREA_MIN) as f32
}

fn to_normalized(pixels: f32, extent: f32) -> i32 {
    if extent <= 0.0 {
        return 0;
    }
    let ratio = (pixels / extent).clamp(0.0, 1.0);
    (ratio * span()).round() as i32 + FOCUS_AREA_MIN
}

fn to_pixels(normalized: i32, extent: f32) -> f32 {
    (normalized - FOCUS_AREA_MIN) as f32 / span() * extent
}

/// One auto-focus cycle at a time, with a single-fire completion
#[derive(Debug, Default)]
pub(crate) struct FocusCycle {
    state: FocusState,
    generation: u64,
    reply: Option<oneshot::Sender<FocusOutcome>>,
    reset: Option<AbortHandle>,
}

impl FocusCycle {
    pub fn state(&self) -> FocusState {
        self.state
    }

    /// Start a cycle; `None` if one is already focusing
    pub fn begin(&mut self) -> Option<(u64, oneshot::Receiver<FocusOutcome>)> {
        if self.state == FocusState::Focusing {
            return None;
        }
        self.cancel_reset();
        self.generation += 1;
        let (tx, rx) = oneshot::channel();
        self.reply = Some(tx);
        self.state = FocusState::Focusing;
        Some((self.generation, rx))
    }

    /// Record the hardware answer; `None` if the cycle was superseded
    pub fn complete(&mut self, generation: u64, focused: bool) -> Option<FocusState> {
        if generation != self.generation || self.state != FocusState::Focusing {
            return None;
        }
        let (state, outcome) = if focused {
            (FocusState::Focused, FocusOutcome::Focused)
        } else {
            (FocusState::Failed, FocusOutcome::Failed)
        };
        self.state = state;
        self.reply(outcome);
        Some(state)
    }

    /// Remember the pending reset timer so a new trigger can abort it
    pub fn arm_reset(&mut self, handle: AbortHandle) {
        self.cancel_reset();
        self.reset = Some(handle);
    }

    /// Hold period elapsed; returns true if the state went back to `None`
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation
            || !matches!(self.state, FocusState::Focused | FocusState::Failed)
        {
            return false;
        }
        self.reset = None;
        self.state = FocusState::None;
        true
    }

    /// Abandon everything; returns true if the state changed
    pub fn reset(&mut self) -> bool {
        self.cancel_reset();
        self.reply(FocusOutcome::Cancelled);
        self.generation += 1;
        let changed = self.state != FocusState::None;
        self.state = FocusState::None;
        changed
    }

    fn reply(&mut self, outcome: FocusOutcome) {
        if let Some(tx) = self.reply.take() {
            // Receiver may have been dropped by a caller that doesn't care
            let _ = tx.send(outcome);
        }
    }

    fn cancel_reset(&mut self) {
        if let Some(handle) = self.reset.take() {
            handle.abort();
        }
    }
}

impl Drop for FocusCycle {
    fn drop(&mut self) {
        self.cancel_reset();
        self.reply(FocusOutcome::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_clamped_and_ordered() {
        let region = FocusRegion::new(500, 1500, -2000, 0);
        assert_eq!(region, FocusRegion::new(-1000, 0, 500, 1000));
        assert_eq!(region.left, -1000);
        assert_eq!(region.bottom, 1000);
    }

    #[test]
    fn test_viewport_centre_maps_to_origin() {
        let region = FocusRegion::around_viewport_point(320.0, 240.0, 640.0, 480.0, 100, false);
        assert_eq!(region.center(), (0, 0));
        assert_eq!(region, FocusRegion::new(-100, -100, 100, 100));
    }

    #[test]
    fn test_viewport_mapping_mirrored() {
        let plain = FocusRegion::around_viewport_point(0.0, 0.0, 640.0, 480.0, 50, false);
        let mirrored = FocusRegion::around_viewport_point(0.0, 0.0, 640.0, 480.0, 50, true);
        assert_eq!(plain.center().0, -975);
        assert_eq!(mirrored.center().0, 975);
    }

    #[test]
    fn test_to_viewport() {
        let rect = FocusRegion::full().to_viewport(640.0, 480.0, false);
        assert_eq!(rect, ViewportRect { x: 0.0, y: 0.0, width: 640.0, height: 480.0 });

        let right_half = FocusRegion::new(0, -1000, 1000, 1000);
        let rect = right_half.to_viewport(200.0, 100.0, true);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.width, 100.0);
    }

    #[test]
    fn test_cycle_rejects_overlapping_trigger() {
        let mut cycle = FocusCycle::default();
        assert!(cycle.begin().is_some());
        assert!(cycle.begin().is_none());
        assert_eq!(cycle.state(), FocusState::Focusing);
    }

    #[test]
    fn test_cycle_completion_fires_once() {
        let mut cycle = FocusCycle::default();
        let (generation, mut rx) = cycle.begin().unwrap();
        assert_eq!(cycle.complete(generation, true), Some(FocusState::Focused));
        assert_eq!(rx.try_recv(), Ok(FocusOutcome::Focused));

        // A late duplicate answer is ignored
        assert_eq!(cycle.complete(generation, false), None);
        assert_eq!(cycle.state(), FocusState::Focused);
    }

    #[test]
    fn test_cycle_reset_cancels_waiter() {
        let mut cycle = FocusCycle::default();
        let (generation, mut rx) = cycle.begin().unwrap();
        assert!(cycle.reset());
        assert_eq!(rx.try_recv(), Ok(FocusOutcome::Cancelled));
        assert_eq!(cycle.complete(generation, true), None);
        assert!(!cycle.reset());
    }

    #[test]
    fn test_stale_expiry_ignored() {
        let mut cycle = FocusCycle::default();
        let (first, _rx1) = cycle.begin().unwrap();
        cycle.complete(first, true);

        let (second, _rx2) = cycle.begin().unwrap();
        assert!(!cycle.expire(first));
        cycle.complete(second, false);
        assert!(cycle.expire(second));
        assert_eq!(cycle.state(), FocusState::None);
    }

    #[test]
    fn test_drop_cancels_waiter() {
        let mut cycle = FocusCycle::default();
        let (_, mut rx) = cycle.begin().unwrap();
        drop(cycle);
        assert_eq!(rx.try_recv(), Ok(FocusOutcome::Cancelled));
    }
}
