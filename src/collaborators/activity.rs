// SPDX-License-Identifier: GPL-3.0-only

//! Activity sessions
//!
//! An activity is another application asking the camera for one picture or
//! one video. It can restrict the artifact kinds, impose a size limit, name
//! the output file and be cancelled when the camera loses focus.

use crate::backends::camera::CaptureMode;
use crate::pipelines::ArtifactKind;
use std::sync::atomic::{AtomicBool, Ordering};

/// Artifact kinds an activity accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedKinds {
    pub image: bool,
    pub video: bool,
}

impl AllowedKinds {
    pub const ALL: AllowedKinds = AllowedKinds {
        image: true,
        video: true,
    };

    pub const IMAGE_ONLY: AllowedKinds = AllowedKinds {
        image: true,
        video: false,
    };

    pub const VIDEO_ONLY: AllowedKinds = AllowedKinds {
        image: false,
        video: true,
    };

    pub fn allows(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Image => self.image,
            ArtifactKind::Video => self.video,
        }
    }

    pub fn allows_mode(&self, mode: CaptureMode) -> bool {
        self.allows(ArtifactKind::for_mode(mode))
    }
}

impl Default for AllowedKinds {
    fn default() -> Self {
        Self::ALL
    }
}

pub trait Activity: Send + Sync {
    fn is_active(&self) -> bool;

    fn allowed_kinds(&self) -> AllowedKinds;

    /// Capture mode the activity asked for
    fn mode(&self) -> Option<CaptureMode>;

    fn max_file_size_bytes(&self) -> Option<u64>;

    /// File name the activity wants the artifact stored under
    fn file_name_hint(&self) -> Option<String> {
        None
    }

    fn cancel(&self);
}

/// Regular camera use
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActivity;

impl Activity for NoActivity {
    fn is_active(&self) -> bool {
        false
    }

    fn allowed_kinds(&self) -> AllowedKinds {
        AllowedKinds::ALL
    }

    fn mode(&self) -> Option<CaptureMode> {
        None
    }

    fn max_file_size_bytes(&self) -> Option<u64> {
        None
    }

    fn cancel(&self) {}
}

/// Another application picking a single artifact
#[derive(Debug, Default)]
pub struct PickActivity {
    pub allowed: AllowedKinds,
    pub mode: Option<CaptureMode>,
    pub max_file_size_bytes: Option<u64>,
    pub file_name: Option<String>,
    cancelled: AtomicBool,
}

impl PickActivity {
    pub fn new(allowed: AllowedKinds) -> Self {
        let mode = match (allowed.image, allowed.video) {
            (false, true) => Some(CaptureMode::Video),
            (true, false) => Some(CaptureMode::Picture),
            _ => None,
        };
        Self {
            allowed,
            mode,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = Some(bytes);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Activity for PickActivity {
    fn is_active(&self) -> bool {
        true
    }

    fn allowed_kinds(&self) -> AllowedKinds {
        self.allowed
    }

    fn mode(&self) -> Option<CaptureMode> {
        self.mode
    }

    fn max_file_size_bytes(&self) -> Option<u64> {
        self.max_file_size_bytes
    }

    fn file_name_hint(&self) -> Option<String> {
        self.file_name.clone()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
