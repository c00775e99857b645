// SPDX-License-Identifier: GPL-3.0-only

//! External collaborators of the session
//!
//! # Modules
//!
//! - [`activity`]: Requests from other applications (pick one artifact)
//! - [`presentation`]: Viewfinder, focus ring, zoom and alert rendering
//! - [`filmstrip`]: Recently captured artifacts
//!
//! Storage lives in [`crate::storage`].

pub mod activity;
pub mod filmstrip;
pub mod presentation;

pub use activity::{Activity, AllowedKinds, NoActivity, PickActivity};
pub use filmstrip::{Filmstrip, FilmstripEntry, NullFilmstrip, RecordingFilmstrip};
pub use presentation::{
    AlertKey, FocusIndicator, NullPresentation, Presentation, PresentationCall, PreviewDescriptor,
    RecordingPresentation,
};

use crate::storage::{MemoryStorage, Storage};
use std::sync::Arc;

/// Everything outside the session it talks to
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn Storage>,
    pub activity: Arc<dyn Activity>,
    pub presentation: Arc<dyn Presentation>,
    pub filmstrip: Arc<dyn Filmstrip>,
}

impl Collaborators {
    /// No activity and nothing rendered
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            activity: Arc::new(NoActivity),
            presentation: Arc::new(NullPresentation),
            filmstrip: Arc::new(NullFilmstrip),
        }
    }

    pub fn with_activity(mut self, activity: Arc<dyn Activity>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_presentation(mut self, presentation: Arc<dyn Presentation>) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn with_filmstrip(mut self, filmstrip: Arc<dyn Filmstrip>) -> Self {
        self.filmstrip = filmstrip;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }
}
