// SPDX-License-Identifier: GPL-3.0-only

//! Filmstrip of recently captured artifacts

use crate::pipelines::ArtifactMeta;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait Filmstrip: Send + Sync {
    fn add_image(&self, path: &Path, meta: &ArtifactMeta);

    fn add_video(&self, path: &Path, poster: Option<&[u8]>, meta: &ArtifactMeta);

    fn clear(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullFilmstrip;

impl Filmstrip for NullFilmstrip {
    fn add_image(&self, _path: &Path, _meta: &ArtifactMeta) {}

    fn add_video(&self, _path: &Path, _poster: Option<&[u8]>, _meta: &ArtifactMeta) {}

    fn clear(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmstripEntry {
    pub path: PathBuf,
    pub is_video: bool,
    pub has_poster: bool,
}

#[derive(Debug, Default)]
struct FilmstripState {
    entries: Vec<FilmstripEntry>,
    clears: usize,
}

/// Keeps entries in memory; clones share the list
#[derive(Debug, Default, Clone)]
pub struct RecordingFilmstrip {
    state: Arc<Mutex<FilmstripState>>,
}

impl RecordingFilmstrip {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FilmstripState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self) -> Vec<FilmstripEntry> {
        self.lock().entries.clone()
    }

    pub fn clears(&self) -> usize {
        self.lock().clears
    }
}

impl Filmstrip for RecordingFilmstrip {
    fn add_image(&self, path: &Path, _meta: &ArtifactMeta) {
        self.lock().entries.push(FilmstripEntry {
            path: path.to_path_buf(),
            is_video: false,
            has_poster: false,
        });
    }

    fn add_video(&self, path: &Path, poster: Option<&[u8]>, _meta: &ArtifactMeta) {
        self.lock().entries.push(FilmstripEntry {
            path: path.to_path_buf(),
            is_video: true,
            has_poster: poster.is_some(),
        });
    }

    fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.clears += 1;
    }
}
