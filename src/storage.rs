// SPDX-License-Identifier: GPL-3.0-only

//! Artifact storage
//!
//! The session hands every accepted artifact to a [`Storage`] exactly once
//! and never retries. Two implementations:
//! - [`DirectoryStorage`]: writes into a directory with DCF style names
//!   (`IMG_0001.jpg`, `VID_0001.3gp`)
//! - [`MemoryStorage`]: keeps artifacts in memory, for tests and dry runs

use crate::constants::file_formats;
use crate::errors::StorageError;
use crate::pipelines::ArtifactKind;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Storage problem reported to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCondition {
    Full,
    Unavailable,
    Error(String),
}

impl From<&StorageError> for StorageCondition {
    fn from(error: &StorageError) -> Self {
        match error {
            StorageError::Full => StorageCondition::Full,
            StorageError::Unavailable(_) => StorageCondition::Unavailable,
            StorageError::Io(reason) => StorageCondition::Error(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Less room left than one maximum-size artifact
    Full,
    Unavailable,
}

impl HealthStatus {
    /// Condition to report, `None` when healthy
    pub fn condition(self) -> Option<StorageCondition> {
        match self {
            HealthStatus::Healthy => None,
            HealthStatus::Full => Some(StorageCondition::Full),
            HealthStatus::Unavailable => Some(StorageCondition::Unavailable),
        }
    }
}

pub trait Storage: Send + Sync {
    /// Persist one artifact
    ///
    /// `hint` is a file name requested by the activity; without it the
    /// storage picks the name.
    fn persist(
        &self,
        blob: Arc<[u8]>,
        kind: ArtifactKind,
        hint: Option<String>,
    ) -> BoxFuture<'static, Result<PathBuf, StorageError>>;

    /// Largest artifact the session may hand over
    fn set_max_artifact_size(&self, bytes: u64);

    fn check_health(&self) -> HealthStatus;
}

/// Storage backed by a directory
#[derive(Debug)]
pub struct DirectoryStorage {
    dir: PathBuf,
    next_number: Arc<AtomicU32>,
    capacity: Option<u64>,
    used: Arc<AtomicU64>,
    max_artifact_size: AtomicU64,
}

impl DirectoryStorage {
    /// Store into `dir`, numbering after the highest existing DCF name
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let highest = highest_dcf_number(&dir);
        debug!(dir = %dir.display(), highest, "Directory storage opened");
        Self {
            dir,
            next_number: Arc::new(AtomicU32::new(highest + 1)),
            capacity: None,
            used: Arc::new(AtomicU64::new(0)),
            max_artifact_size: AtomicU64::new(0),
        }
    }

    /// Limit the bytes this storage accepts in total
    pub fn with_capacity(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes written through this storage
    pub fn used_bytes(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    fn file_name(&self, kind: ArtifactKind, hint: Option<String>) -> Result<String, StorageError> {
        if let Some(name) = hint
            .as_deref()
            .and_then(|hint| Path::new(hint).file_name())
            .and_then(|name| name.to_str())
        {
            return Ok(name.to_string());
        }
        next_dcf_name(&self.next_number, kind)
    }
}

impl Storage for DirectoryStorage {
    fn persist(
        &self,
        blob: Arc<[u8]>,
        kind: ArtifactKind,
        hint: Option<String>,
    ) -> BoxFuture<'static, Result<PathBuf, StorageError>> {
        let len = blob.len() as u64;
        let reserved = match self.capacity {
            Some(capacity) => self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    (used + len <= capacity).then_some(used + len)
                })
                .is_ok(),
            None => {
                self.used.fetch_add(len, Ordering::SeqCst);
                true
            }
        };
        if !reserved {
            warn!(kind = %kind, bytes = len, "Storage full, artifact dropped");
            return Box::pin(async { Err(StorageError::Full) });
        }

        let name = self.file_name(kind, hint);
        let dir = self.dir.clone();
        let used = Arc::clone(&self.used);
        let next_number = Arc::clone(&self.next_number);
        Box::pin(async move {
            let written = match name {
                Ok(name) => write_artifact(&dir, &name, kind, &next_number, &blob).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(path) => {
                    info!(path = %path.display(), bytes = len, "Artifact persisted");
                    Ok(path)
                }
                Err(e) => {
                    used.fetch_sub(len, Ordering::SeqCst);
                    warn!(kind = %kind, error = %e, "Failed to persist artifact");
                    Err(e)
                }
            }
        })
    }

    fn set_max_artifact_size(&self, bytes: u64) {
        self.max_artifact_size.store(bytes, Ordering::SeqCst);
    }

    fn check_health(&self) -> HealthStatus {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Storage directory unavailable");
            return HealthStatus::Unavailable;
        }
        if let Some(capacity) = self.capacity {
            let remaining = capacity.saturating_sub(self.used_bytes());
            if remaining < self.max_artifact_size.load(Ordering::SeqCst) {
                return HealthStatus::Full;
            }
        }
        HealthStatus::Healthy
    }
}

/// Write `blob` under `name`, never replacing an existing file
///
/// A taken name moves on to the next free DCF name.
async fn write_artifact(
    dir: &Path,
    name: &str,
    kind: ArtifactKind,
    next_number: &AtomicU32,
    blob: &[u8],
) -> Result<PathBuf, StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?;

    let mut path = dir.join(name);
    loop {
        match create_new(&path, blob).await {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let fallback = dir.join(next_dcf_name(next_number, kind)?);
                warn!(
                    taken = %path.display(),
                    fallback = %fallback.display(),
                    "File already exists, using next free name"
                );
                path = fallback;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn create_new(path: &Path, blob: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(blob).await?;
    file.flush().await
}

fn next_dcf_name(next_number: &AtomicU32, kind: ArtifactKind) -> Result<String, StorageError> {
    let number = next_number.fetch_add(1, Ordering::SeqCst);
    if number > file_formats::MAX_FILE_NUMBER {
        return Err(StorageError::Full);
    }
    Ok(dcf_name(kind, number))
}

fn dcf_name(kind: ArtifactKind, number: u32) -> String {
    let (prefix, extension) = match kind {
        ArtifactKind::Image => (file_formats::IMAGE_PREFIX, file_formats::IMAGE_EXTENSION),
        ArtifactKind::Video => (file_formats::VIDEO_PREFIX, file_formats::VIDEO_EXTENSION),
    };
    format!("{}{:04}.{}", prefix, number, extension)
}

/// Number of a DCF file name such as `IMG_0042.jpg`
fn dcf_number(name: &str) -> Option<u32> {
    let rest = name
        .strip_prefix(file_formats::IMAGE_PREFIX)
        .or_else(|| name.strip_prefix(file_formats::VIDEO_PREFIX))?;
    let (digits, _) = rest.split_once('.')?;
    if digits.len() != 4 {
        return None;
    }
    digits.parse().ok()
}

fn highest_dcf_number(dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter_map(|entry| dcf_number(&entry.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0)
}

/// Artifact held by [`MemoryStorage`]
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub blob: Arc<[u8]>,
    pub hint: Option<String>,
}

#[derive(Debug)]
struct MemoryState {
    stored: Vec<StoredArtifact>,
    fail_with: Option<StorageError>,
    health: HealthStatus,
    health_checks: usize,
    max_artifact_size: Option<u64>,
}

/// In-memory storage; clones share the same contents
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                stored: Vec::new(),
                fail_with: None,
                health: HealthStatus::Healthy,
                health_checks: 0,
                max_artifact_size: None,
            })),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every following persist fail with `error`
    pub fn fail_with(&self, error: Option<StorageError>) {
        self.lock().fail_with = error;
    }

    pub fn set_health(&self, health: HealthStatus) {
        self.lock().health = health;
    }

    pub fn stored(&self) -> Vec<StoredArtifact> {
        self.lock().stored.clone()
    }

    pub fn health_checks(&self) -> usize {
        self.lock().health_checks
    }

    pub fn max_artifact_size(&self) -> Option<u64> {
        self.lock().max_artifact_size
    }
}

impl Storage for MemoryStorage {
    fn persist(
        &self,
        blob: Arc<[u8]>,
        kind: ArtifactKind,
        hint: Option<String>,
    ) -> BoxFuture<'static, Result<PathBuf, StorageError>> {
        let result = {
            let mut state = self.lock();
            match state.fail_with.clone() {
                Some(error) => Err(error),
                None => {
                    let number = state.stored.len() as u32 + 1;
                    let path = PathBuf::from(hint.clone().unwrap_or_else(|| dcf_name(kind, number)));
                    state.stored.push(StoredArtifact {
                        path: path.clone(),
                        kind,
                        blob,
                        hint,
                    });
                    Ok(path)
                }
            }
        };
        Box::pin(async move { result })
    }

    fn set_max_artifact_size(&self, bytes: u64) {
        self.lock().max_artifact_size = Some(bytes);
    }

    fn check_health(&self) -> HealthStatus {
        let mut state = self.lock();
        state.health_checks += 1;
        state.health
    }
}
