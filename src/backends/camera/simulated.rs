// SPDX-License-Identifier: GPL-3.0-only

//! Simulated camera backend
//!
//! Behaves like a phone with a back camera (flash, HDR, zoom, auto-focus) and
//! a fixed-focus front camera. [`SimulatedControls`] is shared with every
//! handle the provider opens so callers can inject failures, push hardware
//! events and inspect what the session did to the device.

use super::focus::FocusRegion;
use super::types::*;
use super::{CameraHardware, CameraProvider, HardwareEventReceiver, HardwareFuture};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

/// Default size of a simulated still
const DEFAULT_PICTURE_BYTES: usize = 2048;

/// Default size of a simulated recording when no progress was reported
const DEFAULT_VIDEO_BYTES: usize = 8192;

#[derive(Debug)]
struct ControlState {
    busy: HashSet<CameraId>,
    open_delay: Duration,
    configure_delay: Duration,
    focus_delay: Duration,
    picture_delay: Duration,
    fail_configure: Option<String>,
    fail_picture: Option<String>,
    fail_autofocus: bool,
    autofocus_result: bool,
    fail_stop_recording: Option<String>,
    hang_stop_recording: bool,
    designated_poster: bool,
    picture_bytes: usize,
    video_bytes: usize,
    progress: Option<(Duration, u64)>,

    open_handles: usize,
    max_open_handles: usize,
    release_calls: usize,
    abort_calls: usize,
    pictures_taken: usize,
    applied: Vec<CameraSettings>,
    zoom: Option<f32>,
    focus_area: Option<FocusRegion>,
    preview_running: bool,
    recording: bool,
    recorded_bytes: u64,
    recording_limit: Option<u64>,
    events: Option<UnboundedSender<HardwareEvent>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            busy: HashSet::new(),
            open_delay: Duration::ZERO,
            configure_delay: Duration::ZERO,
            focus_delay: Duration::ZERO,
            picture_delay: Duration::ZERO,
            fail_configure: None,
            fail_picture: None,
            fail_autofocus: false,
            autofocus_result: true,
            fail_stop_recording: None,
            hang_stop_recording: false,
            designated_poster: false,
            picture_bytes: DEFAULT_PICTURE_BYTES,
            video_bytes: DEFAULT_VIDEO_BYTES,
            progress: None,
            open_handles: 0,
            max_open_handles: 0,
            release_calls: 0,
            abort_calls: 0,
            pictures_taken: 0,
            applied: Vec::new(),
            zoom: None,
            focus_area: None,
            preview_running: false,
            recording: false,
            recorded_bytes: 0,
            recording_limit: None,
            events: None,
        }
    }
}

/// Failure injection and inspection for the simulated cameras
#[derive(Debug, Clone, Default)]
pub struct SimulatedControls {
    state: Arc<Mutex<ControlState>>,
}

impl SimulatedControls {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Failure injection =====

    /// Mark a camera as held by another process
    pub fn set_busy(&self, id: impl Into<CameraId>, busy: bool) {
        let id = id.into();
        let mut state = self.lock();
        if busy {
            state.busy.insert(id);
        } else {
            state.busy.remove(&id);
        }
    }

    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = delay;
    }

    pub fn set_configure_delay(&self, delay: Duration) {
        self.lock().configure_delay = delay;
    }

    pub fn set_focus_delay(&self, delay: Duration) {
        self.lock().focus_delay = delay;
    }

    pub fn set_picture_delay(&self, delay: Duration) {
        self.lock().picture_delay = delay;
    }

    pub fn fail_configure(&self, reason: Option<&str>) {
        self.lock().fail_configure = reason.map(str::to_string);
    }

    pub fn fail_picture(&self, reason: Option<&str>) {
        self.lock().fail_picture = reason.map(str::to_string);
    }

    pub fn fail_autofocus(&self, fail: bool) {
        self.lock().fail_autofocus = fail;
    }

    /// Whether auto-focus locks (`true`) or gives up (`false`)
    pub fn set_autofocus_result(&self, focused: bool) {
        self.lock().autofocus_result = focused;
    }

    pub fn fail_stop_recording(&self, reason: Option<&str>) {
        self.lock().fail_stop_recording = reason.map(str::to_string);
    }

    /// Make stop_recording never complete
    pub fn hang_stop_recording(&self, hang: bool) {
        self.lock().hang_stop_recording = hang;
    }

    /// Return an encoded keyframe poster from stop_recording
    pub fn set_designated_poster(&self, enabled: bool) {
        self.lock().designated_poster = enabled;
    }

    pub fn set_picture_bytes(&self, bytes: usize) {
        self.lock().picture_bytes = bytes;
    }

    pub fn set_video_bytes(&self, bytes: usize) {
        self.lock().video_bytes = bytes;
    }

    /// Report `bytes_per_tick` of recording progress every `every`
    pub fn set_progress(&self, every: Duration, bytes_per_tick: u64) {
        self.lock().progress = Some((every, bytes_per_tick));
    }

    /// Push a hardware event to the most recently opened handle
    pub fn emit(&self, event: HardwareEvent) -> bool {
        match &self.lock().events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    // ===== Inspection =====

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    pub fn max_open_handles(&self) -> usize {
        self.lock().max_open_handles
    }

    pub fn release_calls(&self) -> usize {
        self.lock().release_calls
    }

    pub fn abort_calls(&self) -> usize {
        self.lock().abort_calls
    }

    pub fn pictures_taken(&self) -> usize {
        self.lock().pictures_taken
    }

    pub fn applied(&self) -> Vec<CameraSettings> {
        self.lock().applied.clone()
    }

    pub fn last_applied(&self) -> Option<CameraSettings> {
        self.lock().applied.last().cloned()
    }

    pub fn zoom(&self) -> Option<f32> {
        self.lock().zoom
    }

    pub fn focus_area(&self) -> Option<FocusRegion> {
        self.lock().focus_area
    }

    pub fn preview_running(&self) -> bool {
        self.lock().preview_running
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording
    }

    pub fn recording_limit(&self) -> Option<u64> {
        self.lock().recording_limit
    }

    /// Add recorded bytes and report progress; false once recording stopped
    fn advance_recording(&self, bytes: u64) -> bool {
        let mut state = self.lock();
        if !state.recording {
            return false;
        }
        state.recorded_bytes += bytes;
        let recorded = state.recorded_bytes;
        let reached = state.recording_limit.is_some_and(|limit| recorded >= limit);
        if let Some(tx) = &state.events {
            let _ = tx.send(HardwareEvent::RecordingProgress { bytes: recorded });
            if reached {
                let _ = tx.send(HardwareEvent::FileSizeLimitReached);
            }
        }
        !reached
    }
}

/// Capability set of the simulated back camera
pub fn back_camera_capabilities() -> CapabilitySet {
    CapabilitySet {
        picture_sizes: vec![
            PictureSize::new(640, 480),
            PictureSize::new(1280, 960),
            PictureSize::new(2592, 1944),
        ],
        recorder_profiles: vec![
            RecorderProfile::new("720p", 1280, 720),
            RecorderProfile::new("cif", 352, 288),
            RecorderProfile::new("1080p", 1920, 1080),
        ],
        flash_modes: vec![FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch],
        zoom: ZoomRange::new(1.0, 4.0),
        focus_modes: vec![FocusMode::Auto, FocusMode::Continuous],
        white_balance_modes: vec![
            WhiteBalanceMode::Auto,
            WhiteBalanceMode::Daylight,
            WhiteBalanceMode::Cloudy,
        ],
        hdr: true,
    }
}

/// Capability set of the simulated front camera
pub fn front_camera_capabilities() -> CapabilitySet {
    CapabilitySet {
        picture_sizes: vec![PictureSize::new(640, 480), PictureSize::new(1280, 960)],
        recorder_profiles: vec![
            RecorderProfile::new("cif", 352, 288),
            RecorderProfile::new("720p", 1280, 720),
        ],
        flash_modes: vec![FlashMode::Off],
        zoom: ZoomRange::default(),
        focus_modes: vec![FocusMode::Fixed],
        white_balance_modes: vec![WhiteBalanceMode::Auto],
        hdr: false,
    }
}

/// Provider for the simulated cameras
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    cameras: Vec<(CameraId, CapabilitySet)>,
    controls: SimulatedControls,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    /// Back and front camera
    pub fn new() -> Self {
        Self::with_cameras(vec![
            (CameraId::new("back"), back_camera_capabilities()),
            (CameraId::new("front"), front_camera_capabilities()),
        ])
    }

    pub fn with_cameras(cameras: Vec<(CameraId, CapabilitySet)>) -> Self {
        Self {
            cameras,
            controls: SimulatedControls::default(),
        }
    }

    pub fn controls(&self) -> SimulatedControls {
        self.controls.clone()
    }
}

impl CameraProvider for SimulatedProvider {
    fn list_cameras(&self) -> Vec<CameraId> {
        self.cameras.iter().map(|(id, _)| id.clone()).collect()
    }

    fn capabilities(&self, id: &CameraId) -> HardwareResult<CapabilitySet> {
        self.cameras
            .iter()
            .find(|(camera, _)| camera == id)
            .map(|(_, caps)| caps.clone())
            .ok_or_else(|| HardwareError::Unavailable(id.to_string()))
    }

    fn open(&self, id: &CameraId) -> HardwareFuture<Arc<dyn CameraHardware>> {
        let controls = self.controls.clone();
        let id = id.clone();
        let exists = self.cameras.iter().any(|(camera, _)| *camera == id);

        Box::pin(async move {
            if !exists {
                return Err(HardwareError::Unavailable(id.to_string()));
            }
            let delay = controls.lock().open_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            {
                let mut state = controls.lock();
                if state.busy.contains(&id) {
                    return Err(HardwareError::Busy);
                }
                state.open_handles += 1;
                state.max_open_handles = state.max_open_handles.max(state.open_handles);
                state.events = Some(tx.clone());
            }
            info!(camera = %id, "Simulated camera opened");

            let camera: Arc<dyn CameraHardware> = Arc::new(SimulatedCamera {
                id,
                controls,
                events_tx: tx,
                events_rx: Mutex::new(Some(rx)),
                released: AtomicBool::new(false),
            });
            Ok(camera)
        })
    }
}

/// Open handle to a simulated camera
#[derive(Debug)]
pub struct SimulatedCamera {
    id: CameraId,
    controls: SimulatedControls,
    events_tx: UnboundedSender<HardwareEvent>,
    events_rx: Mutex<Option<HardwareEventReceiver>>,
    released: AtomicBool,
}

impl SimulatedCamera {
    fn check_open(&self) -> HardwareResult<()> {
        if self.released.load(Ordering::SeqCst) {
            Err(HardwareError::Released)
        } else {
            Ok(())
        }
    }
}

/// Fake JPEG payload of the given size
fn jpeg_payload(len: usize) -> Vec<u8> {
    let mut blob = vec![0u8; len.max(4)];
    blob[0] = 0xFF;
    blob[1] = 0xD8;
    let end = blob.len();
    blob[end - 2] = 0xFF;
    blob[end - 1] = 0xD9;
    blob
}

/// Small gradient frame standing in for the last recorded frame
fn gradient_frame(width: u32, height: u32) -> RawFrame {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            rgba.extend_from_slice(&[(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255]);
        }
    }
    RawFrame {
        width,
        height,
        rgba,
    }
}

impl CameraHardware for SimulatedCamera {
    fn id(&self) -> &CameraId {
        &self.id
    }

    fn take_events(&self) -> Option<HardwareEventReceiver> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn apply(&self, settings: &CameraSettings) -> HardwareFuture<()> {
        let controls = self.controls.clone();
        let settings = settings.clone();
        let open = self.check_open();
        Box::pin(async move {
            open?;
            let delay = controls.lock().configure_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = controls.lock();
            if let Some(reason) = &state.fail_configure {
                return Err(HardwareError::Failed(reason.clone()));
            }
            debug!(?settings, "Simulated camera configured");
            state.applied.push(settings);
            Ok(())
        })
    }

    fn set_zoom(&self, value: f32) -> HardwareResult<()> {
        self.check_open()?;
        self.controls.lock().zoom = Some(value);
        Ok(())
    }

    fn set_focus_area(&self, region: FocusRegion) -> HardwareResult<()> {
        self.check_open()?;
        self.controls.lock().focus_area = Some(region);
        Ok(())
    }

    fn auto_focus(&self) -> HardwareFuture<bool> {
        let controls = self.controls.clone();
        let open = self.check_open();
        Box::pin(async move {
            open?;
            let delay = controls.lock().focus_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let state = controls.lock();
            if state.fail_autofocus {
                return Err(HardwareError::Failed("auto-focus motor error".to_string()));
            }
            Ok(state.autofocus_result)
        })
    }

    fn start_preview(&self) -> HardwareResult<()> {
        self.check_open()?;
        self.controls.lock().preview_running = true;
        Ok(())
    }

    fn stop_preview(&self) -> HardwareResult<()> {
        self.check_open()?;
        self.controls.lock().preview_running = false;
        Ok(())
    }

    fn resume_preview(&self) -> HardwareResult<()> {
        self.start_preview()
    }

    fn take_picture(&self, request: PictureRequest) -> HardwareFuture<Vec<u8>> {
        let controls = self.controls.clone();
        let events = self.events_tx.clone();
        let open = self.check_open();
        Box::pin(async move {
            open?;
            if request.pause_preview {
                controls.lock().preview_running = false;
            }
            let _ = events.send(HardwareEvent::Shutter);
            let delay = controls.lock().picture_delay;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut state = controls.lock();
            if let Some(reason) = &state.fail_picture {
                return Err(HardwareError::Failed(reason.clone()));
            }
            state.pictures_taken += 1;
            Ok(jpeg_payload(state.picture_bytes))
        })
    }

    fn start_recording(&self, request: RecordingRequest) -> HardwareFuture<()> {
        let controls = self.controls.clone();
        let open = self.check_open();
        Box::pin(async move {
            open?;
            let progress = {
                let mut state = controls.lock();
                if state.recording {
                    return Err(HardwareError::Failed("recorder already running".to_string()));
                }
                state.recording = true;
                state.recorded_bytes = 0;
                state.recording_limit = request.max_file_size_bytes;
                state.progress
            };
            debug!(path = %request.path.display(), "Simulated recording started");

            if let Some((every, step)) = progress {
                let controls = controls.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(every);
                    // First tick completes immediately
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        if !controls.advance_recording(step) {
                            break;
                        }
                    }
                });
            }
            Ok(())
        })
    }

    fn stop_recording(&self) -> HardwareFuture<RecordedVideo> {
        let controls = self.controls.clone();
        let open = self.check_open();
        Box::pin(async move {
            open?;
            let hang = controls.lock().hang_stop_recording;
            if hang {
                futures::future::pending::<()>().await;
            }
            let mut state = controls.lock();
            if !state.recording {
                return Err(HardwareError::Failed("recorder not running".to_string()));
            }
            state.recording = false;
            if let Some(reason) = &state.fail_stop_recording {
                return Err(HardwareError::Failed(reason.clone()));
            }
            let mut len = (state.recorded_bytes as usize).max(state.video_bytes);
            if let Some(limit) = state.recording_limit {
                len = len.min(limit as usize);
            }
            let poster = state.designated_poster.then(|| jpeg_payload(256));
            Ok(RecordedVideo {
                blob: vec![0u8; len],
                poster,
                last_frame: Some(gradient_frame(8, 6)),
            })
        })
    }

    fn abort_recording(&self) -> HardwareResult<()> {
        self.check_open()?;
        let mut state = self.controls.lock();
        state.abort_calls += 1;
        state.recording = false;
        Ok(())
    }

    fn release(&self) -> HardwareResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.controls.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
        state.release_calls += 1;
        state.recording = false;
        state.preview_running = false;
        if state
            .events
            .as_ref()
            .is_some_and(|tx| tx.same_channel(&self.events_tx))
        {
            state.events = None;
        }
        info!(camera = %self.id, "Simulated camera released");
        Ok(())
    }
}
