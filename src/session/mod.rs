// SPDX-License-Identifier: GPL-3.0-only

//! Session controller
//!
//! Top-level state machine over a single camera. It owns the
//! [`CameraResource`], the [`SettingsCoordinator`] and the
//! [`CapturePipeline`], and sequences acquisition and release around the
//! lifecycle events of the host (boot, focus, blur).
//!
//! ```text
//!            load / focus / boot
//! Unloaded ──────────────────────▶ Loading ──▶ Ready ◀──▶ Busy
//!    ▲                                 │          │
//!    │          blur / teardown        │          ▼
//!    └─────────────────────────────────┴──── Recording
//! ```
//!
//! Everything runs on one cooperative loop. Public operations start hardware
//! work and return immediately with a [`Dispatch`]; completions come back as
//! [`Message`]s through [`SessionController::process_next`] or
//! [`SessionController::run`] and are handled by [`SessionController::update`].
//!
//! # Handler Modules
//!
//! - `handlers::lifecycle`: load, focus, blur, teardown
//! - `handlers::settings`: mode, flash, settings, zoom, camera switching
//! - `handlers::capture`: stills, recording, storage hand-off, hardware events
//! - `handlers::focus`: focus areas, auto-focus and the focus ring

mod handlers;
pub mod state;
mod update;

pub use state::{Command, Dispatch, IgnoreReason, Message, SessionEvent, SessionState};

use crate::backends::camera::{
    CameraEvent, CameraId, CameraProvider, CameraResource, CameraSettings, FocusRegion, FocusState,
    GeoPosition, HardwareEvent, HardwareEventReceiver,
};
use crate::collaborators::{AlertKey, Collaborators};
use crate::config::Config;
use crate::events::EventChannel;
use crate::pipelines::{CaptureEvent, CapturePipeline};
use crate::settings::SettingsCoordinator;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::time::Interval;
use tracing::{debug, info};

/// Hardware work in flight; `None` when the work was abandoned
pub(crate) type Task = BoxFuture<'static, Option<Message>>;

pub struct SessionController {
    config: Config,
    camera: CameraResource,
    settings: SettingsCoordinator,
    pipeline: CapturePipeline,
    collaborators: Collaborators,
    state: SessionState,
    tasks: FuturesUnordered<Task>,
    hardware_events: Option<HardwareEventReceiver>,
    ticker: Option<Interval>,
    /// Camera change requested while recording or capturing
    pending_camera: Option<CameraId>,
    tearing_down: bool,
    teardown_generation: u64,
    reload_after_teardown: bool,
    /// Next configuration re-renders the preview regardless of what changed
    preview_stale: bool,
    alert_visible: Option<AlertKey>,
    storage_ready_sent: bool,
    position: Option<GeoPosition>,
    viewport: Option<(f32, f32)>,
    focus_region: Option<FocusRegion>,
    /// Bumped on release; hardware work started before it is dropped
    release_epoch: watch::Sender<u64>,
    events: EventChannel<SessionEvent>,
}

impl SessionController {
    /// Create a session with no camera acquired
    ///
    /// The initial capture mode is the one the activity asks for, else
    /// Picture.
    pub fn new(provider: Arc<dyn CameraProvider>, collaborators: Collaborators, config: Config) -> Self {
        let initial = CameraSettings {
            mode: collaborators.activity.mode().unwrap_or_default(),
            ..Default::default()
        };
        info!(
            camera = %config.initial_camera,
            mode = %initial.mode,
            activity = collaborators.activity.is_active(),
            "Creating camera session"
        );

        Self {
            camera: CameraResource::new(provider, CameraId::new(config.initial_camera.clone())),
            settings: SettingsCoordinator::new(initial),
            pipeline: CapturePipeline::new(&config),
            config,
            collaborators,
            state: SessionState::Unloaded,
            tasks: FuturesUnordered::new(),
            hardware_events: None,
            ticker: None,
            pending_camera: None,
            tearing_down: false,
            teardown_generation: 0,
            reload_after_teardown: false,
            preview_stale: true,
            alert_visible: None,
            storage_ready_sent: false,
            position: None,
            viewport: None,
            focus_region: None,
            release_epoch: watch::channel(0).0,
            events: EventChannel::new(),
        }
    }

    // ===== Observation =====

    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// `configured`, `zoomChanged` and `focusStateChanged`
    pub fn subscribe_camera(&mut self) -> UnboundedReceiver<CameraEvent> {
        self.camera.subscribe()
    }

    /// `shutter`, `recordingStart`, `recordingEnd`, `newimage`, `newvideo`
    /// and `filesizelimitreached`
    pub fn subscribe_capture(&mut self) -> UnboundedReceiver<CaptureEvent> {
        self.pipeline.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn camera(&self) -> &CameraResource {
        &self.camera
    }

    pub fn settings(&self) -> &SettingsCoordinator {
        &self.settings
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// Camera switch waiting for the recording or still to finish
    pub fn pending_camera(&self) -> Option<&CameraId> {
        self.pending_camera.as_ref()
    }

    pub fn visible_alert(&self) -> Option<AlertKey> {
        self.alert_visible
    }

    /// Why an operation that needs the handle cannot run now
    fn unavailable(&self) -> Option<IgnoreReason> {
        if self.tearing_down {
            Some(IgnoreReason::TearingDown)
        } else if !self.camera.is_acquired() {
            Some(IgnoreReason::Unloaded)
        } else {
            None
        }
    }

    // ===== State machine =====

    fn compute_state(&self) -> SessionState {
        if self.camera.is_acquiring() {
            return SessionState::Loading;
        }
        if !self.camera.is_acquired() {
            return SessionState::Unloaded;
        }
        if self.camera.recording_state().is_active() {
            return SessionState::Recording;
        }
        let focusing = self.camera.focus_state() == FocusState::Focusing;
        if self.settings.is_applying() || self.pipeline.is_capturing() || focusing {
            return SessionState::Busy;
        }
        SessionState::Ready
    }

    /// Recompute the state and announce transitions
    pub(crate) fn refresh_state(&mut self) {
        let next = self.compute_state();
        if next == self.state {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        debug!(from = %from, to = %next, "Session state changed");
        self.events.emit(SessionEvent::StateChanged { from, to: next });
        match next {
            SessionState::Ready => self.events.emit(SessionEvent::Ready),
            SessionState::Busy => self.events.emit(SessionEvent::Busy),
            _ => {}
        }
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.emit(event);
    }

    /// Queue hardware work; its result comes back through [`Self::update`]
    ///
    /// Work still pending when the handle is released never completes.
    pub(crate) fn perform<T, F>(&mut self, future: F, map: impl FnOnce(T) -> Message + Send + 'static)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let mut released = self.release_epoch.subscribe();
        self.tasks.push(Box::pin(async move {
            tokio::select! {
                result = future => Some(map(result)),
                _ = released.changed() => None,
            }
        }));
    }

    /// Drop every hardware operation still in flight
    pub(crate) fn abandon_hardware_work(&mut self) {
        self.release_epoch.send_modify(|epoch| *epoch += 1);
    }

    pub(crate) fn spawn(&mut self, task: Task) {
        self.tasks.push(task);
    }

    // ===== Event loop =====

    /// Hardware work still in flight
    pub fn has_pending_work(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Handle the next completion or buffered hardware event
    ///
    /// Returns `false` without waiting when nothing is in flight and no
    /// hardware event is buffered. The recording timer is not waited on.
    pub async fn process_next(&mut self) -> bool {
        if let Some(rx) = self.hardware_events.as_mut()
            && let Ok(event) = rx.try_recv()
        {
            self.update(Message::Hardware(event));
            return true;
        }

        while !self.tasks.is_empty() {
            let next = tokio::select! {
                event = recv_hardware(&mut self.hardware_events) => Some(Message::Hardware(event)),
                Some(done) = self.tasks.next() => done,
            };
            if let Some(message) = next {
                self.update(message);
                return true;
            }
        }
        false
    }

    /// Process completions until nothing is in flight
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await {}
    }

    /// Drive the session from a command channel until it closes
    ///
    /// On close the camera is torn down and the teardown is awaited.
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        info!("Session loop started");
        loop {
            let message = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        let dispatch = self.execute(command.clone());
                        debug!(?command, ?dispatch, "Command handled");
                        continue;
                    }
                    None => break,
                },
                event = recv_hardware(&mut self.hardware_events) => Message::Hardware(event),
                _ = tick(&mut self.ticker) => Message::Tick,
                Some(done) = self.tasks.next(), if !self.tasks.is_empty() => match done {
                    Some(message) => message,
                    None => continue,
                },
            };
            self.update(message);
        }

        info!("Command channel closed, tearing down");
        self.teardown();
        self.run_until_idle().await;
    }

    /// Apply one command
    pub fn execute(&mut self, command: Command) -> Dispatch {
        match command {
            Command::Load => self.load(),
            Command::Focus => self.focus(),
            Command::Blur => self.blur(),
            Command::Teardown => self.teardown(),
            Command::Capture => self.capture(),
            Command::ToggleRecording => self.toggle_recording(),
            Command::ChangeCamera(camera) => self.change_camera(camera),
            Command::ToggleCamera => self.toggle_camera(),
            Command::ChangeMode(mode) => self.change_mode(mode),
            Command::ChangeSetting(change) => self.change_setting(change),
            Command::ToggleFlash => self.toggle_flash(),
            Command::SetZoom(zoom) => self.set_zoom(zoom),
            Command::SetFocusArea(region) => self.set_focus_area(region),
            Command::FocusAt { x, y } => self.focus_at(x, y),
            Command::TriggerAutoFocus => match self.trigger_auto_focus() {
                Ok(_) => Dispatch::Dispatched,
                Err(reason) => Dispatch::Ignored(reason),
            },
            Command::DismissAlert => self.dismiss_alert(),
            Command::UpdatePosition(position) => {
                self.update_position(position);
                Dispatch::Dispatched
            }
        }
    }

    /// Position attached to the next captures
    pub fn update_position(&mut self, position: Option<GeoPosition>) {
        self.position = position;
    }
}

/// Next hardware event; pends forever without a live receiver
async fn recv_hardware(rx: &mut Option<HardwareEventReceiver>) -> HardwareEvent {
    if let Some(receiver) = rx.as_mut()
        && let Some(event) = receiver.recv().await
    {
        return event;
    }
    *rx = None;
    std::future::pending().await
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
