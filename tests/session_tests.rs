// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the session controller against the simulated camera

use camera_session::backends::camera::{
    CameraEvent, CameraId, CaptureMode, FlashMode, FocusOutcome, FocusState, HardwareEvent,
    RecordingState, SimulatedControls, SimulatedProvider,
};
use camera_session::collaborators::{
    Activity, AlertKey, AllowedKinds, PickActivity, PresentationCall, RecordingFilmstrip,
    RecordingPresentation,
};
use camera_session::errors::{ConfigError, SessionError, StorageError};
use camera_session::events::drain;
use camera_session::pipelines::{ArtifactKind, CaptureEvent, StopReason};
use camera_session::settings::SettingChange;
use camera_session::storage::{HealthStatus, MemoryStorage};
use camera_session::{
    Collaborators, Command, Config, Dispatch, IgnoreReason, SessionController, SessionEvent,
    SessionState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

struct Harness {
    session: SessionController,
    controls: SimulatedControls,
    storage: MemoryStorage,
    presentation: RecordingPresentation,
    filmstrip: RecordingFilmstrip,
    events: UnboundedReceiver<SessionEvent>,
    captures: UnboundedReceiver<CaptureEvent>,
    camera_events: UnboundedReceiver<CameraEvent>,
}

fn harness_with(config: Config, activity: Option<Arc<dyn Activity>>) -> Harness {
    let provider = SimulatedProvider::new();
    let controls = provider.controls();
    let storage = MemoryStorage::new();
    let presentation = RecordingPresentation::new();
    let filmstrip = RecordingFilmstrip::new();

    let mut collaborators = Collaborators::new(Arc::new(storage.clone()))
        .with_presentation(Arc::new(presentation.clone()))
        .with_filmstrip(Arc::new(filmstrip.clone()));
    if let Some(activity) = activity {
        collaborators = collaborators.with_activity(activity);
    }

    let mut session = SessionController::new(Arc::new(provider), collaborators, config);
    let events = session.subscribe();
    let captures = session.subscribe_capture();
    let camera_events = session.subscribe_camera();
    Harness {
        session,
        controls,
        storage,
        presentation,
        filmstrip,
        events,
        captures,
        camera_events,
    }
}

fn harness() -> Harness {
    harness_with(Config::default(), None)
}

async fn load(h: &mut Harness) {
    assert_eq!(h.session.focus(), Dispatch::Dispatched);
    h.session.run_until_idle().await;
    assert_eq!(h.session.state(), SessionState::Ready);
}

async fn start_recording(h: &mut Harness) {
    if h.session.settings().desired().mode != CaptureMode::Video {
        assert_eq!(h.session.change_mode(CaptureMode::Video), Dispatch::Dispatched);
        h.session.run_until_idle().await;
    }
    assert_eq!(h.session.capture(), Dispatch::Dispatched);
    h.session.run_until_idle().await;
    assert_eq!(h.session.state(), SessionState::Recording);
    assert!(h.controls.is_recording());
}

/// Let background hardware activity (recording progress) run for a while
async fn pump_for(session: &mut SessionController, duration: Duration) {
    let end = Instant::now() + duration;
    while Instant::now() < end {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.run_until_idle().await;
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_load_holds_exactly_one_handle() {
    let mut h = harness();
    assert_eq!(h.session.state(), SessionState::Unloaded);

    load(&mut h).await;
    assert_eq!(h.controls.open_handles(), 1);
    assert_eq!(
        h.session.focus(),
        Dispatch::Ignored(IgnoreReason::AlreadyLoaded)
    );
    h.session.run_until_idle().await;
    assert_eq!(h.controls.max_open_handles(), 1);

    assert_eq!(h.session.blur(), Dispatch::Dispatched);
    assert_eq!(h.controls.open_handles(), 0);
    assert_eq!(h.session.state(), SessionState::Unloaded);
}

#[tokio::test(start_paused = true)]
async fn test_double_release_is_harmless() {
    let mut h = harness();
    load(&mut h).await;

    assert_eq!(h.session.teardown(), Dispatch::Dispatched);
    assert_eq!(h.session.teardown(), Dispatch::Ignored(IgnoreReason::Unloaded));
    assert_eq!(h.controls.release_calls(), 1);
    assert_eq!(h.controls.open_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_operations_ignored_while_unloaded() {
    let mut h = harness();
    let unloaded = Dispatch::Ignored(IgnoreReason::Unloaded);

    assert_eq!(h.session.capture(), unloaded);
    assert_eq!(h.session.toggle_recording(), unloaded);
    assert_eq!(h.session.set_zoom(2.0), unloaded);
    assert_eq!(h.session.change_mode(CaptureMode::Video), unloaded);
    assert_eq!(h.session.toggle_flash(), unloaded);
    assert_eq!(h.session.change_camera(CameraId::new("front")), unloaded);
    assert_eq!(h.session.trigger_auto_focus().err(), Some(IgnoreReason::Unloaded));
    assert!(!h.session.has_pending_work());
}

#[tokio::test(start_paused = true)]
async fn test_state_transitions_are_announced() {
    let mut h = harness();
    load(&mut h).await;

    let events = drain(&mut h.events);
    let transitions: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(transitions.first(), Some(&(SessionState::Unloaded, SessionState::Loading)));
    assert_eq!(transitions.last().map(|(_, to)| *to), Some(SessionState::Ready));
    assert!(events.contains(&SessionEvent::Ready));
}

#[tokio::test(start_paused = true)]
async fn test_busy_camera_shows_unavailable_alert() {
    let mut h = harness();
    h.controls.set_busy("back", true);

    h.session.focus();
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Unloaded);
    assert_eq!(h.presentation.alerts_shown(AlertKey::CameraUnavailable), 1);
    assert!(drain(&mut h.events).iter().any(|event| matches!(
        event,
        SessionEvent::Error(SessionError::Acquire(_))
    )));
    assert_eq!(h.controls.open_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_storage_ready_emitted_once() {
    let mut h = harness();
    load(&mut h).await;
    h.session.blur();
    load(&mut h).await;

    let ready: Vec<_> = drain(&mut h.events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::StorageReady { .. }))
        .collect();
    assert_eq!(
        ready,
        vec![SessionEvent::StorageReady {
            watch_location: true
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_storage_alerts_but_still_loads() {
    let mut h = harness();
    h.storage.set_health(HealthStatus::Full);

    load(&mut h).await;

    assert_eq!(h.presentation.alerts_shown(AlertKey::StorageFull), 1);
    assert!(
        !drain(&mut h.events)
            .iter()
            .any(|event| matches!(event, SessionEvent::StorageReady { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_alerts_do_not_stack() {
    let mut h = harness();
    h.storage.set_health(HealthStatus::Full);
    load(&mut h).await;
    h.storage.fail_with(Some(StorageError::Unavailable("unmounted".to_string())));

    h.session.capture();
    h.session.run_until_idle().await;

    assert_eq!(h.session.visible_alert(), Some(AlertKey::StorageFull));
    assert_eq!(h.presentation.alerts_shown(AlertKey::StorageUnavailable), 0);

    assert_eq!(h.session.dismiss_alert(), Dispatch::Dispatched);
    assert_eq!(h.session.visible_alert(), None);
    assert_eq!(h.session.dismiss_alert(), Dispatch::Ignored(IgnoreReason::Unchanged));
}

#[tokio::test(start_paused = true)]
async fn test_secure_mode_clears_filmstrip_on_teardown() {
    let config = Config {
        secure_mode: true,
        ..Config::default()
    };
    let mut h = harness_with(config, None);
    load(&mut h).await;

    h.session.capture();
    h.session.run_until_idle().await;
    assert_eq!(h.filmstrip.entries().len(), 1);

    h.session.blur();
    assert_eq!(h.filmstrip.clears(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_filmstrip_kept_without_secure_mode() {
    let mut h = harness();
    load(&mut h).await;
    h.session.capture();
    h.session.run_until_idle().await;

    h.session.blur();
    assert_eq!(h.filmstrip.clears(), 0);
    assert_eq!(h.filmstrip.entries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_secure_mode_video_finished_by_teardown_stays_out_of_filmstrip() {
    let config = Config {
        secure_mode: true,
        ..Config::default()
    };
    let mut h = harness_with(config, None);
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(h.session.blur(), Dispatch::Deferred);
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Unloaded);
    assert_eq!(h.filmstrip.clears(), 1);
    assert!(h.filmstrip.entries().is_empty());
    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, ArtifactKind::Video);
}

#[tokio::test(start_paused = true)]
async fn test_secure_mode_still_persisted_after_blur_stays_out_of_filmstrip() {
    let config = Config {
        secure_mode: true,
        ..Config::default()
    };
    let mut h = harness_with(config, None);
    load(&mut h).await;

    assert_eq!(h.session.capture(), Dispatch::Dispatched);
    while h.session.state() == SessionState::Busy {
        assert!(h.session.process_next().await);
    }
    assert!(h.session.has_pending_work());

    h.session.blur();
    h.session.run_until_idle().await;

    assert_eq!(h.filmstrip.clears(), 1);
    assert!(h.filmstrip.entries().is_empty());
    assert_eq!(h.storage.stored().len(), 1);
    assert!(
        drain(&mut h.captures)
            .iter()
            .any(|event| matches!(event, CaptureEvent::NewImage { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_still_persisted_after_blur_reaches_filmstrip_without_secure_mode() {
    let mut h = harness();
    load(&mut h).await;

    h.session.capture();
    while h.session.state() == SessionState::Busy {
        assert!(h.session.process_next().await);
    }
    h.session.blur();
    h.session.run_until_idle().await;

    assert_eq!(h.filmstrip.clears(), 0);
    assert_eq!(h.filmstrip.entries().len(), 1);
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_mode_change_reconfigures_and_rerenders_preview() {
    let mut h = harness();
    load(&mut h).await;
    let renders = h.presentation.preview_renders();
    assert!(renders >= 1);

    assert_eq!(h.session.change_mode(CaptureMode::Video), Dispatch::Dispatched);
    assert_eq!(h.session.state(), SessionState::Busy);
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.presentation.preview_renders(), renders + 1);
    assert_eq!(
        h.controls.last_applied().map(|settings| settings.mode),
        Some(CaptureMode::Video)
    );
    assert_eq!(
        h.session.change_mode(CaptureMode::Video),
        Dispatch::Ignored(IgnoreReason::Unchanged)
    );
}

#[tokio::test(start_paused = true)]
async fn test_zoom_is_clamped() {
    let mut h = harness();
    load(&mut h).await;

    assert_eq!(h.session.set_zoom(10.0), Dispatch::Dispatched);
    assert_eq!(h.controls.zoom(), Some(4.0));
    assert_eq!(h.session.set_zoom(4.0), Dispatch::Ignored(IgnoreReason::Unchanged));
    assert!(
        h.presentation
            .calls()
            .contains(&PresentationCall::ZoomIndicator(4.0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_switch_camera_reacquires() {
    let mut h = harness();
    load(&mut h).await;

    assert_eq!(h.session.toggle_camera(), Dispatch::Dispatched);
    h.session.run_until_idle().await;

    assert_eq!(h.session.camera().selected(), &CameraId::new("front"));
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.controls.open_handles(), 1);
    assert_eq!(h.controls.max_open_handles(), 1);
    assert!(h.presentation.last_preview().is_some_and(|preview| preview.mirrored));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_camera_rejected() {
    let mut h = harness();
    load(&mut h).await;
    assert_eq!(
        h.session.change_camera(CameraId::new("side")),
        Dispatch::Ignored(IgnoreReason::UnknownCamera)
    );
    assert_eq!(h.session.camera().selected(), &CameraId::new("back"));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_batch_reverts_and_stays_ready() {
    let mut h = harness();
    load(&mut h).await;
    let applied = h.controls.applied().len();
    h.controls.fail_configure(Some("sensor rejected hdr"));

    assert_eq!(h.session.change_setting(SettingChange::Hdr(true)), Dispatch::Dispatched);
    assert!(h.session.settings().desired().hdr);
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.session.settings().desired().hdr);
    assert!(!h.session.settings().applied().hdr);
    assert_eq!(h.controls.applied().len(), applied);
    assert!(drain(&mut h.events).iter().any(|event| matches!(
        event,
        SessionEvent::Error(SessionError::Config(ConfigError::Hardware(_)))
    )));

    h.controls.fail_configure(None);
    h.session.change_setting(SettingChange::Hdr(true));
    h.session.run_until_idle().await;
    assert!(h.session.settings().applied().hdr);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_setting_reverts_and_stays_ready() {
    let mut h = harness();
    load(&mut h).await;
    h.session.toggle_camera();
    h.session.run_until_idle().await;
    assert_eq!(h.session.camera().selected(), &CameraId::new("front"));
    drain(&mut h.events);

    h.session.change_setting(SettingChange::Flash(FlashMode::On));
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.session.settings().desired().flash, FlashMode::Off);
    assert_eq!(h.session.settings().applied().flash, FlashMode::Off);
    assert!(drain(&mut h.events).iter().any(|event| matches!(
        event,
        SessionEvent::Error(SessionError::Config(ConfigError::UnsupportedCapability { .. }))
    )));
}

// =============================================================================
// Capture
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_picture_persisted_and_preview_resumed() {
    let mut h = harness();
    load(&mut h).await;

    assert_eq!(h.session.capture(), Dispatch::Dispatched);
    assert_eq!(h.session.state(), SessionState::Busy);
    assert_eq!(h.session.capture(), Dispatch::Ignored(IgnoreReason::InFlight));
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, ArtifactKind::Image);
    assert_eq!(h.filmstrip.entries().len(), 1);
    assert!(h.controls.preview_running());

    let captures = drain(&mut h.captures);
    assert!(captures.contains(&CaptureEvent::Shutter));
    assert!(captures.iter().any(|event| matches!(event, CaptureEvent::NewImage { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_failed_persist_resumes_preview() {
    let mut h = harness();
    load(&mut h).await;
    h.storage.fail_with(Some(StorageError::Full));

    h.session.capture();
    h.session.run_until_idle().await;

    assert!(h.storage.stored().is_empty());
    assert_eq!(h.presentation.alerts_shown(AlertKey::StorageFull), 1);
    assert!(h.controls.preview_running());
    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(
        !drain(&mut h.captures)
            .iter()
            .any(|event| matches!(event, CaptureEvent::NewImage { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_picture_reports_error() {
    let mut h = harness();
    load(&mut h).await;
    h.controls.fail_picture(Some("sensor timeout"));

    h.session.capture();
    h.session.run_until_idle().await;

    assert!(h.storage.stored().is_empty());
    assert!(h.controls.preview_running());
    assert!(drain(&mut h.events).iter().any(|event| matches!(
        event,
        SessionEvent::Error(SessionError::Capture(_))
    )));
    assert_eq!(h.session.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_recording_produces_video_with_poster() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(h.session.toggle_recording(), Dispatch::Dispatched);
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(!h.controls.is_recording());
    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, ArtifactKind::Video);

    let entries = h.filmstrip.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_video);
    assert!(entries[0].has_poster);

    let captures = drain(&mut h.captures);
    assert!(captures.iter().any(|event| matches!(event, CaptureEvent::RecordingStart { .. })));
    assert!(captures.iter().any(|event| matches!(
        event,
        CaptureEvent::RecordingEnd {
            reason: StopReason::User,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_dual_shutter_keeps_recording() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(h.session.capture(), Dispatch::Dispatched);
    h.session.run_until_idle().await;

    assert!(h.controls.is_recording());
    assert_eq!(h.session.state(), SessionState::Recording);
    assert!(h.controls.preview_running());
    assert!(
        h.presentation
            .calls()
            .contains(&PresentationCall::FlashAcknowledge)
    );
    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, ArtifactKind::Image);
    assert!(drain(&mut h.captures).contains(&CaptureEvent::DualShutterFlash));
}

#[tokio::test(start_paused = true)]
async fn test_still_rejected_while_recording_without_dual_shutter() {
    let config = Config {
        dual_shutter: false,
        ..Config::default()
    };
    let mut h = harness_with(config, None);
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(h.session.capture(), Dispatch::Ignored(IgnoreReason::Recording));
    assert_eq!(h.controls.pictures_taken(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mode_change_rejected_while_recording() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(
        h.session.change_mode(CaptureMode::Picture),
        Dispatch::Ignored(IgnoreReason::Recording)
    );
}

#[tokio::test(start_paused = true)]
async fn test_size_limit_alerts_exactly_once() {
    let activity = Arc::new(PickActivity::new(AllowedKinds::VIDEO_ONLY).with_max_file_size(100_000));
    let mut h = harness_with(Config::default(), Some(activity));
    h.controls.set_progress(Duration::from_millis(100), 40_000);
    load(&mut h).await;
    assert_eq!(h.session.settings().desired().mode, CaptureMode::Video);
    assert_eq!(h.storage.max_artifact_size(), Some(100_000));

    start_recording(&mut h).await;
    assert_eq!(h.controls.recording_limit(), Some(100_000));
    pump_for(&mut h.session, Duration::from_secs(1)).await;

    assert!(!h.controls.is_recording());
    assert_eq!(h.presentation.alerts_shown(AlertKey::FileSizeLimitReached), 1);

    let captures = drain(&mut h.captures);
    let limit_events = captures
        .iter()
        .filter(|event| **event == CaptureEvent::FileSizeLimitReached)
        .count();
    assert_eq!(limit_events, 1);
    assert!(captures.iter().any(|event| matches!(
        event,
        CaptureEvent::RecordingEnd {
            reason: StopReason::SizeLimit,
            ..
        }
    )));

    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].blob.len() as u64 <= 100_000);
}

#[tokio::test(start_paused = true)]
async fn test_recorder_error_stops_recording() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert!(h.controls.emit(HardwareEvent::RecorderError("disk write failed".to_string())));
    h.session.run_until_idle().await;
    h.session.run_until_idle().await;

    assert!(!h.controls.is_recording());
    assert_eq!(h.session.state(), SessionState::Ready);
    assert!(drain(&mut h.captures).iter().any(|event| matches!(
        event,
        CaptureEvent::RecordingEnd {
            reason: StopReason::FileError,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_camera_change_deferred_while_recording() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(
        h.session.change_camera(CameraId::new("front")),
        Dispatch::Deferred
    );
    assert_eq!(h.session.pending_camera(), Some(&CameraId::new("front")));
    assert_eq!(h.session.camera().selected(), &CameraId::new("back"));
    assert!(h.controls.is_recording());

    h.session.toggle_recording();
    h.session.run_until_idle().await;

    assert_eq!(h.session.camera().selected(), &CameraId::new("front"));
    assert_eq!(h.session.pending_camera(), None);
    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.controls.open_handles(), 1);
    assert_eq!(h.controls.max_open_handles(), 1);
    assert_eq!(h.storage.stored().len(), 1);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_recording_first() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;

    assert_eq!(h.session.blur(), Dispatch::Deferred);
    assert!(h.session.is_tearing_down());
    assert_eq!(h.session.capture(), Dispatch::Ignored(IgnoreReason::TearingDown));
    h.session.run_until_idle().await;

    assert!(!h.session.is_tearing_down());
    assert_eq!(h.session.state(), SessionState::Unloaded);
    assert_eq!(h.controls.open_handles(), 0);
    assert_eq!(h.storage.stored().len(), 1);
    assert!(drain(&mut h.captures).iter().any(|event| matches!(
        event,
        CaptureEvent::RecordingEnd {
            reason: StopReason::Teardown,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_with_failing_stop_still_releases() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;
    h.controls.fail_stop_recording(Some("encoder crashed"));

    h.session.blur();
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Unloaded);
    assert_eq!(h.session.camera().recording_state(), RecordingState::Idle);
    assert_eq!(h.controls.open_handles(), 0);
    assert!(h.storage.stored().is_empty());
    assert!(drain(&mut h.events).iter().any(|event| matches!(
        event,
        SessionEvent::Error(SessionError::Capture(_))
    )));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_with_hanging_stop_is_bounded() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;
    h.controls.hang_stop_recording(true);

    let started = Instant::now();
    assert_eq!(h.session.blur(), Dispatch::Deferred);
    h.session.run_until_idle().await;

    assert!(started.elapsed() >= h.session.config().stop_timeout());
    assert_eq!(h.session.state(), SessionState::Unloaded);
    assert_eq!(h.session.camera().recording_state(), RecordingState::Idle);
    assert_eq!(h.controls.open_handles(), 0);
    assert_eq!(h.controls.abort_calls(), 1);
    assert!(!h.session.has_pending_work());
}

#[tokio::test(start_paused = true)]
async fn test_load_during_teardown_is_replayed() {
    let mut h = harness();
    load(&mut h).await;
    start_recording(&mut h).await;
    h.controls.hang_stop_recording(true);

    assert_eq!(h.session.blur(), Dispatch::Deferred);
    assert_eq!(h.session.focus(), Dispatch::Deferred);
    h.session.run_until_idle().await;

    assert_eq!(h.session.state(), SessionState::Ready);
    assert_eq!(h.controls.open_handles(), 1);
    assert_eq!(h.controls.max_open_handles(), 1);
}

// =============================================================================
// Focus
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retrigger_resets_focus_once_after_second_hold() {
    let mut h = harness();
    load(&mut h).await;
    drain(&mut h.camera_events);
    let hold = h.session.config().focus_hold();

    let first_trigger = Instant::now();
    let first = h.session.trigger_auto_focus().unwrap();
    assert_eq!(h.session.state(), SessionState::Busy);
    assert!(h.session.process_next().await);
    assert_eq!(h.session.camera().focus_state(), FocusState::Focused);
    assert_eq!(first.await, Ok(FocusOutcome::Focused));

    tokio::time::advance(hold / 2).await;
    let _second = h.session.trigger_auto_focus().unwrap();
    while h.session.camera().focus_state() == FocusState::Focusing {
        assert!(h.session.process_next().await);
    }
    assert_eq!(h.session.camera().focus_state(), FocusState::Focused);

    h.session.run_until_idle().await;
    assert_eq!(h.session.camera().focus_state(), FocusState::None);
    assert!(first_trigger.elapsed() >= hold / 2 + hold);

    let resets = drain(&mut h.camera_events)
        .into_iter()
        .filter(|event| *event == CameraEvent::FocusStateChanged(FocusState::None))
        .count();
    assert_eq!(resets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_focus_trigger_rejected_while_focusing() {
    let mut h = harness();
    load(&mut h).await;
    h.controls.set_focus_delay(Duration::from_millis(200));

    let _pending = h.session.trigger_auto_focus().unwrap();
    assert_eq!(h.session.trigger_auto_focus().err(), Some(IgnoreReason::InFlight));
}

#[tokio::test(start_paused = true)]
async fn test_failed_focus_reports_failed() {
    let mut h = harness();
    load(&mut h).await;
    h.controls.set_autofocus_result(false);

    let outcome = h.session.trigger_auto_focus().unwrap();
    assert!(h.session.process_next().await);
    assert_eq!(h.session.camera().focus_state(), FocusState::Failed);
    assert_eq!(outcome.await, Ok(FocusOutcome::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_release_cancels_pending_focus() {
    let mut h = harness();
    load(&mut h).await;
    h.controls.set_focus_delay(Duration::from_millis(200));

    let outcome = h.session.trigger_auto_focus().unwrap();
    h.session.blur();
    assert_eq!(outcome.await, Ok(FocusOutcome::Cancelled));
    assert_eq!(h.session.camera().focus_state(), FocusState::None);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_focus_camera_rejects_auto_focus() {
    let mut h = harness();
    load(&mut h).await;
    h.session.change_camera(CameraId::new("front"));
    h.session.run_until_idle().await;

    assert_eq!(h.session.trigger_auto_focus().err(), Some(IgnoreReason::Unsupported));
}

#[tokio::test(start_paused = true)]
async fn test_tap_sets_focus_area() {
    let mut h = harness();
    load(&mut h).await;
    h.session.set_viewport(1000.0, 500.0);

    assert_eq!(h.session.focus_at(500.0, 250.0), Dispatch::Dispatched);
    let area = h.controls.focus_area().unwrap();
    assert_eq!((area.left, area.top, area.right, area.bottom), (-100, -100, 100, 100));
}

// =============================================================================
// Activities
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_activity_restricts_kinds_and_names_file() {
    let activity = Arc::new(PickActivity::new(AllowedKinds::IMAGE_ONLY).with_file_name("pick.jpg"));
    let mut h = harness_with(Config::default(), Some(activity));
    load(&mut h).await;

    assert_eq!(
        h.session.change_mode(CaptureMode::Video),
        Dispatch::Ignored(IgnoreReason::KindNotAllowed)
    );

    h.session.capture();
    h.session.run_until_idle().await;

    let stored = h.storage.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].path, std::path::PathBuf::from("pick.jpg"));
    // Picked artifacts go back to the caller, not the filmstrip
    assert!(h.filmstrip.entries().is_empty());
    // Preview stays frozen so the picture can be confirmed
    assert!(!h.controls.preview_running());
}

#[tokio::test(start_paused = true)]
async fn test_activity_storage_ready_does_not_watch_location() {
    let activity = Arc::new(PickActivity::new(AllowedKinds::ALL));
    let mut h = harness_with(Config::default(), Some(activity));
    load(&mut h).await;

    assert!(drain(&mut h.events).contains(&SessionEvent::StorageReady {
        watch_location: false
    }));
}

#[tokio::test(start_paused = true)]
async fn test_blur_cancels_activity() {
    let activity = Arc::new(PickActivity::new(AllowedKinds::ALL));
    let mut h = harness_with(Config::default(), Some(activity.clone()));
    load(&mut h).await;

    h.session.blur();
    assert!(activity.was_cancelled());
}

// =============================================================================
// Command loop
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_loop_tears_down_when_commands_close() {
    let Harness {
        session,
        controls,
        storage,
        mut events,
        mut captures,
        ..
    } = harness();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let script = async move {
        tx.send(Command::Focus).unwrap();
        while let Some(event) = events.recv().await {
            if event == SessionEvent::Ready {
                break;
            }
        }
        tx.send(Command::Capture).unwrap();
        while let Some(event) = captures.recv().await {
            if matches!(event, CaptureEvent::NewImage { .. }) {
                break;
            }
        }
    };
    tokio::join!(session.run(rx), script);

    assert_eq!(storage.stored().len(), 1);
    assert_eq!(controls.open_handles(), 0);
    assert_eq!(controls.release_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_reports_recording_time_every_second() {
    let activity = Arc::new(PickActivity::new(AllowedKinds::VIDEO_ONLY));
    let Harness {
        session,
        storage,
        mut events,
        mut captures,
        ..
    } = harness_with(Config::default(), Some(activity));
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let script = async move {
        tx.send(Command::Focus).unwrap();
        while let Some(event) = events.recv().await {
            if event == SessionEvent::Ready {
                break;
            }
        }

        tx.send(Command::ToggleRecording).unwrap();
        let mut updates = Vec::new();
        while let Some(event) = captures.recv().await {
            if let CaptureEvent::TimeUpdate(elapsed) = event {
                updates.push(elapsed);
                if updates.len() == 2 {
                    break;
                }
            }
        }

        tx.send(Command::ToggleRecording).unwrap();
        while let Some(event) = captures.recv().await {
            if matches!(event, CaptureEvent::NewVideo { .. }) {
                break;
            }
        }
        updates
    };
    let ((), updates) = tokio::join!(session.run(rx), script);

    assert_eq!(updates, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    assert_eq!(storage.stored().len(), 1);
}
