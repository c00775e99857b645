// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the camera session
//!
//! Every command drives a [`SessionController`] against the simulated
//! backend through its command channel, the same way a front end would.

use camera_session::backends::camera::{CameraId, CameraProvider, CaptureMode, SimulatedProvider};
use camera_session::events::drain;
use camera_session::pipelines::CaptureEvent;
use camera_session::storage::DirectoryStorage;
use camera_session::{Collaborators, Command, Config, SessionController, SessionEvent};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Upper bound for any single step of a scripted session
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Simulated recorder throughput: one chunk every half second
const PROGRESS_EVERY: Duration = Duration::from_millis(500);
const PROGRESS_BYTES: u64 = 64 * 1024;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// List all available cameras
pub fn list_cameras() -> CliResult<()> {
    let provider = SimulatedProvider::new();
    let cameras = provider.list_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();

    for camera in &cameras {
        println!("  {}", camera);
        let caps = provider.capabilities(camera)?;
        if let Some(size) = caps.largest_picture_size() {
            println!("      Largest picture: {}", size);
        }
        let profiles: Vec<&str> = caps
            .recorder_profiles
            .iter()
            .map(|profile| profile.name.as_str())
            .collect();
        println!("      Recorder profiles: {}", profiles.join(", "));
        let flash: Vec<String> = caps.flash_modes.iter().map(|mode| mode.to_string()).collect();
        println!(
            "      Flash: {}",
            if flash.is_empty() {
                "none".to_string()
            } else {
                flash.join(", ")
            }
        );
        println!("      Zoom: {:.1}x - {:.1}x", caps.zoom.min, caps.zoom.max);
        println!(
            "      Auto-focus: {}",
            if caps.supports_auto_focus() { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Take a single photo
pub fn take_photo(camera: String, output: Option<PathBuf>) -> CliResult<()> {
    let mut config = Config::load();
    config.initial_camera = camera;
    let (session, provider) = build_session(config, output);
    check_camera(&provider, &session.config().initial_camera)?;

    println!("Using camera: {}", session.config().initial_camera);
    println!("Capturing photo...");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(drive(session, |tx, mut events, mut captures| async move {
        send(&tx, Command::Focus)?;
        wait_for_ready(&mut events).await?;

        send(&tx, Command::Capture)?;
        let path = wait_for(&mut captures, |event| match event {
            CaptureEvent::NewImage { path, .. } => Some(path.clone()),
            _ => None,
        })
        .await?;
        println!("Photo saved to: {}", path.display());
        Ok(())
    }))
}

/// Record a video until the duration elapses or Ctrl+C is pressed
pub fn record_video(camera: String, duration: u64, output: Option<PathBuf>) -> CliResult<()> {
    let mut config = Config::load();
    config.initial_camera = camera;
    let (session, provider) = build_session(config, output);
    check_camera(&provider, &session.config().initial_camera)?;

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Using camera: {}", session.config().initial_camera);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(drive(session, |tx, mut events, mut captures| async move {
        send(&tx, Command::Focus)?;
        wait_for_ready(&mut events).await?;
        drain(&mut events);
        send(&tx, Command::ChangeMode(CaptureMode::Video))?;
        wait_for_ready(&mut events).await?;

        send(&tx, Command::ToggleRecording)?;
        wait_for(&mut captures, |event| match event {
            CaptureEvent::RecordingStart { .. } => Some(()),
            _ => None,
        })
        .await?;
        println!("Recording for {} seconds (Ctrl+C to stop)...", duration);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);
        let mut poll = tokio::time::interval(Duration::from_millis(100));
        let mut limit_reached = false;
        while tokio::time::Instant::now() < deadline && !stop_flag.load(Ordering::SeqCst) {
            poll.tick().await;
            for event in drain(&mut captures) {
                match event {
                    CaptureEvent::TimeUpdate(elapsed) => {
                        println!("  {}s", elapsed.as_secs());
                    }
                    CaptureEvent::FileSizeLimitReached => {
                        println!("Maximum file size reached");
                        limit_reached = true;
                    }
                    _ => {}
                }
            }
            if limit_reached {
                break;
            }
        }

        if !limit_reached {
            println!("Stopping recording...");
            send(&tx, Command::ToggleRecording)?;
        }
        let (path, bytes) = wait_for(&mut captures, |event| match event {
            CaptureEvent::NewVideo { path, blob, .. } => Some((path.clone(), blob.len())),
            _ => None,
        })
        .await?;
        println!("Video saved to: {} ({} bytes)", path.display(), bytes);
        Ok(())
    }))
}

/// Scripted lifecycle: focus, capture, switch camera, capture, blur
pub fn run_session(output: Option<PathBuf>) -> CliResult<()> {
    let (session, _provider) = build_session(Config::load(), output);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(drive(session, |tx, mut events, mut captures| async move {
        send(&tx, Command::Focus)?;
        wait_for_ready(&mut events).await?;
        println!("Camera ready");

        for round in 1..=2 {
            send(&tx, Command::Capture)?;
            let path = wait_for(&mut captures, |event| match event {
                CaptureEvent::NewImage { path, .. } => Some(path.clone()),
                _ => None,
            })
            .await?;
            println!("Photo {} saved to: {}", round, path.display());

            if round == 1 {
                drain(&mut events);
                send(&tx, Command::ToggleCamera)?;
                wait_for_ready(&mut events).await?;
                println!("Switched camera");
            }
        }

        send(&tx, Command::Blur)?;
        println!("Session closed");
        Ok(())
    }))
}

fn build_session(
    config: Config,
    output: Option<PathBuf>,
) -> (SessionController, Arc<SimulatedProvider>) {
    let provider = Arc::new(SimulatedProvider::new());
    provider
        .controls()
        .set_progress(PROGRESS_EVERY, PROGRESS_BYTES);

    let output_dir = output.unwrap_or_else(|| config.output_dir());
    let storage = Arc::new(DirectoryStorage::new(output_dir));
    let provider_dyn: Arc<dyn CameraProvider> = provider.clone();
    let session = SessionController::new(provider_dyn, Collaborators::new(storage), config);
    (session, provider)
}

fn check_camera(provider: &SimulatedProvider, camera: &str) -> CliResult<()> {
    let id = CameraId::from(camera);
    if provider.list_cameras().contains(&id) {
        Ok(())
    } else {
        Err(format!(
            "Camera '{}' not found. Use 'camera-session list' to see available cameras.",
            camera
        )
        .into())
    }
}

/// Run the session loop alongside a script that talks to it
///
/// The script's command sender is dropped when it finishes, which makes the
/// loop tear the camera down and return.
async fn drive<S, F>(mut session: SessionController, script: S) -> CliResult<()>
where
    S: FnOnce(
        UnboundedSender<Command>,
        UnboundedReceiver<SessionEvent>,
        UnboundedReceiver<CaptureEvent>,
    ) -> F,
    F: std::future::Future<Output = CliResult<()>>,
{
    let events = session.subscribe();
    let captures = session.subscribe_capture();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    let ((), result) = tokio::join!(session.run(rx), script(tx, events, captures));
    result
}

fn send(tx: &UnboundedSender<Command>, command: Command) -> CliResult<()> {
    tx.send(command)
        .map_err(|_| "session loop stopped unexpectedly".into())
}

async fn wait_for_ready(events: &mut UnboundedReceiver<SessionEvent>) -> CliResult<()> {
    wait_for(events, |event| match event {
        SessionEvent::Ready => Some(Ok(())),
        SessionEvent::Error(e) => Some(Err(e.to_string())),
        _ => None,
    })
    .await?
    .map_err(Into::into)
}

/// Wait until `select` picks an event, bounded by [`STEP_TIMEOUT`]
async fn wait_for<E, T>(
    rx: &mut UnboundedReceiver<E>,
    mut select: impl FnMut(&E) -> Option<T>,
) -> CliResult<T> {
    let wait = async {
        while let Some(event) = rx.recv().await {
            if let Some(found) = select(&event) {
                return Some(found);
            }
        }
        None
    };
    match tokio::time::timeout(STEP_TIMEOUT, wait).await {
        Ok(Some(found)) => Ok(found),
        Ok(None) => Err("session loop stopped unexpectedly".into()),
        Err(_) => Err("timed out waiting for the camera".into()),
    }
}
