// SPDX-License-Identifier: GPL-3.0-only

use camera_session::constants::app_info;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-session")]
#[command(about = "Drive a camera session against the simulated backend")]
#[command(version = app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and their capabilities
    List,

    /// Take a photo
    Photo {
        /// Camera to use (from 'camera-session list')
        #[arg(short, long, default_value = "back")]
        camera: String,

        /// Output directory (default: the pictures directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Camera to use (from 'camera-session list')
        #[arg(short, long, default_value = "back")]
        camera: String,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Output directory (default: the pictures directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a scripted lifecycle: focus, capture, switch camera, capture, blur
    Session {
        /// Output directory (default: the pictures directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_session=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Photo { camera, output } => cli::take_photo(camera, output),
        Commands::Video {
            camera,
            duration,
            output,
        } => cli::record_video(camera, duration, output),
        Commands::Session { output } => cli::run_session(output),
    }
}
