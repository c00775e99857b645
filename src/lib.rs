// SPDX-License-Identifier: MPL-2.0

//! Camera Session - lifecycle and capture control for a single camera
//!
//! This library owns one physical camera at a time, keeps interdependent
//! settings consistent, and drives still capture and recording through to
//! storage, recovering from hardware and storage failures along the way.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera hardware abstraction and the simulated backend
//! - [`settings`]: Settings reconciliation and configuration batches
//! - [`pipelines`]: Still capture and recording pipelines
//! - [`session`]: Top-level session state machine
//! - [`collaborators`]: Activity, presentation and filmstrip interfaces
//! - [`storage`]: Artifact persistence
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use camera_session::backends::camera::SimulatedProvider;
//! use camera_session::{Collaborators, Config, SessionController};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let provider = Arc::new(SimulatedProvider::new());
//! let mut session = SessionController::new(provider, Collaborators::default(), Config::default());
//! session.focus();
//! session.run_until_idle().await;
//! session.capture();
//! session.run_until_idle().await;
//! session.blur();
//! # }
//! ```

pub mod backends;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod pipelines;
pub mod session;
pub mod settings;
pub mod storage;

// Re-export commonly used types
pub use collaborators::Collaborators;
pub use config::Config;
pub use constants::DualShotBudget;
pub use errors::SessionError;
pub use session::{Command, Dispatch, IgnoreReason, SessionController, SessionEvent, SessionState};
