// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera hardware
//!
//! The backend layer hides the device behind traits so the session logic is
//! the same for real drivers and for the simulated camera used by the CLI and
//! the test suite.
//!
//! # Modules
//!
//! - [`camera`]: Provider and hardware traits, the exclusive camera resource
//!   and the simulated implementation

pub mod camera;
