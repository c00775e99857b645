// SPDX-License-Identifier: GPL-3.0-only

//! Operation handler modules
//!
//! Public operations and message handlers of the session controller,
//! grouped by functional domain.

pub mod capture;
pub mod focus;
pub mod lifecycle;
pub mod settings;
