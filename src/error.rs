// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the library
//!
//! Expected domain failures (unknown monitor, hardware rejecting a value)
//! are never surfaced here; they resolve into `success: false` results.
//! `Error` covers only the internal faults that abort a call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The display enumeration subsystem failed outright
    #[error("display enumeration failed: {0}")]
    Enumeration(String),

    /// A blocking native call could not be joined
    #[error("native display call failed to complete: {0}")]
    TaskJoin(String),
}

/// Result type alias for [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
