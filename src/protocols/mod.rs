// SPDX-License-Identifier: GPL-3.0-only
//! Native display control protocols
//!
//! Each protocol drives brightness through a different platform mechanism.
//! The service layer only ever sees the [`DisplayProtocol`] trait; which
//! protocol backs a monitor is an enumeration-time decision.

pub mod backlight;
pub mod ddc_ci;

use anyhow::Result;

/// Common trait for all display control protocols
pub trait DisplayProtocol: std::fmt::Debug + Send {
    /// Get the unique identifier for this display
    fn id(&self) -> String;

    /// Get the human-readable name of this display
    fn name(&self) -> String;

    /// Get the current brightness (0-100)
    fn get_brightness(&mut self) -> Result<u16>;

    /// Set the brightness (0-100)
    fn set_brightness(&mut self, value: u16) -> Result<()>;
}
