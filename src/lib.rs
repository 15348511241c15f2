//! Query and set the brightness of attached display monitors.
//!
//! External monitors are driven over DDC/CI, internal panels through the
//! kernel backlight interface; connector names, geometry and EDID identity
//! come from X11 RandR. Enumeration is synchronous; reads and writes are
//! async and suspend only at the native call boundary.
//!
//! Expected failures (unknown monitor id, hardware rejecting a call)
//! resolve into results with `success: false`, so callers branch on one
//! boolean; only internal faults such as the enumeration subsystem dying
//! return [`Err`].
//!
//! ```no_run
//! # async fn example() -> lumi::Result<()> {
//! for monitor in lumi::monitors()? {
//!     println!(
//!         "{} {}x{} at {},{}",
//!         monitor.id, monitor.size.width, monitor.size.height,
//!         monitor.position.x, monitor.position.y,
//!     );
//! }
//!
//! let current = lumi::get().await?;
//! if current.success {
//!     // Dim every attached monitor
//!     lumi::set_monitor(lumi::GLOBAL, 40).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod enumeration;
mod error;
mod model;
mod protocols;
mod randr;
mod service;

pub use error::{Error, Result};
pub use model::{
    BrightnessConfiguration, DisplayId, GLOBAL, GetBrightnessResult, Monitor, MonitorTarget,
    Position, SetBrightnessResult, Size,
};

use enumeration::PlatformDiscovery;
use service::BrightnessService;

fn platform_service() -> BrightnessService<PlatformDiscovery> {
    // Fresh discovery per call: no cached monitor state can go stale
    // across hot-plug events
    BrightnessService::new(PlatformDiscovery::new())
}

/// List the currently attached monitors.
///
/// Synchronous; probes only local OS facilities. Repeated calls re-probe,
/// so results may differ across hot-plug events.
pub fn monitors() -> Result<Vec<Monitor>> {
    platform_service().monitors()
}

/// Read the default monitor's brightness.
///
/// The default monitor is the first internal panel in enumeration order,
/// else the first monitor overall.
pub async fn get() -> Result<GetBrightnessResult> {
    platform_service().get(None).await
}

/// Read a monitor's brightness by id.
///
/// Resolves `{success: false, brightness: None}` when the id is unknown or
/// the monitor rejects the read.
pub async fn get_monitor(monitor_id: &str) -> Result<GetBrightnessResult> {
    platform_service().get(Some(monitor_id)).await
}

/// Set the default monitor's brightness.
pub async fn set(brightness: u16) -> Result<SetBrightnessResult> {
    platform_service()
        .set(vec![(MonitorTarget::Primary, brightness)])
        .await
}

/// Set brightness for one monitor, or for all of them via [`GLOBAL`].
///
/// Accepts a [`MonitorTarget`] or anything convertible into one; plain
/// strings always address a specific monitor id.
pub async fn set_monitor(
    target: impl Into<MonitorTarget>,
    brightness: u16,
) -> Result<SetBrightnessResult> {
    platform_service().set(vec![(target.into(), brightness)]).await
}

/// Apply a whole brightness configuration, one assignment per entry.
///
/// Validation is atomic: if any key is not a current monitor id, or any
/// value is out of range, no monitor is touched and the result reports the
/// failure. Otherwise every assignment is dispatched and the aggregate
/// succeeds only if all writes did.
pub async fn set_config(config: &BrightnessConfiguration) -> Result<SetBrightnessResult> {
    platform_service().set(service::config_assignments(config)).await
}
