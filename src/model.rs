//! Value objects of the public API
//!
//! Everything here is an immutable snapshot constructed fresh per call.
//! Monitors are never cached between calls, so two enumerations may differ
//! across hot-plug events.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of a display within one enumeration
pub type DisplayId = String;

/// Map of monitor id -> brightness percentage (0-100)
pub type BrightnessConfiguration = HashMap<DisplayId, u16>;

/// One attached monitor with its identity and geometry.
///
/// All fields are populated for every enumerated monitor. `id` is unique
/// within a single enumeration but not guaranteed stable across hot-plug
/// events or reboots; monitors without an EDID serial number fall back to a
/// bus-derived id.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    /// Stable logical identifier used in `get`/`set` calls
    pub id: DisplayId,
    /// Lower-level platform identifier (connector name such as `DP-2` when
    /// known, raw backend identifier otherwise)
    pub display_id: String,
    /// Human-readable model name, `"Unknown"` when the platform has none
    pub name: String,
    /// EDID manufacturer PnP id (e.g. `DEL`), empty when unavailable
    pub manufacturer: String,
    /// Serial number string, empty when the vendor did not flash one
    pub serial_number: String,
    /// EDID product code as uppercase hex, empty when unavailable
    pub product_code: String,
    /// True for built-in panels (laptop screens)
    pub internal: bool,
    /// Current mode in pixels, zero when the monitor has no active output
    pub size: Size,
    /// Top-left corner in virtual-desktop coordinates, may be negative
    pub position: Position,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Addressing mode of a brightness write.
///
/// The all-monitors sentinel is a dedicated variant rather than a reserved
/// id string, so a monitor whose id happens to read `"GLOBAL"` can never
/// collide with it. Converting a string into a target therefore always
/// yields [`MonitorTarget::Id`]; use the [`GLOBAL`] constant to address
/// every monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorTarget {
    /// The default monitor: first internal panel, else first enumerated
    Primary,
    /// Every monitor attached at the time of the call
    All,
    /// One monitor by id
    Id(DisplayId),
}

/// Sentinel target meaning "every currently attached monitor"
pub const GLOBAL: MonitorTarget = MonitorTarget::All;

impl From<&str> for MonitorTarget {
    fn from(id: &str) -> Self {
        MonitorTarget::Id(id.to_owned())
    }
}

impl From<String> for MonitorTarget {
    fn from(id: String) -> Self {
        MonitorTarget::Id(id)
    }
}

impl fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorTarget::Primary => f.write_str("primary"),
            MonitorTarget::All => f.write_str("GLOBAL"),
            MonitorTarget::Id(id) => f.write_str(id),
        }
    }
}

/// Outcome of a brightness read.
///
/// `brightness` is a percentage in 0-100 exactly when `success` is true.
/// Unknown monitors and hardware read failures both resolve into the
/// unsuccessful shape; they are not errors.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct GetBrightnessResult {
    pub success: bool,
    pub brightness: Option<u16>,
}

impl GetBrightnessResult {
    pub(crate) fn ok(brightness: u16) -> Self {
        Self {
            success: true,
            brightness: Some(brightness),
        }
    }

    pub(crate) fn failed() -> Self {
        Self {
            success: false,
            brightness: None,
        }
    }
}

/// Outcome of a brightness write.
///
/// `message` carries a diagnostic only when `success` is false. The text is
/// for humans; callers should branch on the boolean, not the message.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SetBrightnessResult {
    pub success: bool,
    pub message: Option<String>,
}

impl SetBrightnessResult {
    pub(crate) fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub(crate) fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
