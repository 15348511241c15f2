// SPDX-License-Identifier: GPL-3.0-only
//! DDC/CI (Display Data Channel Command Interface) protocol implementation
//!
//! DDC/CI is the standard protocol for controlling external monitors over
//! the I2C bus carried by the video cable.

use anyhow::Result;
use ddc_hi::{Ddc, Display};

use super::DisplayProtocol;

/// VCP (Virtual Control Panel) code for brightness
const BRIGHTNESS_CODE: u8 = 0x10;

/// One external monitor reachable over DDC/CI
pub struct DdcCiDisplay {
    display: Display,
    /// EDID serial number, possibly backfilled from RandR correlation.
    /// Used to derive display ids that survive reboots.
    edid_serial: Option<String>,
}

impl DdcCiDisplay {
    pub fn new(display: Display) -> Self {
        let edid_serial = display.info.serial_number.clone();
        Self {
            display,
            edid_serial,
        }
    }

    /// Enumerate all DDC/CI displays
    pub fn enumerate() -> Vec<Self> {
        Display::enumerate().into_iter().map(Self::new).collect()
    }

    /// Set the EDID serial number (used to derive a stable display id)
    pub fn set_edid_serial(&mut self, serial: Option<String>) {
        self.edid_serial = serial;
    }

    pub fn edid_serial(&self) -> Option<&str> {
        self.edid_serial.as_deref()
    }

    /// Raw bus-level identifier assigned by the DDC backend
    pub fn bus_id(&self) -> &str {
        &self.display.info.id
    }

    pub fn model(&self) -> Option<&str> {
        self.display.info.model_name.as_deref()
    }

    /// EDID manufacturer PnP id (three letters, e.g. `DEL`)
    pub fn manufacturer(&self) -> Option<&str> {
        self.display.info.manufacturer_id.as_deref()
    }

    /// EDID product code formatted as uppercase hex
    pub fn product_code(&self) -> Option<String> {
        self.display.info.model_id.map(|id| format!("{id:04X}"))
    }
}

impl DisplayProtocol for DdcCiDisplay {
    fn id(&self) -> String {
        display_id(self.edid_serial.as_deref(), &self.display.info.id)
    }

    fn name(&self) -> String {
        self.display
            .info
            .model_name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn get_brightness(&mut self) -> Result<u16> {
        let value = self.display.handle.get_vcp_feature(BRIGHTNESS_CODE)?;
        Ok(value.value())
    }

    fn set_brightness(&mut self, value: u16) -> Result<()> {
        self.display
            .handle
            .set_vcp_feature(BRIGHTNESS_CODE, value)?;
        Ok(())
    }
}

impl std::fmt::Debug for DdcCiDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DdcCiDisplay(id: {}, name: {})", self.id(), self.name())
    }
}

/// Stable id when an EDID serial is known, bus-derived id otherwise.
/// Bus-derived ids may change across reboots; enumeration logs a warning
/// when it has to fall back to one.
fn display_id(serial: Option<&str>, bus_id: &str) -> String {
    match serial {
        Some(serial) => format!("ddc-{serial}"),
        None => bus_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_number_yields_stable_id() {
        assert_eq!(display_id(Some("H4ZN800532"), "i2c-4"), "ddc-H4ZN800532");
    }

    #[test]
    fn missing_serial_falls_back_to_bus_id() {
        assert_eq!(display_id(None, "i2c-4"), "i2c-4");
    }
}
