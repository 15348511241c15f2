// SPDX-License-Identifier: GPL-3.0-only
//! Kernel backlight protocol implementation
//!
//! Internal panels do not speak DDC/CI. On Linux the kernel exposes them
//! under `/sys/class/backlight`, each device declaring a raw brightness
//! range; values are converted to and from percentages here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use super::DisplayProtocol;

const SYSFS_BACKLIGHT: &str = "/sys/class/backlight";

/// One internal panel driven through the kernel backlight interface
pub struct BacklightDisplay {
    device: String,
    path: PathBuf,
    max_brightness: u32,
}

impl BacklightDisplay {
    /// Enumerate backlight devices known to the kernel.
    /// Hosts without the sysfs class (desktops, non-Linux) yield nothing.
    pub fn enumerate() -> Vec<Self> {
        Self::enumerate_in(Path::new(SYSFS_BACKLIGHT))
    }

    fn enumerate_in(root: &Path) -> Vec<Self> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut devices = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let device = entry.file_name().to_string_lossy().into_owned();
            match read_sysfs_value(&path.join("max_brightness")) {
                Ok(max) if max > 0 => devices.push(Self {
                    device,
                    path,
                    max_brightness: max,
                }),
                Ok(_) => warn!("backlight device {device} declares an empty raw range"),
                Err(err) => warn!("skipping backlight device {device}: {err:#}"),
            }
        }

        devices.sort_by(|a, b| a.device.cmp(&b.device));
        devices
    }

    /// Sysfs device name (e.g. `intel_backlight`)
    pub fn device(&self) -> &str {
        &self.device
    }

    fn read_raw(&self) -> Result<u32> {
        // actual_brightness reflects what the hardware is doing right now;
        // some drivers only provide the last requested value
        read_sysfs_value(&self.path.join("actual_brightness"))
            .or_else(|_| read_sysfs_value(&self.path.join("brightness")))
    }
}

impl DisplayProtocol for BacklightDisplay {
    fn id(&self) -> String {
        format!("backlight-{}", self.device)
    }

    fn name(&self) -> String {
        self.device.clone()
    }

    fn get_brightness(&mut self) -> Result<u16> {
        Ok(percent_from_raw(self.read_raw()?, self.max_brightness))
    }

    fn set_brightness(&mut self, value: u16) -> Result<()> {
        let raw = raw_from_percent(value, self.max_brightness);
        let target = self.path.join("brightness");
        fs::write(&target, raw.to_string())
            .with_context(|| format!("failed to write {}", target.display()))?;
        Ok(())
    }
}

impl std::fmt::Debug for BacklightDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BacklightDisplay(device: {}, max: {})",
            self.device, self.max_brightness
        )
    }
}

fn read_sysfs_value(path: &Path) -> Result<u32> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    text.trim()
        .parse()
        .with_context(|| format!("malformed value in {}", path.display()))
}

fn percent_from_raw(raw: u32, max: u32) -> u16 {
    let scaled = (u64::from(raw) * 100 + u64::from(max) / 2) / u64::from(max);
    scaled.min(100) as u16
}

fn raw_from_percent(percent: u16, max: u32) -> u32 {
    ((u64::from(percent) * u64::from(max) + 50) / 100) as u32
}
