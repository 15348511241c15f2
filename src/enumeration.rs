//! Native display discovery
//!
//! Builds the per-call snapshot of attached monitors: probes the DDC/CI and
//! kernel backlight protocols, then correlates each display with a RandR
//! output to fill in connector name, EDID identity, geometry and the
//! internal flag.
//!
//! Ordering is deterministic so the default-monitor rule is reproducible:
//! internal panels first, then external monitors sorted by id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Monitor, Position, Size};
use crate::protocols::DisplayProtocol;
use crate::protocols::backlight::BacklightDisplay;
use crate::protocols::ddc_ci::DdcCiDisplay;
use crate::randr::{self, OutputInfo};
use crate::service::{AttachedDisplay, Discovery};

/// Discovery over the real platform probes. Constructed fresh per API call
/// and holds no state between calls.
pub(crate) struct PlatformDiscovery;

impl PlatformDiscovery {
    pub(crate) fn new() -> Self {
        Self
    }
}

impl Discovery for PlatformDiscovery {
    fn discover(&self) -> Result<Vec<AttachedDisplay>> {
        Ok(enumerate_displays())
    }
}

fn enumerate_displays() -> Vec<AttachedDisplay> {
    let outputs = match randr::get_outputs() {
        Ok(outputs) => outputs,
        Err(err) => {
            warn!("RandR query failed, monitor geometry will be unavailable: {err:#}");
            HashMap::new()
        }
    };

    let mut displays: Vec<AttachedDisplay> = BacklightDisplay::enumerate()
        .into_iter()
        .map(|panel| attach_backlight(panel, &outputs))
        .collect();

    let mut external: Vec<AttachedDisplay> = DdcCiDisplay::enumerate()
        .into_iter()
        .map(|display| attach_ddc(display, &outputs))
        .collect();
    external.sort_by(|a, b| a.monitor.id.cmp(&b.monitor.id));
    displays.extend(external);

    // Identical monitors without serial numbers can collide on a
    // bus-derived id; suffix repeats so ids stay unique per enumeration
    let mut seen: HashMap<String, usize> = HashMap::new();
    for display in &mut displays {
        let count = seen.entry(display.monitor.id.clone()).or_insert(0);
        if *count > 0 {
            display.monitor.id = format!("{}-{count}", display.monitor.id);
        }
        *count += 1;
    }

    info!("enumerated {} monitor(s)", displays.len());
    displays
}

fn attach_ddc(
    mut display: DdcCiDisplay,
    outputs: &HashMap<String, OutputInfo>,
) -> AttachedDisplay {
    let output =
        randr::find_matching_output(display.edid_serial(), display.model(), outputs).cloned();

    // Backfill the serial from the output's EDID so the id stays stable
    // even when the DDC backend could not read one itself
    if display.edid_serial().is_none() {
        if let Some(serial) = output.as_ref().and_then(|output| output.serial.clone()) {
            display.set_edid_serial(Some(serial));
        }
    }

    let id = display.id();
    if !id.starts_with("ddc-") {
        let name = display.name();
        warn!(
            "display {} has no EDID serial, id {id} may change across reboots",
            name
        );
    }

    let monitor = Monitor {
        id,
        display_id: output
            .as_ref()
            .map(|output| output.connector_name.clone())
            .unwrap_or_else(|| display.bus_id().to_string()),
        name: display.name(),
        manufacturer: display
            .manufacturer()
            .map(str::to_string)
            .or_else(|| output.as_ref().and_then(|output| output.make.clone()))
            .unwrap_or_default(),
        serial_number: display.edid_serial().map(str::to_string).unwrap_or_default(),
        product_code: display
            .product_code()
            .or_else(|| output.as_ref().and_then(|output| output.product_code.clone()))
            .unwrap_or_default(),
        internal: output.as_ref().is_some_and(|output| output.internal),
        size: output_size(output.as_ref()),
        position: output_position(output.as_ref()),
    };

    AttachedDisplay {
        monitor,
        handle: Arc::new(Mutex::new(Box::new(display) as Box<dyn DisplayProtocol>)),
    }
}

fn attach_backlight(
    panel: BacklightDisplay,
    outputs: &HashMap<String, OutputInfo>,
) -> AttachedDisplay {
    // The kernel does not tie a backlight device to a connector; in
    // practice the internal output is the panel it drives. Scan in
    // connector-name order to stay deterministic.
    let mut candidates: Vec<&OutputInfo> = outputs
        .values()
        .filter(|output| output.internal)
        .collect();
    candidates.sort_by(|a, b| a.connector_name.cmp(&b.connector_name));
    let output = candidates.first().map(|output| (*output).clone());

    let monitor = Monitor {
        id: panel.id(),
        display_id: output
            .as_ref()
            .map(|output| output.connector_name.clone())
            .unwrap_or_else(|| panel.device().to_string()),
        name: output
            .as_ref()
            .and_then(|output| output.model.clone())
            .unwrap_or_else(|| "Internal".to_string()),
        manufacturer: output
            .as_ref()
            .and_then(|output| output.make.clone())
            .unwrap_or_default(),
        serial_number: output
            .as_ref()
            .and_then(|output| output.serial.clone())
            .unwrap_or_default(),
        product_code: output
            .as_ref()
            .and_then(|output| output.product_code.clone())
            .unwrap_or_default(),
        internal: true,
        size: output_size(output.as_ref()),
        position: output_position(output.as_ref()),
    };

    AttachedDisplay {
        monitor,
        handle: Arc::new(Mutex::new(Box::new(panel) as Box<dyn DisplayProtocol>)),
    }
}

fn output_size(output: Option<&OutputInfo>) -> Size {
    output
        .map(|output| Size {
            width: output.width,
            height: output.height,
        })
        .unwrap_or_default()
}

fn output_position(output: Option<&OutputInfo>) -> Position {
    output
        .map(|output| Position {
            x: output.x,
            y: output.y,
        })
        .unwrap_or_default()
}
