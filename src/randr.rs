// SPDX-License-Identifier: GPL-3.0-only
//! X11 RandR output queries
//!
//! DDC/CI and backlight probes know how to move brightness but very little
//! about what they are moving. This module fetches the connected outputs
//! with their geometry and EDID identity, so enumeration can correlate each
//! display handle with a connector name, position and size.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrConnectionExt};
use x11rb::protocol::xproto::ConnectionExt as XprotoConnectionExt;
use x11rb::rust_connection::RustConnection;

/// One connected output as reported by RandR
#[derive(Debug, Clone)]
pub(crate) struct OutputInfo {
    /// Connector name (e.g. `DP-2`, `HDMI-1`, `eDP-1`)
    pub connector_name: String,
    /// Manufacturer PnP id from EDID
    pub make: Option<String>,
    /// Model name from the EDID descriptor block
    pub model: Option<String>,
    /// Serial number string from the EDID descriptor block
    pub serial: Option<String>,
    /// EDID product code as uppercase hex
    pub product_code: Option<String>,
    /// True for built-in panel connectors
    pub internal: bool,
    /// Whether the output currently drives a mode
    pub enabled: bool,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default, Clone)]
struct EdidIdentity {
    manufacturer: Option<String>,
    model: Option<String>,
    serial: Option<String>,
    product_code: Option<String>,
}

/// Fetch all connected outputs, keyed by connector name.
/// One synchronous round-trip to the local X server.
pub(crate) fn get_outputs() -> Result<HashMap<String, OutputInfo>> {
    let (conn, screen_num) = RustConnection::connect(None)?;
    let screen = &conn.setup().roots[screen_num];
    let root = screen.root;

    conn.randr_query_version(1, 5)?.reply()?;
    let resources = conn.randr_get_screen_resources_current(root)?.reply()?;
    let edid_atom = conn.intern_atom(false, b"EDID")?.reply()?.atom;

    let mut outputs = HashMap::new();
    for output in resources.outputs {
        let info = conn
            .randr_get_output_info(output, resources.config_timestamp)?
            .reply()?;
        if info.connection != randr::Connection::CONNECTED {
            continue;
        }
        let connector_name = String::from_utf8_lossy(&info.name).to_string();

        // Geometry comes from the active crtc; a connected but disabled
        // output keeps zero geometry.
        let enabled = info.crtc != 0;
        let (mut x, mut y, mut width, mut height) = (0i32, 0i32, 0u32, 0u32);
        if enabled {
            let crtc = conn
                .randr_get_crtc_info(info.crtc, resources.config_timestamp)?
                .reply()?;
            x = i32::from(crtc.x);
            y = i32::from(crtc.y);
            width = u32::from(crtc.width);
            height = u32::from(crtc.height);
        }

        let mut identity = EdidIdentity::default();
        if let Ok(cookie) = conn.randr_get_output_property(
            output,
            edid_atom,
            x11rb::NONE,
            0,
            u32::MAX,
            false,
            false,
        ) {
            if let Ok(prop) = cookie.reply() {
                if prop.format == 8 && !prop.data.is_empty() {
                    match parse_edid(&prop.data) {
                        Ok(parsed) => identity = parsed,
                        Err(err) => debug!("unreadable EDID on {connector_name}: {err}"),
                    }
                }
            }
        }

        if identity.model.is_none() {
            warn!("output {connector_name} exposes no EDID model name");
        }

        outputs.insert(
            connector_name.clone(),
            OutputInfo {
                internal: is_internal_connector(&connector_name),
                connector_name,
                make: identity.manufacturer,
                model: identity.model,
                serial: identity.serial,
                product_code: identity.product_code,
                enabled,
                x,
                y,
                width,
                height,
            },
        );
    }

    debug!("found {} connected output(s)", outputs.len());
    Ok(outputs)
}

/// Built-in panels sit behind dedicated connector types
fn is_internal_connector(name: &str) -> bool {
    ["eDP", "LVDS", "DSI"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Correlate a display handle with an output.
///
/// Serial numbers are the only identity unique per unit, so they win; model
/// matching tolerates the case and spacing differences between EDID sources.
/// Candidates are scanned in connector-name order so the result is stable.
pub(crate) fn find_matching_output<'a>(
    serial: Option<&str>,
    model: Option<&str>,
    outputs: &'a HashMap<String, OutputInfo>,
) -> Option<&'a OutputInfo> {
    // Disabled outputs have no geometry worth correlating with
    let mut candidates: Vec<&OutputInfo> = outputs.values().filter(|output| output.enabled).collect();
    candidates.sort_by(|a, b| a.connector_name.cmp(&b.connector_name));

    if let Some(serial) = serial {
        if let Some(output) = candidates
            .iter()
            .copied()
            .find(|output| output.serial.as_deref() == Some(serial))
        {
            debug!("serial match: {serial} -> {}", output.connector_name);
            return Some(output);
        }
    }

    let model = model?;
    let wanted = model.replace(' ', "");
    if let Some(output) = candidates.iter().copied().find(|output| {
        output
            .model
            .as_deref()
            .is_some_and(|m| m.replace(' ', "").eq_ignore_ascii_case(&wanted))
    }) {
        debug!("model match: {model} -> {}", output.connector_name);
        return Some(output);
    }

    // Last resort for truncated descriptor strings
    let wanted = model.to_lowercase();
    if let Some(output) = candidates.iter().copied().find(|output| {
        output
            .model
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains(&wanted))
    }) {
        debug!("partial model match: {model} -> {}", output.connector_name);
        return Some(output);
    }

    warn!("no matching output for model {model}");
    None
}

fn parse_edid(edid: &[u8]) -> Result<EdidIdentity> {
    if edid.len() < 128 {
        return Err(anyhow!("EDID block too short: {} bytes", edid.len()));
    }

    // Manufacturer id: bytes 8-9, big-endian, three 5-bit letters
    let mfg_id = u16::from_be_bytes([edid[8], edid[9]]);
    let c1 = (((mfg_id >> 10) & 0x1F) as u8 + 0x40) as char;
    let c2 = (((mfg_id >> 5) & 0x1F) as u8 + 0x40) as char;
    let c3 = ((mfg_id & 0x1F) as u8 + 0x40) as char;
    let manufacturer = if c1.is_ascii_uppercase() && c2.is_ascii_uppercase() && c3.is_ascii_uppercase()
    {
        Some(format!("{c1}{c2}{c3}"))
    } else {
        None
    };

    // Product code: bytes 10-11, little-endian
    let product_code = Some(format!(
        "{:04X}",
        u16::from_le_bytes([edid[10], edid[11]])
    ));

    // Descriptor blocks: 18-byte chunks from offset 54, tag 0xFC holds the
    // model name, 0xFF the serial string
    let mut model = None;
    let mut serial = None;
    let mut offset = 54;
    while offset + 18 <= 126 {
        let block = &edid[offset..offset + 18];
        if block[0] == 0 && block[1] == 0 {
            match block[3] {
                0xFC => {
                    let text = parse_descriptor_text(&block[5..18]);
                    if !text.is_empty() {
                        model = Some(text);
                    }
                }
                0xFF => {
                    let text = parse_descriptor_text(&block[5..18]);
                    if !text.is_empty() {
                        serial = Some(text);
                    }
                }
                _ => {}
            }
        }
        offset += 18;
    }

    Ok(EdidIdentity {
        manufacturer,
        model,
        serial,
        product_code,
    })
}

fn parse_descriptor_text(bytes: &[u8]) -> String {
    let text: Vec<u8> = bytes
        .iter()
        .copied()
        .take_while(|&b| b != 0x0A && b != 0x00)
        .collect();
    String::from_utf8_lossy(&text).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(connector: &str, model: Option<&str>, serial: Option<&str>) -> OutputInfo {
        OutputInfo {
            connector_name: connector.to_string(),
            make: Some("DEL".to_string()),
            model: model.map(str::to_string),
            serial: serial.map(str::to_string),
            product_code: Some("40A2".to_string()),
            internal: is_internal_connector(connector),
            enabled: true,
            x: 0,
            y: 0,
            width: 2560,
            height: 1440,
        }
    }

    fn test_outputs() -> HashMap<String, OutputInfo> {
        let mut outputs = HashMap::new();
        outputs.insert(
            "DP-2".to_string(),
            output("DP-2", Some("U2723QE"), Some("H4ZN800532")),
        );
        outputs.insert(
            "eDP-1".to_string(),
            output("eDP-1", Some("Built-in Panel"), None),
        );
        outputs
    }

    /// 128-byte EDID with manufacturer DEL, product code 0x40A2, a model
    /// descriptor and a serial descriptor
    fn test_edid() -> Vec<u8> {
        let mut edid = vec![0u8; 128];
        edid[8] = 0x10; // "DEL"
        edid[9] = 0xAC;
        edid[10] = 0xA2; // product code, little-endian
        edid[11] = 0x40;

        edid[54 + 3] = 0xFC;
        edid[54 + 5..54 + 5 + 8].copy_from_slice(b"U2723QE\n");

        edid[72 + 3] = 0xFF;
        edid[72 + 5..72 + 5 + 11].copy_from_slice(b"H4ZN800532\n");

        edid
    }

    #[test]
    fn edid_identity_is_extracted() {
        let identity = parse_edid(&test_edid()).unwrap();
        assert_eq!(identity.manufacturer.as_deref(), Some("DEL"));
        assert_eq!(identity.model.as_deref(), Some("U2723QE"));
        assert_eq!(identity.serial.as_deref(), Some("H4ZN800532"));
        assert_eq!(identity.product_code.as_deref(), Some("40A2"));
    }

    #[test]
    fn truncated_edid_is_rejected() {
        assert!(parse_edid(&[0u8; 64]).is_err());
    }

    #[test]
    fn descriptor_text_stops_at_terminator_and_trims_padding() {
        assert_eq!(parse_descriptor_text(b"U2723QE\n     "), "U2723QE");
        assert_eq!(parse_descriptor_text(b"   \n         "), "");
    }

    #[test]
    fn serial_match_wins_over_model_match() {
        let outputs = test_outputs();
        let found =
            find_matching_output(Some("H4ZN800532"), Some("Built-in Panel"), &outputs).unwrap();
        assert_eq!(found.connector_name, "DP-2");
    }

    #[test]
    fn model_match_ignores_case_and_spacing() {
        let outputs = test_outputs();
        let found = find_matching_output(None, Some("u2723 qe"), &outputs).unwrap();
        assert_eq!(found.connector_name, "DP-2");
    }

    #[test]
    fn partial_model_match_is_last_resort() {
        let outputs = test_outputs();
        let found = find_matching_output(None, Some("Panel"), &outputs).unwrap();
        assert_eq!(found.connector_name, "eDP-1");
    }

    #[test]
    fn unknown_display_matches_nothing() {
        let outputs = test_outputs();
        assert!(find_matching_output(Some("other"), Some("XB273U"), &outputs).is_none());
    }

    #[test]
    fn internal_connectors_are_recognized() {
        assert!(is_internal_connector("eDP-1"));
        assert!(is_internal_connector("LVDS-1"));
        assert!(is_internal_connector("DSI-2"));
        assert!(!is_internal_connector("DP-2"));
        assert!(!is_internal_connector("HDMI-1"));
    }
}
