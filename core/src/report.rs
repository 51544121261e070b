//! Renders a [`ScanResult`] as a plain-text summary and as the configuration
//! fragment consumed by the `hass_cozylife_local_pull` integration.
//!
//! The fragment's keys (`serial_number`, `alias`, `ip`) and nesting are read by
//! that integration's config loader and must not change.

use std::fmt::Write;

use cozyscan_common::config::FragmentFormat;
use cozyscan_common::network::device::DiscoveredDevice;
use serde_json::{Map, Value};

use crate::scanner::ScanResult;

pub const INTEGRATION_KEY: &str = "hass_cozylife_local_pull";
pub const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub summary_text: String,
    pub config_fragment: String,
}

/// One `devices` entry of the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub serial_number: String,
    pub alias: String,
    /// The dialed address, which is where the control client connects.
    pub ip: String,
}

impl From<&DiscoveredDevice> for DeviceEntry {
    fn from(device: &DiscoveredDevice) -> Self {
        Self {
            serial_number: device.serial.clone(),
            alias: device.alias(),
            ip: device.address.to_string(),
        }
    }
}

pub fn format(result: &ScanResult, fragment_format: FragmentFormat) -> Report {
    let entries = device_entries(result);
    let config_fragment = match fragment_format {
        FragmentFormat::Yaml => yaml_fragment(&entries),
        FragmentFormat::Json => json_fragment(&entries),
    };

    Report {
        summary_text: summary_text(result),
        config_fragment,
    }
}

/// Fragment entries ordered by address.
pub fn device_entries(result: &ScanResult) -> Vec<DeviceEntry> {
    sorted_devices(result).into_iter().map(DeviceEntry::from).collect()
}

fn sorted_devices(result: &ScanResult) -> Vec<&DiscoveredDevice> {
    let mut devices: Vec<&DiscoveredDevice> = result.devices.iter().collect();
    devices.sort_by_key(|device| device.address);
    devices
}

fn summary_text(result: &ScanResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scanned {} IP address(es) for CozyLife devices",
        result.scanned()
    );

    let mut outcomes = result.outcomes.clone();
    outcomes.sort_by_key(|event| event.address);
    for event in &outcomes {
        let marker = if event.found { "✓ FOUND" } else { "✗" };
        let _ = writeln!(out, "  {} {marker}", event.address);
    }

    let _ = writeln!(out);
    let _ = write!(
        out,
        "Scan complete. Found {} CozyLife device(s)",
        result.devices.len()
    );
    if result.failures > 0 {
        let _ = write!(out, ", {} probe(s) failed locally", result.failures);
    }
    if result.interrupted {
        let _ = write!(out, " (interrupted)");
    }
    let _ = writeln!(out);

    for (idx, device) in sorted_devices(result).into_iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "[{idx}] {}", device.address);
        let _ = writeln!(out, "    Serial Number: {}", device.serial);
        let _ = writeln!(out, "    Product ID: {}", device.product_id);
        if let Some(mac) = &device.mac {
            let _ = writeln!(out, "    MAC: {mac}");
        }
        let _ = writeln!(out, "    IP: {}", device.ip);
    }

    out
}

fn yaml_fragment(entries: &[DeviceEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{INTEGRATION_KEY}:");
    let _ = writeln!(out, "  lang: {DEFAULT_LANG}");
    if entries.is_empty() {
        let _ = writeln!(out, "  devices: []");
        return out;
    }

    let _ = writeln!(out, "  devices:");
    for entry in entries {
        let _ = writeln!(out, "    - serial_number: {}", yaml_scalar(&entry.serial_number));
        let _ = writeln!(out, "      alias: {}", yaml_scalar(&entry.alias));
        let _ = writeln!(out, "      ip: {}", yaml_scalar(&entry.ip));
    }
    out
}

fn json_fragment(entries: &[DeviceEntry]) -> String {
    let devices: Vec<Value> = entries
        .iter()
        .map(|entry| {
            let mut device = Map::new();
            device.insert("serial_number".into(), entry.serial_number.clone().into());
            device.insert("alias".into(), entry.alias.clone().into());
            device.insert("ip".into(), entry.ip.clone().into());
            Value::Object(device)
        })
        .collect();

    let mut section = Map::new();
    section.insert("lang".into(), DEFAULT_LANG.into());
    section.insert("devices".into(), Value::Array(devices));

    let mut root = Map::new();
    root.insert(INTEGRATION_KEY.into(), Value::Object(section));

    format!("{:#}\n", Value::Object(root))
}

/// Plain scalar when a YAML 1.1 loader reads it back as the same string,
/// double-quoted otherwise.
fn yaml_scalar(value: &str) -> String {
    let plain = !value.is_empty()
        && !value.starts_with(['-', '.'])
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        && !value.ends_with(':')
        && !value.contains(": ")
        && !resolves_to_non_string(value);
    if plain {
        return value.to_string();
    }
    // JSON string syntax is a valid YAML double-quoted scalar
    Value::String(value.to_string()).to_string()
}

/// Bool and null words, and anything shaped like an int or float
/// (`12345`, `0123`, `1:20`, `1.5e3`). Dotted quads stay strings.
fn resolves_to_non_string(value: &str) -> bool {
    const KEYWORDS: [&str; 9] = ["y", "n", "yes", "no", "true", "false", "on", "off", "null"];
    if KEYWORDS.iter().any(|word| value.eq_ignore_ascii_case(word)) {
        return true;
    }
    value.starts_with(|c: char| c.is_ascii_digit()) && value.matches('.').count() <= 1
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
