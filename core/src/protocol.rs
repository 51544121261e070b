//! # Identify handshake codec
//!
//! CozyLife devices speak newline-framed JSON on TCP. The identify query is
//! `{"cmd":0,"pv":0,"sn":"<millis>","msg":{}}` followed by CR LF; a device
//! answers with an object whose `msg` carries at least `did` and `pid`.

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use cozyscan_common::network::device::DiscoveredDevice;
use serde::Serialize;
use serde_json::{Map, Value};

/// Command code of the info/identify query.
pub const CMD_INFO: u8 = 0;
pub const PROTOCOL_VERSION: u8 = 0;
pub const FRAME_TERMINATOR: &[u8] = b"\r\n";
/// Size of the single read performed per probe.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Result of classifying one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(DiscoveredDevice),
    Absent,
}

impl ProbeOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ProbeOutcome::Found(_))
    }

    pub fn into_device(self) -> Option<DiscoveredDevice> {
        match self {
            ProbeOutcome::Found(device) => Some(device),
            ProbeOutcome::Absent => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifyRequest {
    pub cmd: u8,
    pub pv: u8,
    pub sn: String,
    pub msg: Map<String, Value>,
}

impl IdentifyRequest {
    pub fn new() -> Self {
        Self::with_sn(sequence_number())
    }

    pub fn with_sn(sn: impl Into<String>) -> Self {
        Self {
            cmd: CMD_INFO,
            pv: PROTOCOL_VERSION,
            sn: sn.into(),
            msg: Map::new(),
        }
    }

    /// Compact JSON followed by CR LF, ready for a single write.
    pub fn to_frame(&self) -> serde_json::Result<Vec<u8>> {
        let mut frame = serde_json::to_vec(self)?;
        frame.extend_from_slice(FRAME_TERMINATOR);
        Ok(frame)
    }
}

impl Default for IdentifyRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock milliseconds as a decimal string.
pub fn sequence_number() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Classifies the bytes read from `dialed`.
///
/// Anything that is not UTF-8 JSON with an object `msg` holding non-empty
/// `did` and `pid` is [`ProbeOutcome::Absent`].
pub fn classify(raw: &[u8], dialed: Ipv4Addr) -> ProbeOutcome {
    let Ok(text) = std::str::from_utf8(raw) else {
        return ProbeOutcome::Absent;
    };
    let Ok(response) = serde_json::from_str::<Value>(text.trim()) else {
        return ProbeOutcome::Absent;
    };
    let Some(msg) = response.get("msg").and_then(Value::as_object) else {
        return ProbeOutcome::Absent;
    };

    let (Some(serial), Some(product_id)) = (field_text(msg, "did"), field_text(msg, "pid")) else {
        return ProbeOutcome::Absent;
    };

    ProbeOutcome::Found(DiscoveredDevice {
        serial,
        product_id,
        mac: field_text(msg, "mac"),
        ip: field_text(msg, "ip").unwrap_or_else(|| dialed.to_string()),
        address: dialed,
    })
}

/// Non-empty string or number under `key`.
fn field_text(msg: &Map<String, Value>, key: &str) -> Option<String> {
    match msg.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
