use std::net::Ipv4Addr;

/// Prefix of the aliases synthesized for the configuration fragment.
pub const ALIAS_PREFIX: &str = "Device_";

/// A host that answered the identify query as a CozyLife device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredDevice {
    /// `did` of the identify response.
    pub serial: String,
    /// `pid` of the identify response.
    pub product_id: String,
    pub mac: Option<String>,
    /// Address the device reports for itself, or the dialed address when it reports none.
    pub ip: String,
    /// Address that was dialed.
    pub address: Ipv4Addr,
}

impl DiscoveredDevice {
    pub fn alias(&self) -> String {
        alias_for(&self.serial)
    }
}

/// `Device_` followed by the last four characters of `serial`.
pub fn alias_for(serial: &str) -> String {
    let chars: Vec<char> = serial.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{ALIAS_PREFIX}{tail}")
}
