//! # Scan Target Model
//!
//! Parses the address-range expression given on the command line.
//!
//! A spec is exactly one of:
//! * A CIDR block (e.g., `192.168.1.0/24`).
//! * A last-octet range (e.g., `192.168.1.1-254`).
//! * A single IPv4 address (e.g., `192.168.1.5`).
//!
//! Notations never mix within a spec. Parsing never touches the network and
//! never resolves hostnames.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::InvalidRangeSpec;
use crate::network::range::{self, Ipv4Range};

/// Largest expansion accepted, one /16 worth of addresses.
pub const MAX_CANDIDATES: u64 = 65_536;

/// The shape a range spec resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// A single host.
    Host { target_addr: Ipv4Addr },
    /// A span produced by CIDR or dash notation.
    Range { ipv4_range: Ipv4Range },
}

impl Target {
    fn len(&self) -> u64 {
        match self {
            Target::Host { .. } => 1,
            Target::Range { ipv4_range } => ipv4_range.len(),
        }
    }
}

impl FromStr for Target {
    type Err = InvalidRangeSpec;

    /// The first matching form wins: anything containing `/` is CIDR, then
    /// anything containing `-` is a dash range, everything else must be a
    /// plain address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            return parse_cidr_range(s);
        }
        if s.contains('-') {
            return parse_ip_range(s);
        }
        parse_host(s)
    }
}

/// A parsed, validated range spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressRange {
    spec: String,
    target: Target,
}

impl AddressRange {
    pub fn target(&self) -> Target {
        self.target
    }

    /// Candidate addresses in ascending order.
    pub fn candidates(&self) -> Vec<Ipv4Addr> {
        match self.target {
            Target::Host { target_addr } => vec![target_addr],
            Target::Range { ipv4_range } => ipv4_range.to_iter().collect(),
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

impl FromStr for AddressRange {
    type Err = InvalidRangeSpec;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();
        if spec.is_empty() {
            return Err(InvalidRangeSpec::new(s, "empty range spec"));
        }

        let target = Target::from_str(spec)?;
        let total = target.len();
        if total > MAX_CANDIDATES {
            return Err(InvalidRangeSpec::new(
                spec,
                format!("expands to {total} addresses, the limit is {MAX_CANDIDATES}"),
            ));
        }

        Ok(Self {
            spec: spec.to_string(),
            target,
        })
    }
}

/// Parses `spec` straight into its candidate addresses.
pub fn parse(spec: &str) -> Result<Vec<Ipv4Addr>, InvalidRangeSpec> {
    spec.parse::<AddressRange>().map(|range| range.candidates())
}

/// Parses a single IPv4 address.
fn parse_host(s: &str) -> Result<Target, InvalidRangeSpec> {
    s.parse::<Ipv4Addr>()
        .map(|target_addr| Target::Host { target_addr })
        .map_err(|e| InvalidRangeSpec::new(s, format!("not an IPv4 address: {e}")))
}

/// Parses a last-octet range like "192.168.1.1-254".
fn parse_ip_range(s: &str) -> Result<Target, InvalidRangeSpec> {
    let Some((base, last)) = s.rsplit_once('.') else {
        return Err(InvalidRangeSpec::new(s, "expected a.b.c.start-end"));
    };
    let Some((start_str, end_str)) = last.split_once('-') else {
        return Err(InvalidRangeSpec::new(
            s,
            "the range must be in the last octet, as in a.b.c.start-end",
        ));
    };

    let base_octets: Vec<u8> = base
        .split('.')
        .map(|octet| parse_octet(octet, s))
        .collect::<Result<_, _>>()?;
    let [a, b, c] = base_octets[..] else {
        return Err(InvalidRangeSpec::new(
            s,
            format!("expected 3 leading octets, found {}", base_octets.len()),
        ));
    };

    let start = parse_octet(start_str, s)?;
    let end = parse_octet(end_str, s)?;
    if start > end {
        return Err(InvalidRangeSpec::new(
            s,
            format!("range start {start} is greater than end {end}"),
        ));
    }

    let ipv4_range = Ipv4Range::new(Ipv4Addr::new(a, b, c, start), Ipv4Addr::new(a, b, c, end));
    Ok(Target::Range { ipv4_range })
}

/// Parses CIDR notation like "192.168.1.0/24".
fn parse_cidr_range(s: &str) -> Result<Target, InvalidRangeSpec> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Err(InvalidRangeSpec::new(s, "expected address/prefix"));
    };

    let ipv4_addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| InvalidRangeSpec::new(s, format!("invalid IP in CIDR '{ip_str}': {e}")))?;

    if prefix_str.is_empty() || !prefix_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidRangeSpec::new(
            s,
            format!("invalid prefix in CIDR '{prefix_str}'"),
        ));
    }
    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|e| InvalidRangeSpec::new(s, format!("invalid prefix in CIDR '{prefix_str}': {e}")))?;

    let ipv4_range =
        range::cidr_hosts(ipv4_addr, prefix).map_err(|e| InvalidRangeSpec::new(s, e.to_string()))?;

    Ok(Target::Range { ipv4_range })
}

/// Decimal octet in [0, 255], spelled the way `Ipv4Addr` accepts it: no
/// signs, no whitespace, no leading zeros.
fn parse_octet(octet: &str, original_s: &str) -> Result<u8, InvalidRangeSpec> {
    if octet.is_empty() || !octet.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidRangeSpec::new(
            original_s,
            format!("'{octet}' is not a decimal octet"),
        ));
    }
    if octet.len() > 1 && octet.starts_with('0') {
        return Err(InvalidRangeSpec::new(
            original_s,
            format!("octet '{octet}' has a leading zero"),
        ));
    }
    octet
        .parse::<u8>()
        .map_err(|_| InvalidRangeSpec::new(original_s, format!("octet {octet} is out of range")))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
