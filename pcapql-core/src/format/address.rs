//! Network address formatting and detection.
//!
//! The evaluator turns IPv4 and MAC fields into plain integers so they can
//! be compared against literals. These helpers turn them back into text and
//! recognize, from a dotted field name, which columns hold addresses.

use std::net::Ipv4Addr;

/// The kind of network address a column represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// IPv4 address carried as a 32-bit integer
    Ipv4,
    /// MAC address carried as a 48-bit integer
    Mac,
}

/// Format a u32 as an IPv4 address in dotted-decimal notation.
///
/// ```
/// use pcapql_core::format::format_ipv4;
///
/// assert_eq!(format_ipv4(0xC0A80101), "192.168.1.1");
/// ```
pub fn format_ipv4(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

/// Format 6 bytes as a colon-separated MAC address.
///
/// Returns `None` if the slice is not exactly 6 bytes.
pub fn format_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    ))
}

/// Format the low 48 bits of `value` as a MAC address.
///
/// ```
/// use pcapql_core::format::format_mac_u64;
///
/// assert_eq!(format_mac_u64(0x0011_2233_4455), "00:11:22:33:44:55");
/// ```
pub fn format_mac_u64(value: u64) -> String {
    let bytes = value.to_be_bytes();
    format_mac(&bytes[2..]).unwrap_or_default()
}

/// Detect whether a dotted field name holds a network address.
///
/// | AddressKind | Fields |
/// |-------------|--------|
/// | Ipv4 | `ip.src`, `ip.dst` (and `ipv4.*`), `arp.spa`, `arp.tpa` |
/// | Mac | `eth.src`, `eth.dst` (and `ethernet.*`), `arp.sha`, `arp.tha` |
pub fn detect_address_column(name: &str) -> Option<AddressKind> {
    let name = name.to_ascii_lowercase();
    let (layer, field) = name.split_once('.')?;

    match (layer, field) {
        ("ip" | "ipv4", "src" | "dst") | ("arp", "spa" | "tpa") => Some(AddressKind::Ipv4),
        ("eth" | "ethernet", "src" | "dst") | ("arp", "sha" | "tha") => Some(AddressKind::Mac),
        _ => None,
    }
}
