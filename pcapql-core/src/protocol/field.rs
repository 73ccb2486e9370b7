//! Field values produced by protocol parsers.
//!
//! Values borrow from the frame where they exist verbatim in it (`Str`,
//! `Bytes`) and own their data when they have to be constructed
//! (`OwnedString`, `OwnedBytes`).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use compact_str::CompactString;

/// A decoded header field.
///
/// The lifetime parameter `'data` ties borrowed variants to the frame bytes.
#[derive(Debug, Clone)]
pub enum FieldValue<'data> {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int64(i64),
    Bool(bool),

    /// IP address (v4 or v6)
    IpAddr(IpAddr),
    /// MAC address (6 bytes)
    MacAddr([u8; 6]),

    /// Zero-copy string (static names or text present in the frame).
    Str(&'data str),
    /// Zero-copy byte slice into the frame.
    Bytes(&'data [u8]),

    /// Constructed string (DNS names, protocol chains).
    OwnedString(CompactString),
    /// Constructed bytes.
    OwnedBytes(Vec<u8>),

    /// Missing value
    Null,
}

impl<'data> FieldValue<'data> {
    /// Create a MAC address from bytes.
    pub fn mac(bytes: &[u8]) -> Self {
        if bytes.len() >= 6 {
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&bytes[..6]);
            FieldValue::MacAddr(mac)
        } else {
            FieldValue::Null
        }
    }

    /// Create an IPv4 address from bytes.
    pub fn ipv4(bytes: &[u8]) -> Self {
        if bytes.len() >= 4 {
            FieldValue::IpAddr(IpAddr::V4(Ipv4Addr::new(
                bytes[0], bytes[1], bytes[2], bytes[3],
            )))
        } else {
            FieldValue::Null
        }
    }

    /// Create an IPv6 address from bytes.
    pub fn ipv6(bytes: &[u8]) -> Self {
        if bytes.len() >= 16 {
            let mut arr = [0u8; 16];
            arr.copy_from_slice(&bytes[..16]);
            FieldValue::IpAddr(IpAddr::V6(Ipv6Addr::from(arr)))
        } else {
            FieldValue::Null
        }
    }

    /// Format a MAC address as a string.
    pub fn format_mac(mac: &[u8; 6]) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::UInt8(v) => Some(*v as u64),
            FieldValue::UInt16(v) => Some(*v as u64),
            FieldValue::UInt32(v) => Some(*v as u64),
            FieldValue::UInt64(v) => Some(*v),
            FieldValue::Int64(v) if *v >= 0 => Some(*v as u64),
            FieldValue::Bool(v) => Some(*v as u64),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int64(v) => Some(*v),
            FieldValue::UInt8(v) => Some(*v as i64),
            FieldValue::UInt16(v) => Some(*v as i64),
            FieldValue::UInt32(v) => Some(*v as i64),
            FieldValue::UInt64(v) => i64::try_from(*v).ok(),
            FieldValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// IPv4 address as a host-order 32-bit integer.
    pub fn as_ipv4_u32(&self) -> Option<u32> {
        match self {
            FieldValue::IpAddr(IpAddr::V4(addr)) => Some(u32::from(*addr)),
            _ => None,
        }
    }

    /// MAC address as a 48-bit integer.
    pub fn as_mac_u64(&self) -> Option<u64> {
        match self {
            FieldValue::MacAddr(mac) => Some(
                mac.iter()
                    .fold(0u64, |acc, byte| (acc << 8) | *byte as u64),
            ),
            _ => None,
        }
    }

    /// Try to get as str reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::OwnedString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::OwnedBytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::UInt64(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Str(s) => write!(f, "{s}"),
            FieldValue::OwnedString(s) => write!(f, "{s}"),
            FieldValue::Bytes(b) => write_hex(f, b),
            FieldValue::OwnedBytes(b) => write_hex(f, b),
            FieldValue::IpAddr(addr) => write!(f, "{addr}"),
            FieldValue::MacAddr(mac) => write!(f, "{}", Self::format_mac(mac)),
            FieldValue::Null => write!(f, "NULL"),
        }
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

impl<'a, 'b> PartialEq<FieldValue<'b>> for FieldValue<'a> {
    fn eq(&self, other: &FieldValue<'b>) -> bool {
        match (self, other) {
            (FieldValue::UInt8(a), FieldValue::UInt8(b)) => a == b,
            (FieldValue::UInt16(a), FieldValue::UInt16(b)) => a == b,
            (FieldValue::UInt32(a), FieldValue::UInt32(b)) => a == b,
            (FieldValue::UInt64(a), FieldValue::UInt64(b)) => a == b,
            (FieldValue::Int64(a), FieldValue::Int64(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::IpAddr(a), FieldValue::IpAddr(b)) => a == b,
            (FieldValue::MacAddr(a), FieldValue::MacAddr(b)) => a == b,
            (FieldValue::Null, FieldValue::Null) => true,
            (a, b) => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_bytes(), b.as_bytes()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(FieldValue::UInt16(443).as_u64(), Some(443));
        assert_eq!(FieldValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(FieldValue::Bool(true).as_i64(), Some(1));
        assert_eq!(FieldValue::Str("x").as_u64(), None);
    }

    #[test]
    fn test_address_integers() {
        let ip = FieldValue::ipv4(&[192, 168, 1, 10]);
        assert_eq!(ip.as_ipv4_u32(), Some(0xC0A8010A));

        let mac = FieldValue::mac(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(mac.as_mac_u64(), Some(0x0011_2233_4455));
        assert_eq!(mac.to_string(), "00:11:22:33:44:55");

        assert!(FieldValue::ipv4(&[1, 2]).is_null());
    }

    #[test]
    fn test_borrowed_owned_equality() {
        let data = b"example.com";
        let borrowed = FieldValue::Str(std::str::from_utf8(data).unwrap());
        let owned = FieldValue::OwnedString(CompactString::new("example.com"));
        assert_eq!(borrowed, owned);

        let bytes = FieldValue::Bytes(&[0xde, 0xad]);
        assert_eq!(bytes, FieldValue::OwnedBytes(vec![0xde, 0xad]));
        assert_eq!(bytes.to_string(), "dead");
    }

    #[test]
    fn test_zero_copy_bytes() {
        let packet = vec![0x45, 0x00, 0x00, 0x28, 0xde, 0xad, 0xbe, 0xef];
        let value = FieldValue::Bytes(&packet[4..]);

        match value {
            FieldValue::Bytes(b) => assert!(std::ptr::eq(b.as_ptr(), packet[4..].as_ptr())),
            _ => panic!("Expected Bytes variant"),
        }
    }
}
