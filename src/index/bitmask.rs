//! Protocol bit table.
//!
//! Bit positions are persisted in every segment index; never reorder.

use std::fmt;

/// `(name, bit)` for every protocol the index records.
pub const PROTOCOL_BITS: &[(&str, u32)] = &[
    ("ETHERNET", 0),
    ("ARP", 1),
    ("IPV4", 2),
    ("IPV6", 3),
    ("ICMP", 4),
    ("UDP", 5),
    ("TCP", 6),
    ("DNS", 7),
    ("DHCP", 8),
    ("HTTPS", 9),
    ("SSH", 10),
    ("RDP", 11),
    ("TELNET", 12),
    ("SMTP", 13),
    ("IMAP", 14),
    ("IMAPS", 15),
    ("POP3", 16),
    ("POP3S", 17),
    ("SNMP", 18),
    ("FTP", 19),
    ("HTTP", 20),
    ("NTP", 21),
    ("RTP", 22),
    ("RTCP", 23),
    ("SIP", 24),
    ("SIP_TLS", 25),
    ("BGP", 26),
    ("SMB", 27),
    ("ICMP_UNREACHABLE", 28),
    ("VLAN", 29),
];

/// Alternative names accepted when translating names to bits.
const ALIASES: &[(&str, &str)] = &[("IP", "IPV4"), ("ETH", "ETHERNET"), ("IP6", "IPV6")];

/// A set of protocol bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProtocolMask(pub u64);

impl ProtocolMask {
    pub const EMPTY: ProtocolMask = ProtocolMask(0);

    /// Bit for a protocol name (case-insensitive, aliases accepted).
    pub fn bit(name: &str) -> Option<u64> {
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map_or(name, |(_, target)| target);

        PROTOCOL_BITS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(canonical))
            .map(|(_, bit)| 1u64 << bit)
    }

    /// OR of every known name; unknown names contribute nothing.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mask = names
            .into_iter()
            .filter_map(|n| Self::bit(n.as_ref()))
            .fold(0, |acc, bit| acc | bit);
        ProtocolMask(mask)
    }

    /// Set the bit for `name`, if known.
    pub fn insert(&mut self, name: &str) {
        if let Some(bit) = Self::bit(name) {
            self.0 |= bit;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        Self::bit(name).is_some_and(|bit| self.0 & bit != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Names of the set bits, in bit order.
    pub fn names(&self) -> Vec<&'static str> {
        PROTOCOL_BITS
            .iter()
            .filter(|(_, bit)| self.0 & (1u64 << bit) != 0)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl fmt::Display for ProtocolMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join("|"))
    }
}
