//! Protocol constant names recognized by the lexer.

use pcapql_core::protocol::ports::is_application_protocol;

/// Link, network and transport protocols, plus their short aliases.
const BASE_PROTOCOLS: &[&str] = &[
    "ethernet",
    "eth",
    "arp",
    "vlan",
    "ipv4",
    "ip",
    "ipv6",
    "ip6",
    "icmp",
    "icmp_unreachable",
    "udp",
    "tcp",
];

/// True if `word` names a protocol (case-insensitive).
///
/// Application protocols come from the well-known-port table so the
/// lexer, the index bit table and `has_layer` agree on the same names.
pub fn is_protocol_constant(word: &str) -> bool {
    BASE_PROTOCOLS.iter().any(|p| p.eq_ignore_ascii_case(word)) || is_application_protocol(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_constants() {
        for name in ["tcp", "TCP", "Ethernet", "ip", "dns", "HTTPS", "sip_tls", "icmp_unreachable"] {
            assert!(is_protocol_constant(name), "{name}");
        }
        for name in ["frame", "payload", "src", "tcpx"] {
            assert!(!is_protocol_constant(name), "{name}");
        }
    }
}
