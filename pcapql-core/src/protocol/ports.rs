//! Well-known port classification.
//!
//! Application protocols are recognized from either transport port alone; no
//! payload inspection is done. The index builder and [`DecodedPacket`] share
//! this table so index bits and `has_layer` agree.
//!
//! [`DecodedPacket`]: super::DecodedPacket

use smallvec::SmallVec;

use super::tcp::IP_PROTO_TCP;
use super::udp::IP_PROTO_UDP;

/// Transport restriction of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Any,
}

impl Transport {
    fn accepts(self, ip_protocol: u8) -> bool {
        match self {
            Transport::Tcp => ip_protocol == IP_PROTO_TCP,
            Transport::Udp => ip_protocol == IP_PROTO_UDP,
            Transport::Any => ip_protocol == IP_PROTO_TCP || ip_protocol == IP_PROTO_UDP,
        }
    }
}

/// (application name, ports, transport)
pub const WELL_KNOWN_PORTS: &[(&str, &[u16], Transport)] = &[
    ("dns", &[53], Transport::Any),
    ("dhcp", &[67, 68], Transport::Udp),
    ("https", &[443], Transport::Tcp),
    ("ssh", &[22], Transport::Any),
    ("rdp", &[3389], Transport::Any),
    ("telnet", &[23], Transport::Any),
    ("smtp", &[25, 587], Transport::Any),
    ("imap", &[143], Transport::Any),
    ("imaps", &[993], Transport::Any),
    ("pop3", &[110], Transport::Any),
    ("pop3s", &[995], Transport::Any),
    ("snmp", &[161, 162], Transport::Udp),
    ("ftp", &[20, 21], Transport::Tcp),
    ("http", &[80, 8080], Transport::Tcp),
    ("ntp", &[123], Transport::Udp),
    ("rtp", &[5004], Transport::Udp),
    ("rtcp", &[5005], Transport::Udp),
    ("sip", &[5060], Transport::Any),
    ("sip_tls", &[5061], Transport::Tcp),
    ("bgp", &[179], Transport::Tcp),
    ("smb", &[445], Transport::Tcp),
];

/// Application protocols matched by either port.
pub fn classify_ports(ip_protocol: u8, src_port: u16, dst_port: u16) -> SmallVec<[&'static str; 2]> {
    WELL_KNOWN_PORTS
        .iter()
        .filter(|(_, ports, transport)| {
            transport.accepts(ip_protocol)
                && (ports.contains(&src_port) || ports.contains(&dst_port))
        })
        .map(|(name, _, _)| *name)
        .collect()
}

/// True if `name` is an application protocol from the table.
pub fn is_application_protocol(name: &str) -> bool {
    WELL_KNOWN_PORTS
        .iter()
        .any(|(app, _, _)| app.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_tcp_only() {
        assert_eq!(classify_ports(6, 51000, 443).as_slice(), &["https"]);
        assert!(classify_ports(17, 51000, 443).is_empty());
    }

    #[test]
    fn test_either_port_matches() {
        assert_eq!(classify_ports(17, 53, 40000).as_slice(), &["dns"]);
        assert_eq!(classify_ports(6, 40000, 53).as_slice(), &["dns"]);
    }

    #[test]
    fn test_two_applications() {
        // Client port happens to be a well-known port too.
        let apps = classify_ports(6, 22, 80);
        assert_eq!(apps.as_slice(), &["ssh", "http"]);
    }

    #[test]
    fn test_not_tcp_or_udp() {
        assert!(classify_ports(1, 53, 53).is_empty());
        assert!(is_application_protocol("SIP_TLS"));
        assert!(!is_application_protocol("gopher"));
    }
}
