//! Per-packet classification for the index.

use pcapql_core::pcap::SegmentPacket;
use pcapql_core::protocol::ports::classify_ports;
use pcapql_core::protocol::{icmp_type, parse_packet, IP_PROTO_TCP, IP_PROTO_UDP};
use pcapql_core::ProtocolRegistry;

use super::bitmask::ProtocolMask;
use super::record::ProtocolIndexRecord;

/// Build the index record for one packet.
///
/// `registry` only needs link, network and transport parsers (see
/// [`classification_registry`]); application bits come from the
/// well-known-port table. A layer that failed to parse still sets its bit
/// so the mask stays a superset of what a full decode reports.
///
/// [`classification_registry`]: pcapql_core::protocol::classification_registry
pub fn classify(
    registry: &ProtocolRegistry,
    link_type: u16,
    packet: &SegmentPacket<'_>,
) -> ProtocolIndexRecord {
    let layers = parse_packet(registry, link_type, packet.data);

    let mut mask = ProtocolMask::EMPTY;
    let mut record = ProtocolIndexRecord {
        timestamp: packet.timestamp_us(),
        byte_offset: packet.offset,
        ..Default::default()
    };
    let mut transport = None;

    for layer in &layers {
        let port = |name: &str| {
            layer
                .result
                .get(name)
                .and_then(|v| v.as_u64())
                .map_or(0, |p| p as u16)
        };

        match layer.name {
            "ethernet" => mask.insert("ETHERNET"),
            "vlan" => mask.insert("VLAN"),
            "arp" => mask.insert("ARP"),
            "ipv4" => {
                mask.insert("IPV4");
                let addr = |name: &str| {
                    layer
                        .result
                        .get(name)
                        .and_then(|v| v.as_ipv4_u32())
                        .unwrap_or(0)
                };
                record.ip_src = addr("src");
                record.ip_dst = addr("dst");
            }
            "ipv6" => mask.insert("IPV6"),
            "icmp" => {
                mask.insert("ICMP");
                let kind = layer.result.get("type").and_then(|v| v.as_u64());
                if kind == Some(icmp_type::DESTINATION_UNREACHABLE as u64) {
                    mask.insert("ICMP_UNREACHABLE");
                }
            }
            "tcp" | "udp" => {
                let (name, proto) = if layer.name == "tcp" {
                    ("TCP", IP_PROTO_TCP)
                } else {
                    ("UDP", IP_PROTO_UDP)
                };
                mask.insert(name);
                record.src_port = port("sport");
                record.dest_port = port("dport");
                transport = Some(proto);
            }
            _ => {}
        }

        if layer.result.is_ok() {
            record.header_len = u16::try_from(layer.end).unwrap_or(u16::MAX);
        }
    }

    if let Some(proto) = transport {
        for app in classify_ports(proto, record.src_port, record.dest_port) {
            mask.insert(app);
        }
    }

    record.bitmask = mask.0;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcapql_core::pcap::SegmentFile;
    use pcapql_core::protocol::classification_registry;
    use pcapql_core::testing::{
        build_dns_packet, build_icmp_unreachable, build_tcp_packet, ArpBuilder, EthernetBuilder,
        Ipv6Builder, SegmentBuilder, UdpBuilder,
    };

    fn classify_frame(frame: Vec<u8>) -> ProtocolIndexRecord {
        let bytes = SegmentBuilder::new().packet(1_700_000_000, 250, frame).build();
        let segment = SegmentFile::from_bytes(bytes).unwrap();
        let packet = segment.packets().next().unwrap().unwrap();
        classify(&classification_registry(), segment.link_type(), &packet)
    }

    fn mask_of(names: &[&str]) -> u64 {
        ProtocolMask::from_names(names.iter().copied()).0
    }

    #[test]
    fn test_https_packet_bits() {
        let record = classify_frame(build_tcp_packet(
            [10, 0, 0, 1],
            [10, 0, 0, 2],
            51000,
            443,
            b"payload",
        ));
        assert_eq!(record.bitmask, mask_of(&["ETHERNET", "IPV4", "TCP", "HTTPS"]));
        assert_eq!(record.ip_src, 0x0A00_0001);
        assert_eq!(record.ip_dst, 0x0A00_0002);
        assert_eq!((record.src_port, record.dest_port), (51000, 443));
        assert_eq!(record.header_len, 54);
        assert_eq!(record.byte_offset, 24);
        assert_eq!(record.timestamp, 1_700_000_000_000_250);
    }

    #[test]
    fn test_dns_packet_bits() {
        let record = classify_frame(build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 40000, "a.example"));
        assert_eq!(record.bitmask, mask_of(&["ETHERNET", "IPV4", "UDP", "DNS"]));
        assert_eq!(record.header_len, 42);
    }

    #[test]
    fn test_icmp_unreachable() {
        let record = classify_frame(build_icmp_unreachable([10, 0, 0, 1], [10, 0, 0, 9], 3));
        assert_eq!(
            record.bitmask,
            mask_of(&["ETHERNET", "IPV4", "ICMP", "ICMP_UNREACHABLE"])
        );
        assert_eq!((record.src_port, record.dest_port), (0, 0));
    }

    #[test]
    fn test_arp_and_vlan() {
        let frame = EthernetBuilder::new()
            .vlan(100)
            .arp()
            .payload(ArpBuilder::request([10, 0, 0, 1], [10, 0, 0, 2]).build())
            .build();
        let record = classify_frame(frame);
        assert_eq!(record.bitmask, mask_of(&["ETHERNET", "VLAN", "ARP"]));
        assert_eq!(record.ip_src, 0);
    }

    #[test]
    fn test_ipv6_has_no_ipv4_addresses() {
        let udp = UdpBuilder::new().src_port(5000).dst_port(123).build();
        let ip = Ipv6Builder::new().next_header(17).payload(udp).build();
        let frame = EthernetBuilder::new().ipv6().payload(ip).build();

        let record = classify_frame(frame);
        assert_eq!(record.bitmask, mask_of(&["ETHERNET", "IPV6", "UDP", "NTP"]));
        assert_eq!((record.ip_src, record.ip_dst), (0, 0));
    }
}
