//! Protocol decoding framework.
//!
//! This module provides:
//! - [`Protocol`] trait for implementing parsers
//! - [`ProtocolRegistry`] for managing registered parsers
//! - [`parse_packet`], the layer-by-layer parse loop
//! - [`DecodedPacket`] and the [`PacketView`] contract the query evaluator reads
//!
//! ## Supported Protocols
//!
//! | Layer | Protocols |
//! |-------|-----------|
//! | Link | Ethernet, VLAN (802.1Q) |
//! | Network | IPv4, IPv6, ARP, ICMP |
//! | Transport | TCP, UDP |
//! | Application | DNS (decoded), others by well-known port |

mod context;
mod field;
mod packet;
mod registry;

mod arp;
mod dns;
mod ethernet;
mod icmp;
mod ipv4;
mod ipv6;
pub mod ports;
mod tcp;
mod udp;
mod vlan;

pub use context::{FieldEntry, HintEntry, ParseContext, ParseResult};
pub use field::FieldValue;
pub use packet::{DecodedPacket, FrameMeta, PacketView, FRAME_FIELDS};
pub use registry::{BuiltinProtocol, Protocol, ProtocolRegistry};

pub use arp::ArpProtocol;
pub use dns::DnsProtocol;
pub use ethernet::EthernetProtocol;
pub use icmp::IcmpProtocol;
pub use ipv4::Ipv4Protocol;
pub use ipv6::Ipv6Protocol;
pub use tcp::TcpProtocol;
pub use udp::UdpProtocol;
pub use vlan::VlanProtocol;

pub use ethernet::ethertype;
pub use icmp::{icmp_type, IP_PROTO_ICMP};
pub use tcp::{flags as tcp_flags, IP_PROTO_TCP};
pub use udp::IP_PROTO_UDP;

/// Create a registry with every built-in parser.
pub fn default_registry() -> ProtocolRegistry {
    let mut registry = classification_registry();
    registry.register(DnsProtocol);
    registry
}

/// Registry with link, network and transport parsers only.
///
/// Enough to classify a packet for indexing; application protocols come
/// from the well-known-port table instead of payload decoding.
pub fn classification_registry() -> ProtocolRegistry {
    let mut registry = ProtocolRegistry::new();

    // Layer 2
    registry.register(EthernetProtocol);
    registry.register(VlanProtocol);
    registry.register(ArpProtocol);

    // Layer 3
    registry.register(Ipv4Protocol);
    registry.register(Ipv6Protocol);

    // Layer 4
    registry.register(TcpProtocol);
    registry.register(UdpProtocol);
    registry.register(IcmpProtocol);

    registry
}

/// One decoded layer and where it starts in the frame.
#[derive(Debug, Clone)]
pub struct ParsedLayer<'a> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Byte offset of the layer header within the frame.
    pub offset: usize,
    /// Byte offset just past the layer header.
    pub end: usize,
    pub application: bool,
    pub result: ParseResult<'a>,
}

impl ParsedLayer<'_> {
    /// Case-insensitive match against the layer name or one of its aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Parse a frame through all protocol layers.
///
/// Parsing stops when no parser claims the remaining bytes, when they run
/// out, or after a layer reports an error (that layer is still returned).
pub fn parse_packet<'a>(
    registry: &ProtocolRegistry,
    link_type: u16,
    data: &'a [u8],
) -> Vec<ParsedLayer<'a>> {
    // Typical packet has 3-4 protocol layers (Eth/IP/TCP/App)
    let mut layers = Vec::with_capacity(4);
    let mut context = ParseContext::new(link_type);
    let mut remaining = data;

    while !remaining.is_empty() {
        let Some(parser) = registry.find_parser(&context) else {
            break;
        };

        let result = parser.parse(remaining, &context);
        let consumed = remaining.len() - result.remaining.len();
        let should_stop = result.error.is_some();
        let next = result.remaining;

        context.hints.clear();
        for &(key, value) in &result.child_hints {
            context.insert_hint(key, value);
        }

        layers.push(ParsedLayer {
            name: parser.name(),
            aliases: parser.aliases(),
            offset: context.offset,
            end: context.offset + consumed,
            application: parser.is_application(),
            result,
        });

        if should_stop {
            break;
        }

        context.parent_protocol = Some(parser.name());
        context.offset += consumed;
        remaining = next;
    }

    layers
}
