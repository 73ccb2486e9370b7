//! Decoded packets and the read-only view the query evaluator uses.

use compact_str::CompactString;
use smallvec::SmallVec;

use super::icmp::icmp_type;
use super::ports::classify_ports;
use super::{parse_packet, FieldValue, ParsedLayer, ProtocolRegistry};
use crate::pcap::SegmentPacket;

/// Pseudo-fields of the `frame` layer, available for every packet.
pub const FRAME_FIELDS: &[&str] = &["ts", "ts_us", "len", "caplen", "segment", "offset", "protocols"];

/// Tag set on ICMP destination-unreachable messages.
const ICMP_UNREACHABLE: &str = "icmp_unreachable";

/// Read-only access to a decoded packet.
///
/// Names are dotted paths (`layer.field`); layer names are matched
/// case-insensitively and accept aliases (`ip`, `eth`, `ip6`).
pub trait PacketView {
    /// True if the packet contains the layer, or was classified as the
    /// application protocol, named `name`.
    fn has_layer(&self, name: &str) -> bool;

    /// Look up a field by dotted name.
    fn get_field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// `length` raw bytes starting `offset` bytes into the layer `base`.
    fn get_byte_field(&self, base: &str, offset: usize, length: usize) -> Option<&[u8]>;

    /// Every field of the packet, frame fields first.
    fn export(&self) -> Vec<(String, FieldValue<'_>)>;
}

/// Capture metadata that is not part of the frame bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameMeta {
    pub segment: u32,
    /// Offset of the packet header within its segment.
    pub offset: u64,
    pub timestamp_us: u64,
    pub caplen: u32,
    pub origlen: u32,
}

impl FrameMeta {
    pub fn from_packet(packet: &SegmentPacket<'_>, segment: u32) -> Self {
        Self {
            segment,
            offset: packet.offset,
            timestamp_us: packet.timestamp_us(),
            caplen: packet.caplen,
            origlen: packet.origlen,
        }
    }
}

/// A frame decoded through every recognized layer.
#[derive(Debug, Clone)]
pub struct DecodedPacket<'a> {
    frame: &'a [u8],
    meta: FrameMeta,
    layers: Vec<ParsedLayer<'a>>,
    tags: SmallVec<[&'static str; 2]>,
    payload_offset: usize,
}

impl<'a> DecodedPacket<'a> {
    /// Decode a packet read from segment `segment`.
    pub fn decode(
        registry: &ProtocolRegistry,
        link_type: u16,
        packet: &SegmentPacket<'a>,
        segment: u32,
    ) -> Self {
        Self::from_frame(
            registry,
            link_type,
            packet.data,
            FrameMeta::from_packet(packet, segment),
        )
    }

    /// Decode raw frame bytes with the given metadata.
    pub fn from_frame(
        registry: &ProtocolRegistry,
        link_type: u16,
        frame: &'a [u8],
        meta: FrameMeta,
    ) -> Self {
        let layers = parse_packet(registry, link_type, frame);

        let payload_offset = layers
            .iter()
            .filter(|l| !l.application)
            .map(|l| l.end)
            .last()
            .unwrap_or(0);

        let mut tags = SmallVec::new();
        if let Some((proto, sport, dport)) = transport_ports(&layers) {
            for app in classify_ports(proto, sport, dport) {
                tags.push(app);
            }
        }
        if let Some(icmp) = layers.iter().find(|l| l.name == "icmp") {
            if icmp.result.get("type").and_then(|v| v.as_u64())
                == Some(icmp_type::DESTINATION_UNREACHABLE as u64)
            {
                tags.push(ICMP_UNREACHABLE);
            }
        }

        Self {
            frame,
            meta,
            layers,
            tags,
            payload_offset,
        }
    }

    pub fn meta(&self) -> &FrameMeta {
        &self.meta
    }

    pub fn frame(&self) -> &'a [u8] {
        self.frame
    }

    pub fn layers(&self) -> &[ParsedLayer<'a>] {
        &self.layers
    }

    /// Offset of the transport payload (end of the last non-application header).
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// Layer names then application tags, without repeats.
    pub fn protocol_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::with_capacity(self.layers.len() + self.tags.len());
        for name in self.layers.iter().map(|l| l.name).chain(self.tags.iter().copied()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn layer(&self, name: &str) -> Option<&ParsedLayer<'a>> {
        self.layers.iter().find(|l| l.matches(name))
    }

    fn frame_field(&self, field: &str) -> Option<FieldValue<'_>> {
        let meta = &self.meta;
        let value = match field {
            "ts" => FieldValue::UInt64(meta.timestamp_us / 1_000_000),
            "ts_us" => FieldValue::UInt64(meta.timestamp_us),
            "len" => FieldValue::UInt32(meta.origlen),
            "caplen" => FieldValue::UInt32(meta.caplen),
            "segment" => FieldValue::UInt32(meta.segment),
            "offset" => FieldValue::UInt64(meta.offset),
            "protocols" => {
                FieldValue::OwnedString(CompactString::new(self.protocol_names().join(":")))
            }
            _ => return None,
        };
        Some(value)
    }
}

/// (ip protocol, source port, destination port) of the transport layer.
fn transport_ports(layers: &[ParsedLayer<'_>]) -> Option<(u8, u16, u16)> {
    let transport = layers.iter().find(|l| l.name == "tcp" || l.name == "udp")?;
    let proto = if transport.name == "tcp" {
        super::IP_PROTO_TCP
    } else {
        super::IP_PROTO_UDP
    };
    let sport = transport.result.get("sport")?.as_u64()? as u16;
    let dport = transport.result.get("dport")?.as_u64()? as u16;
    Some((proto, sport, dport))
}

impl PacketView for DecodedPacket<'_> {
    fn has_layer(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("frame")
            || self.layer(name).is_some()
            || self.tags.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    fn get_field(&self, name: &str) -> Option<FieldValue<'_>> {
        let (layer, field) = name.split_once('.')?;
        if layer.eq_ignore_ascii_case("frame") {
            return self.frame_field(field);
        }
        self.layer(layer)?.result.get(field).cloned()
    }

    fn get_byte_field(&self, base: &str, offset: usize, length: usize) -> Option<&[u8]> {
        let start = if base.eq_ignore_ascii_case("frame") {
            0
        } else if base.eq_ignore_ascii_case("payload") {
            self.payload_offset
        } else {
            self.layer(base)?.offset
        };

        let begin = start.checked_add(offset)?;
        let end = begin.checked_add(length)?;
        self.frame.get(begin..end)
    }

    fn export(&self) -> Vec<(String, FieldValue<'_>)> {
        let mut out = Vec::new();
        for field in FRAME_FIELDS {
            if let Some(value) = self.frame_field(field) {
                out.push((format!("frame.{field}"), value));
            }
        }
        for layer in &self.layers {
            for (field, value) in &layer.result.fields {
                out.push((format!("{}.{field}", layer.name), value.clone()));
            }
        }
        out
    }
}
