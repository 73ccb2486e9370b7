//! TCP protocol parser.

use smallvec::SmallVec;

use etherparse::TcpHeaderSlice;

use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

/// TCP flag bits as they appear in `tcp.flags`.
pub mod flags {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;
    pub const ECE: u16 = 0x040;
    pub const CWR: u16 = 0x080;
    pub const NS: u16 = 0x100;
}

/// TCP protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct TcpProtocol;

impl Protocol for TcpProtocol {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn display_name(&self) -> &'static str {
        "TCP"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ip_protocol") {
            Some(proto) if proto == IP_PROTO_TCP as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], context: &ParseContext) -> ParseResult<'a> {
        match TcpHeaderSlice::from_slice(data) {
            Ok(tcp) => {
                let mut tcp_flags: u16 = 0;
                for (set, bit) in [
                    (tcp.fin(), flags::FIN),
                    (tcp.syn(), flags::SYN),
                    (tcp.rst(), flags::RST),
                    (tcp.psh(), flags::PSH),
                    (tcp.ack(), flags::ACK),
                    (tcp.urg(), flags::URG),
                    (tcp.ece(), flags::ECE),
                    (tcp.cwr(), flags::CWR),
                    (tcp.ns(), flags::NS),
                ] {
                    if set {
                        tcp_flags |= bit;
                    }
                }

                let header_len = tcp.slice().len();
                let payload = &data[header_len..];

                // Link-layer padding after the IP datagram is not segment data.
                let segment_len = match context.hint("ip_payload_len") {
                    Some(ip_len) => (ip_len as usize)
                        .saturating_sub(header_len)
                        .min(payload.len()),
                    None => payload.len(),
                };

                let mut fields = SmallVec::new();
                fields.push(("sport", FieldValue::UInt16(tcp.source_port())));
                fields.push(("dport", FieldValue::UInt16(tcp.destination_port())));
                fields.push(("seq", FieldValue::UInt32(tcp.sequence_number())));
                fields.push(("ack", FieldValue::UInt32(tcp.acknowledgment_number())));
                fields.push(("off", FieldValue::UInt8(tcp.data_offset())));
                fields.push(("flags", FieldValue::UInt16(tcp_flags)));
                fields.push(("syn", FieldValue::Bool(tcp.syn())));
                fields.push(("fin", FieldValue::Bool(tcp.fin())));
                fields.push(("rst", FieldValue::Bool(tcp.rst())));
                fields.push(("psh", FieldValue::Bool(tcp.psh())));
                fields.push(("urg", FieldValue::Bool(tcp.urg())));
                fields.push(("win", FieldValue::UInt16(tcp.window_size())));
                fields.push(("checksum", FieldValue::UInt16(tcp.checksum())));
                fields.push(("urp", FieldValue::UInt16(tcp.urgent_pointer())));
                fields.push(("len", FieldValue::UInt32(segment_len as u32)));

                let mut child_hints = SmallVec::new();
                child_hints.push(("src_port", tcp.source_port() as u64));
                child_hints.push(("dst_port", tcp.destination_port() as u64));
                child_hints.push(("transport", IP_PROTO_TCP as u64));

                ParseResult::success(fields, payload, child_hints)
            }
            Err(e) => ParseResult::error(format!("TCP parse error: {e}"), data),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "sport", "dport", "seq", "ack", "off", "flags", "syn", "fin", "rst", "psh", "urg",
            "win", "checksum", "urp", "len",
        ]
    }
}
