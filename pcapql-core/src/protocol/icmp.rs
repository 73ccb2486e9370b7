//! ICMP (v4) protocol parser.

use smallvec::SmallVec;

use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// IP protocol number for ICMP.
pub const IP_PROTO_ICMP: u8 = 1;

/// ICMP message types.
pub mod icmp_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const DESTINATION_UNREACHABLE: u8 = 3;
    pub const ECHO_REQUEST: u8 = 8;
}

/// ICMP protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct IcmpProtocol;

impl Protocol for IcmpProtocol {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn display_name(&self) -> &'static str {
        "ICMP"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match (context.hint("ip_protocol"), context.hint("ip_version")) {
            (Some(proto), Some(4)) if proto == IP_PROTO_ICMP as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        if data.len() < 8 {
            return ParseResult::error(
                format!("ICMP header too short: {} bytes", data.len()),
                data,
            );
        }

        let kind = data[0];
        let mut fields = SmallVec::new();
        fields.push(("type", FieldValue::UInt8(kind)));
        fields.push(("code", FieldValue::UInt8(data[1])));
        fields.push(("checksum", FieldValue::UInt16(u16::from_be_bytes([data[2], data[3]]))));

        if matches!(kind, icmp_type::ECHO_REQUEST | icmp_type::ECHO_REPLY) {
            fields.push(("id", FieldValue::UInt16(u16::from_be_bytes([data[4], data[5]]))));
            fields.push(("seq", FieldValue::UInt16(u16::from_be_bytes([data[6], data[7]]))));
        }

        ParseResult::success(fields, &data[8..], SmallVec::new())
    }

    fn fields(&self) -> &'static [&'static str] {
        &["type", "code", "checksum", "id", "seq"]
    }
}
