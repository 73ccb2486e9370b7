//! ARP protocol parser.

use smallvec::SmallVec;

use super::ethernet::ethertype;
use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// Length of an Ethernet/IPv4 ARP body.
const ARP_LEN: usize = 28;

/// ARP protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct ArpProtocol;

impl Protocol for ArpProtocol {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn display_name(&self) -> &'static str {
        "ARP"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et) if et == ethertype::ARP as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        if data.len() < ARP_LEN {
            return ParseResult::error(format!("ARP packet too short: {} bytes", data.len()), data);
        }

        let hardware_type = u16::from_be_bytes([data[0], data[1]]);
        let protocol_type = u16::from_be_bytes([data[2], data[3]]);
        let operation = u16::from_be_bytes([data[6], data[7]]);

        let mut fields = SmallVec::new();
        fields.push(("op", FieldValue::UInt16(operation)));

        if hardware_type == 1 && protocol_type == ethertype::IPV4 && data[4] == 6 && data[5] == 4 {
            fields.push(("sha", FieldValue::mac(&data[8..14])));
            fields.push(("spa", FieldValue::ipv4(&data[14..18])));
            fields.push(("tha", FieldValue::mac(&data[18..24])));
            fields.push(("tpa", FieldValue::ipv4(&data[24..28])));
        }

        ParseResult::success(fields, &data[ARP_LEN..], SmallVec::new())
    }

    fn fields(&self) -> &'static [&'static str] {
        &["op", "sha", "spa", "tha", "tpa"]
    }
}
