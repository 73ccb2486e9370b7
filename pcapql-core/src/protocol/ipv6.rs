//! IPv6 protocol parser.

use smallvec::SmallVec;

use etherparse::Ipv6HeaderSlice;

use super::ethernet::ethertype;
use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// IPv6 protocol parser (fixed header only).
#[derive(Debug, Clone, Copy)]
pub struct Ipv6Protocol;

impl Protocol for Ipv6Protocol {
    fn name(&self) -> &'static str {
        "ipv6"
    }

    fn display_name(&self) -> &'static str {
        "IPv6"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ip6"]
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et) if et == ethertype::IPV6 as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        match Ipv6HeaderSlice::from_slice(data) {
            Ok(ipv6) => {
                let next_header = ipv6.next_header().0;
                let mut fields = SmallVec::new();

                fields.push(("tclass", FieldValue::UInt8(ipv6.traffic_class())));
                fields.push(("flow", FieldValue::UInt32(ipv6.flow_label().value())));
                fields.push(("plen", FieldValue::UInt16(ipv6.payload_length())));
                fields.push(("nxt", FieldValue::UInt8(next_header)));
                fields.push(("hlim", FieldValue::UInt8(ipv6.hop_limit())));
                fields.push(("src", FieldValue::ipv6(&ipv6.source())));
                fields.push(("dst", FieldValue::ipv6(&ipv6.destination())));

                let mut child_hints = SmallVec::new();
                child_hints.push(("ip_protocol", next_header as u64));
                child_hints.push(("ip_version", 6));
                child_hints.push(("ip_payload_len", ipv6.payload_length() as u64));

                let header_len = ipv6.slice().len();
                ParseResult::success(fields, &data[header_len..], child_hints)
            }
            Err(e) => ParseResult::error(format!("IPv6 parse error: {e}"), data),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["tclass", "flow", "plen", "nxt", "hlim", "src", "dst"]
    }
}
