//! IPv4 protocol parser.

use smallvec::SmallVec;

use etherparse::Ipv4HeaderSlice;

use super::ethernet::ethertype;
use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// IPv4 protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Protocol;

impl Protocol for Ipv4Protocol {
    fn name(&self) -> &'static str {
        "ipv4"
    }

    fn display_name(&self) -> &'static str {
        "IPv4"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ip"]
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(et) if et == ethertype::IPV4 as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        match Ipv4HeaderSlice::from_slice(data) {
            Ok(ipv4) => {
                let header = ipv4.slice();
                let protocol = ipv4.protocol().0;
                let mut fields = SmallVec::new();

                fields.push(("version", FieldValue::UInt8(4)));
                fields.push(("ihl", FieldValue::UInt8(ipv4.ihl())));
                fields.push(("tos", FieldValue::UInt8(header[1])));
                fields.push(("len", FieldValue::UInt16(ipv4.total_len())));
                fields.push(("id", FieldValue::UInt16(ipv4.identification())));
                fields.push(("df", FieldValue::Bool(ipv4.dont_fragment())));
                fields.push(("mf", FieldValue::Bool(ipv4.more_fragments())));
                fields.push(("frag", FieldValue::UInt16(ipv4.fragments_offset().value())));
                fields.push(("ttl", FieldValue::UInt8(ipv4.ttl())));
                fields.push(("proto", FieldValue::UInt8(protocol)));
                fields.push(("checksum", FieldValue::UInt16(ipv4.header_checksum())));
                fields.push(("src", FieldValue::ipv4(&ipv4.source())));
                fields.push(("dst", FieldValue::ipv4(&ipv4.destination())));

                let header_len = header.len();
                let payload_len = (ipv4.total_len() as usize).saturating_sub(header_len);

                let mut child_hints = SmallVec::new();
                child_hints.push(("ip_protocol", protocol as u64));
                child_hints.push(("ip_version", 4));
                child_hints.push(("ip_payload_len", payload_len as u64));

                ParseResult::success(fields, &data[header_len..], child_hints)
            }
            Err(e) => ParseResult::error(format!("IPv4 parse error: {e}"), data),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "version", "ihl", "tos", "len", "id", "df", "mf", "frag", "ttl", "proto", "checksum",
            "src", "dst",
        ]
    }
}
