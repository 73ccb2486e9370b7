//! UDP protocol parser.

use smallvec::SmallVec;

use etherparse::UdpHeaderSlice;

use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// UDP protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct UdpProtocol;

impl Protocol for UdpProtocol {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn display_name(&self) -> &'static str {
        "UDP"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ip_protocol") {
            Some(proto) if proto == IP_PROTO_UDP as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        match UdpHeaderSlice::from_slice(data) {
            Ok(udp) => {
                let mut fields = SmallVec::new();

                fields.push(("sport", FieldValue::UInt16(udp.source_port())));
                fields.push(("dport", FieldValue::UInt16(udp.destination_port())));
                fields.push(("len", FieldValue::UInt16(udp.length())));
                fields.push(("checksum", FieldValue::UInt16(udp.checksum())));

                let mut child_hints = SmallVec::new();
                child_hints.push(("src_port", udp.source_port() as u64));
                child_hints.push(("dst_port", udp.destination_port() as u64));
                child_hints.push(("transport", IP_PROTO_UDP as u64));

                // UDP header is always 8 bytes
                ParseResult::success(fields, &data[8..], child_hints)
            }
            Err(e) => ParseResult::error(format!("UDP parse error: {e}"), data),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["sport", "dport", "len", "checksum"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::UdpBuilder;

    #[test]
    fn test_parse_udp() {
        let data = UdpBuilder::new()
            .src_port(40000)
            .dst_port(53)
            .payload(vec![0u8; 12])
            .build();
        let mut ctx = ParseContext::new(1);
        ctx.insert_hint("ip_protocol", 17);

        assert_eq!(UdpProtocol.can_parse(&ctx), Some(100));
        let result = UdpProtocol.parse(&data, &ctx);

        assert!(result.is_ok());
        assert_eq!(result.get("sport"), Some(&FieldValue::UInt16(40000)));
        assert_eq!(result.get("dport"), Some(&FieldValue::UInt16(53)));
        assert_eq!(result.get("len"), Some(&FieldValue::UInt16(20)));
        assert_eq!(result.hint("dst_port"), Some(53));
        assert_eq!(result.remaining.len(), 12);
    }

    #[test]
    fn test_udp_too_short() {
        let result = UdpProtocol.parse(&[0u8; 4], &ParseContext::new(1));
        assert!(!result.is_ok());
    }
}
