//! IEEE 802.1Q VLAN tag parser.

use smallvec::SmallVec;

use super::ethernet::ethertype;
use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// 802.1Q VLAN tag parser.
#[derive(Debug, Clone, Copy)]
pub struct VlanProtocol;

impl Protocol for VlanProtocol {
    fn name(&self) -> &'static str {
        "vlan"
    }

    fn display_name(&self) -> &'static str {
        "802.1Q VLAN"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match context.hint("ethertype") {
            Some(etype) if etype == ethertype::VLAN as u64 => Some(100),
            Some(etype) if etype == ethertype::QINQ as u64 => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        // The TPID was consumed as the outer EtherType; what remains is the
        // TCI followed by the inner EtherType.
        if data.len() < 4 {
            return ParseResult::error("VLAN tag too short".to_string(), data);
        }

        let tci = u16::from_be_bytes([data[0], data[1]]);
        let inner_ethertype = u16::from_be_bytes([data[2], data[3]]);

        let mut fields = SmallVec::new();
        fields.push(("id", FieldValue::UInt16(tci & 0x0FFF)));
        fields.push(("priority", FieldValue::UInt8((tci >> 13) as u8 & 0x07)));
        fields.push(("dei", FieldValue::Bool((tci >> 12) & 0x01 != 0)));
        fields.push(("type", FieldValue::UInt16(inner_ethertype)));

        let mut child_hints = SmallVec::new();
        child_hints.push(("ethertype", inner_ethertype as u64));

        ParseResult::success(fields, &data[4..], child_hints)
    }

    fn fields(&self) -> &'static [&'static str] {
        &["id", "priority", "dei", "type"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vlan_tag() {
        // PCP 5, DEI 0, VID 100, inner IPv4
        let data = [0xa0, 0x64, 0x08, 0x00, 0x45];
        let mut ctx = ParseContext::new(1);
        ctx.insert_hint("ethertype", 0x8100);

        assert_eq!(VlanProtocol.can_parse(&ctx), Some(100));
        let result = VlanProtocol.parse(&data, &ctx);

        assert!(result.is_ok());
        assert_eq!(result.get("id"), Some(&FieldValue::UInt16(100)));
        assert_eq!(result.get("priority"), Some(&FieldValue::UInt8(5)));
        assert_eq!(result.get("dei"), Some(&FieldValue::Bool(false)));
        assert_eq!(result.hint("ethertype"), Some(0x0800));
        assert_eq!(result.remaining, &[0x45]);
    }

    #[test]
    fn test_vlan_too_short() {
        let result = VlanProtocol.parse(&[0x00, 0x01], &ParseContext::new(1));
        assert!(!result.is_ok());
    }
}
