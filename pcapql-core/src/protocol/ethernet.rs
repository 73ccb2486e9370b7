//! Ethernet II protocol parser.

use smallvec::SmallVec;

use etherparse::Ethernet2HeaderSlice;

use super::{FieldValue, ParseContext, ParseResult, Protocol};
use crate::pcap::LINKTYPE_ETHERNET;

/// EtherType values the decoders dispatch on.
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const QINQ: u16 = 0x88A8;
}

/// Ethernet II protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct EthernetProtocol;

impl Protocol for EthernetProtocol {
    fn name(&self) -> &'static str {
        "ethernet"
    }

    fn display_name(&self) -> &'static str {
        "Ethernet II"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["eth"]
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        if context.is_root() && context.link_type == LINKTYPE_ETHERNET {
            Some(100)
        } else {
            None
        }
    }

    fn parse<'a>(&self, data: &'a [u8], _context: &ParseContext) -> ParseResult<'a> {
        match Ethernet2HeaderSlice::from_slice(data) {
            Ok(eth) => {
                let mut fields = SmallVec::new();

                fields.push(("src", FieldValue::mac(&eth.source())));
                fields.push(("dst", FieldValue::mac(&eth.destination())));
                fields.push(("type", FieldValue::UInt16(eth.ether_type().0)));

                let mut child_hints = SmallVec::new();
                child_hints.push(("ethertype", eth.ether_type().0 as u64));

                let header_len = eth.slice().len();
                ParseResult::success(fields, &data[header_len..], child_hints)
            }
            Err(e) => ParseResult::error(format!("Ethernet parse error: {e}"), data),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        &["src", "dst", "type"]
    }
}
