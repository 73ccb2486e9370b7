//! DNS protocol parser (header and first question).

use compact_str::CompactString;
use smallvec::SmallVec;

use super::tcp::IP_PROTO_TCP;
use super::{FieldValue, ParseContext, ParseResult, Protocol};

/// Well-known DNS port.
pub const DNS_PORT: u64 = 53;

const HEADER_LEN: usize = 12;
const MAX_LABELS: usize = 128;

/// DNS protocol parser.
#[derive(Debug, Clone, Copy)]
pub struct DnsProtocol;

impl Protocol for DnsProtocol {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn display_name(&self) -> &'static str {
        "DNS"
    }

    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        match (context.hint("src_port"), context.hint("dst_port")) {
            (Some(DNS_PORT), _) | (_, Some(DNS_PORT)) => Some(100),
            _ => None,
        }
    }

    fn parse<'a>(&self, data: &'a [u8], context: &ParseContext) -> ParseResult<'a> {
        // DNS over TCP carries a two-byte length prefix.
        let message = if context.hint("transport") == Some(IP_PROTO_TCP as u64) {
            if data.len() < 2 {
                return ParseResult::error("DNS length prefix missing".to_string(), data);
            }
            &data[2..]
        } else {
            data
        };

        if message.len() < HEADER_LEN {
            return ParseResult::error("DNS header too short".to_string(), data);
        }

        let flags = u16::from_be_bytes([message[2], message[3]]);
        let qdcount = u16::from_be_bytes([message[4], message[5]]);

        let mut fields = SmallVec::new();
        fields.push(("id", FieldValue::UInt16(u16::from_be_bytes([message[0], message[1]]))));
        fields.push(("qr", FieldValue::Bool(flags & 0x8000 != 0)));
        fields.push(("opcode", FieldValue::UInt8(((flags >> 11) & 0x0F) as u8)));
        fields.push(("rcode", FieldValue::UInt8((flags & 0x0F) as u8)));
        fields.push(("qdcount", FieldValue::UInt16(qdcount)));
        fields.push((
            "ancount",
            FieldValue::UInt16(u16::from_be_bytes([message[6], message[7]])),
        ));

        if qdcount > 0 {
            let question = &message[HEADER_LEN..];
            match parse_domain_name(question) {
                Ok((name, consumed)) => {
                    fields.push(("qname", FieldValue::OwnedString(name)));
                    if question.len() >= consumed + 2 {
                        let qtype = u16::from_be_bytes([question[consumed], question[consumed + 1]]);
                        fields.push(("qtype", FieldValue::UInt16(qtype)));
                    }
                }
                Err(e) => return ParseResult::partial(fields, &[], e),
            }
        }

        ParseResult::success(fields, &[], SmallVec::new())
    }

    fn fields(&self) -> &'static [&'static str] {
        &["id", "qr", "opcode", "rcode", "qdcount", "ancount", "qname", "qtype"]
    }

    fn is_application(&self) -> bool {
        true
    }
}

/// Parse an uncompressed domain name, returning it and the bytes consumed.
fn parse_domain_name(data: &[u8]) -> Result<(CompactString, usize), String> {
    let mut name = CompactString::default();
    let mut pos = 0;
    let mut labels = 0;

    loop {
        let Some(&len) = data.get(pos) else {
            return Err("Unexpected end of data while parsing domain name".to_string());
        };
        let len = len as usize;

        if len == 0 {
            pos += 1;
            break;
        }

        // Compression pointer: the question name ends here.
        if len & 0xC0 == 0xC0 {
            pos += 2;
            break;
        }

        if len > 63 {
            return Err(format!("Invalid label length: {len}"));
        }
        if pos + 1 + len > data.len() {
            return Err("Label extends beyond data".to_string());
        }

        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(&data[pos + 1..pos + 1 + len]));
        pos += 1 + len;

        labels += 1;
        if labels > MAX_LABELS {
            return Err("Too many labels in domain name".to_string());
        }
    }

    Ok((name, pos))
}
