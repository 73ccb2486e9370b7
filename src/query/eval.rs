//! Expression evaluator.
//!
//! Walks a filter AST against one decoded packet. Unknown fields evaluate
//! to [`Value::Null`], and any comparison involving Null is false, so a
//! filter that names a missing field simply does not match.

use std::cmp::Ordering;

use pcapql_core::PacketView;

use super::ast::{BinaryOp, Node, UnaryOp};
use super::value::Value;

/// Evaluate `node` against `packet`. `now` is epoch seconds.
pub fn evaluate<P: PacketView + ?Sized>(node: &Node, packet: &P, now: i64) -> Value {
    match node {
        Node::Integer(i) => Value::Int(*i),
        Node::Float(f) => Value::Float(*f),
        Node::Boolean(b) => Value::Bool(*b),
        Node::String(s) => Value::Str(s.clone()),
        Node::Date(secs) => Value::Int(*secs),
        Node::Now { offset, unit } => unit
            .shift_back(now, *offset)
            .map_or(Value::Null, Value::Int),
        Node::Ipv4(literal) => Value::Int(literal.address as i64),
        Node::Mac(mac) => Value::Int(*mac as i64),
        Node::Bytes(bytes) => Value::Bytes(bytes.clone()),
        Node::Field(name) => packet.get_field(name).map_or(Value::Null, Value::from),
        Node::FieldBytes {
            base,
            offset,
            length,
        } => packet
            .get_byte_field(base, *offset, *length)
            .map_or(Value::Null, |b| Value::Bytes(b.to_vec())),
        Node::Protocol(name) => Value::Bool(packet.has_layer(name)),
        Node::Grouping(inner) => evaluate(inner, packet, now),
        Node::Unary { op, operand } => unary(*op, evaluate(operand, packet, now)),
        Node::Binary { op, left, right } => binary(*op, left, right, packet, now),
        Node::Wildcard => Value::Any,
        Node::Sequence(members) => members
            .iter()
            .map(|m| evaluate(m, packet, now))
            .last()
            .unwrap_or(Value::Null),
    }
}

/// True if `filter` evaluates truthy for `packet`.
pub fn matches<P: PacketView + ?Sized>(filter: &Node, packet: &P, now: i64) -> bool {
    evaluate(filter, packet, now).is_truthy()
}

fn unary(op: UnaryOp, value: Value) -> Value {
    match op {
        UnaryOp::Plus => value,
        UnaryOp::Not => match value {
            Value::Null => Value::Null,
            other => Value::Bool(!other.is_truthy()),
        },
        UnaryOp::Neg => match value {
            Value::Int(i) => i.checked_neg().map_or(Value::Null, Value::Int),
            Value::Float(f) => Value::Float(-f),
            other => other.as_i64().map_or(Value::Null, |i| Value::Int(-i)),
        },
    }
}

fn binary<P: PacketView + ?Sized>(
    op: BinaryOp,
    left: &Node,
    right: &Node,
    packet: &P,
    now: i64,
) -> Value {
    match op {
        BinaryOp::And => {
            let result = evaluate(left, packet, now).is_truthy()
                && evaluate(right, packet, now).is_truthy();
            Value::Bool(result)
        }
        BinaryOp::Or => {
            let result = evaluate(left, packet, now).is_truthy()
                || evaluate(right, packet, now).is_truthy();
            Value::Bool(result)
        }
        BinaryOp::Eq => Value::Bool(equals(left, right, packet, now).unwrap_or(false)),
        BinaryOp::NotEq => Value::Bool(equals(left, right, packet, now).is_some_and(|eq| !eq)),
        BinaryOp::In | BinaryOp::Between => {
            Value::Bool(contains(left, right, packet, now).unwrap_or(false))
        }
        BinaryOp::To => Value::Range(
            Box::new(evaluate(left, packet, now)),
            Box::new(evaluate(right, packet, now)),
        ),
        _ => {
            let lhs = evaluate(left, packet, now);
            let rhs = evaluate(right, packet, now);
            match op {
                BinaryOp::Lt => compare(&lhs, &rhs, |o| o == Ordering::Less),
                BinaryOp::LtEq => compare(&lhs, &rhs, |o| o != Ordering::Greater),
                BinaryOp::Gt => compare(&lhs, &rhs, |o| o == Ordering::Greater),
                BinaryOp::GtEq => compare(&lhs, &rhs, |o| o != Ordering::Less),
                _ => arithmetic(op, &lhs, &rhs),
            }
        }
    }
}

fn compare(lhs: &Value, rhs: &Value, test: fn(Ordering) -> bool) -> Value {
    Value::Bool(lhs.partial_compare(rhs).is_some_and(test))
}

/// `==` dispatch on the kind of the right-hand node. `None` means a Null
/// operand was involved.
fn equals<P: PacketView + ?Sized>(
    left: &Node,
    right: &Node,
    packet: &P,
    now: i64,
) -> Option<bool> {
    match right.ungrouped() {
        Node::Protocol(name) => Some(packet.has_layer(name)),
        Node::Wildcard => Some(true),
        Node::Ipv4(literal) => {
            let address = evaluate(left, packet, now).as_i64()?;
            Some(u32::try_from(address).is_ok_and(|a| literal.contains(a)))
        }
        Node::Mac(mac) => {
            let value = evaluate(left, packet, now).as_i64()?;
            Some(value == *mac as i64)
        }
        Node::Bytes(bytes) => {
            let lhs = evaluate(left, packet, now);
            match lhs {
                Value::Bytes(b) => Some(&b == bytes),
                other => other.loose_eq(&Value::Bytes(bytes.clone())),
            }
        }
        _ => {
            let lhs = evaluate(left, packet, now);
            let rhs = evaluate(right, packet, now);
            lhs.loose_eq(&rhs)
        }
    }
}

/// `in` / `between`: network membership, range bounds, list membership,
/// or plain equality.
fn contains<P: PacketView + ?Sized>(
    left: &Node,
    right: &Node,
    packet: &P,
    now: i64,
) -> Option<bool> {
    match right.ungrouped() {
        Node::Ipv4(literal) => {
            let address = evaluate(left, packet, now).as_i64()?;
            Some(u32::try_from(address).is_ok_and(|a| literal.contains(a)))
        }
        Node::Sequence(members) => {
            let lhs = evaluate(left, packet, now);
            if lhs.is_null() {
                return None;
            }
            Some(members.iter().any(|m| match m {
                Node::Ipv4(literal) => lhs
                    .as_i64()
                    .and_then(|a| u32::try_from(a).ok())
                    .is_some_and(|a| literal.contains(a)),
                other => lhs.loose_eq(&evaluate(other, packet, now)) == Some(true),
            }))
        }
        _ => {
            let lhs = evaluate(left, packet, now);
            match evaluate(right, packet, now) {
                Value::Range(lo, hi) => lhs.within(&lo, &hi),
                rhs => lhs.loose_eq(&rhs),
            }
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    if lhs.is_null() || rhs.is_null() {
        return Value::Null;
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
            if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
                let result = match op {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                if let Some(result) = result {
                    return Value::Int(result);
                }
            }
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Value::Null;
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            };
            Value::Float(result)
        }
        _ => {
            let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) else {
                return Value::Null;
            };
            let result = match op {
                BinaryOp::BitAnd => Some(a & b),
                BinaryOp::BitOr => Some(a | b),
                BinaryOp::BitXor => Some(a ^ b),
                BinaryOp::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)),
                BinaryOp::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
                _ => None,
            };
            result.map_or(Value::Null, Value::Int)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::TimeUnit;
    use crate::query::parser::parse_with;
    use crate::query::CompileContext;
    use chrono::{TimeZone, Utc};
    use pcapql_core::testing::{build_dns_packet, build_tcp_packet, EthernetBuilder, Ipv4Builder, UdpBuilder};
    use pcapql_core::{default_registry, DecodedPacket};
    use pcapql_core::protocol::FrameMeta;

    const NOW: i64 = 1_715_342_400;

    fn decode(frame: &[u8], timestamp_us: u64) -> DecodedPacket<'_> {
        let meta = FrameMeta {
            segment: 1,
            offset: 24,
            timestamp_us,
            caplen: frame.len() as u32,
            origlen: frame.len() as u32,
        };
        DecodedPacket::from_frame(&default_registry(), 1, frame, meta)
    }

    fn filter_matches(query_filter: &str, packet: &DecodedPacket<'_>) -> bool {
        let text = format!("select * from a where {query_filter}");
        let mut ctx = CompileContext::new();
        let now = Utc.timestamp_opt(NOW, 0).unwrap();
        let stmt = parse_with(&text, &mut ctx, now).unwrap();
        matches(&stmt.filter.unwrap(), packet, NOW)
    }

    fn https_packet() -> Vec<u8> {
        build_tcp_packet([192, 168, 1, 10], [93, 184, 216, 34], 51000, 443, b"\x16\x03\x01")
    }

    #[test]
    fn test_field_comparisons() {
        let frame = https_packet();
        let packet = decode(&frame, NOW as u64 * 1_000_000);

        assert!(filter_matches("tcp.dport == 443", &packet));
        assert!(filter_matches("tcp.dport != 80", &packet));
        assert!(filter_matches("tcp.sport > 50000 and tcp.dport <= 443", &packet));
        assert!(filter_matches("tcp.dport in 400 to 500", &packet));
        assert!(filter_matches("tcp.dport between 443 to 443", &packet));
        assert!(filter_matches("tcp.dport in (80, 443)", &packet));
        assert!(!filter_matches("tcp.dport in (80, 8080)", &packet));
        assert!(filter_matches("tcp.len == 3", &packet));
        assert!(filter_matches("tcp.dport + 1 == 444", &packet));
        assert!(filter_matches("(tcp.flags & 0x18) == 0x18", &packet));
        assert!(filter_matches("tcp.dport >> 8 == 1", &packet));
    }

    #[test]
    fn test_ipv4_literals() {
        let frame = https_packet();
        let packet = decode(&frame, 0);

        assert!(filter_matches("ip.src == 192.168.1.0/24", &packet));
        assert!(filter_matches("ip.src == 192.168.1.10", &packet));
        assert!(filter_matches("ip.dst != 10.0.0.0/8", &packet));
        assert!(filter_matches("ip.dst in 93.184.0.0/16", &packet));
        assert!(!filter_matches("ip.src == 192.168.2.0/24", &packet));
        assert!(filter_matches("ip.src < ip.dst", &packet) == (0xC0A8_010Au32 < 0x5DB8_D822u32));
    }

    #[test]
    fn test_protocols_and_wildcard() {
        let frame = https_packet();
        let packet = decode(&frame, 0);

        assert!(filter_matches("tcp", &packet));
        assert!(filter_matches("HTTPS", &packet));
        assert!(filter_matches("ip and eth", &packet));
        assert!(!filter_matches("udp", &packet));
        assert!(!filter_matches("dns or arp", &packet));
        assert!(filter_matches("frame.protocols == TCP", &packet));
        assert!(filter_matches("tcp.dport == *", &packet));
        assert!(filter_matches("!udp", &packet));
    }

    #[test]
    fn test_missing_fields_never_match() {
        let frame = https_packet();
        let packet = decode(&frame, 0);

        assert!(!filter_matches("udp.dport == 53", &packet));
        assert!(!filter_matches("udp.dport != 53", &packet));
        assert!(!filter_matches("udp.dport < 53", &packet));
        assert!(!filter_matches("nosuch.field in 1 to 10", &packet));
        assert!(!filter_matches("udp.dport + 1 == 54", &packet));
    }

    #[test]
    fn test_mac_and_bytes() {
        let frame = EthernetBuilder::new()
            .src_mac([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e])
            .ipv4()
            .payload(
                Ipv4Builder::new()
                    .udp()
                    .payload(UdpBuilder::new().dst_port(9999).payload(b"hi".to_vec()).build())
                    .build(),
            )
            .build();
        let packet = decode(&frame, 0);

        assert!(filter_matches("eth.src == 00:1a:2b:3c:4d:5e", &packet));
        assert!(!filter_matches("eth.src == 00:1a:2b:3c:4d:5f", &packet));
        assert!(filter_matches("udp[2:2] == {0x27, 0x0f}", &packet));
        assert!(filter_matches("udp[2:2] == 9999", &packet));
        assert!(filter_matches("payload[0:2] == {104, 105}", &packet));
        assert!(!filter_matches("payload[1:5] == {105}", &packet));
        assert!(filter_matches("frame[12:2] == 0x0800", &packet));
    }

    #[test]
    fn test_dns_fields() {
        let frame = build_dns_packet([10, 0, 0, 1], [8, 8, 8, 8], 40000, "example.com");
        let packet = decode(&frame, 0);

        assert!(filter_matches("dns.qname == 'example.com'", &packet));
        assert!(filter_matches("dns and udp.dport == 53", &packet));
        assert!(!filter_matches("dns.qname == \"example.org\"", &packet));
    }

    #[test]
    fn test_time_expressions() {
        let frame = https_packet();
        let packet = decode(&frame, (NOW as u64 - 30) * 1_000_000);

        assert!(filter_matches("frame.ts > now(-1 m)", &packet));
        assert!(!filter_matches("frame.ts > now(-10 s)", &packet));
        assert!(filter_matches("frame.ts > 2024-05-10", &packet));
        assert!(filter_matches("frame.ts < now(+1 M)", &packet));
    }

    #[test]
    fn test_now_overflow_is_null() {
        let frame = https_packet();
        let packet = decode(&frame, 0);

        let far = Node::Now {
            offset: i64::MAX,
            unit: TimeUnit::Weeks,
        };
        assert_eq!(evaluate(&far, &packet, NOW), Value::Null);

        let filter = Node::binary(BinaryOp::Gt, Node::Field("frame.ts".into()), far);
        assert!(!matches(&filter, &packet, NOW));

        let back = Node::Now {
            offset: 2,
            unit: TimeUnit::Hours,
        };
        assert_eq!(evaluate(&back, &packet, NOW), Value::Int(NOW - 7_200));
    }

    #[test]
    fn test_range_value_and_sequence() {
        let frame = https_packet();
        let packet = decode(&frame, 0);

        let range = evaluate(
            &Node::binary(BinaryOp::To, Node::Integer(1), Node::Integer(5)),
            &packet,
            NOW,
        );
        assert_eq!(range, Value::Range(Box::new(Value::Int(1)), Box::new(Value::Int(5))));

        let last = evaluate(
            &Node::Sequence(vec![Node::Integer(1), Node::Field("tcp.dport".into())]),
            &packet,
            NOW,
        );
        assert_eq!(last, Value::Int(443));
        assert_eq!(evaluate(&Node::Wildcard, &packet, NOW), Value::Any);
    }
}
