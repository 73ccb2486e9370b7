//! Front-end tests through the public query API.

use pcapql::query::token::KEYWORDS;
use pcapql::query::{
    compose, parse, tokenize, AggregateFn, BinaryOp, Ipv4Literal, Node, Projection, SelectItem,
    TokenKind,
};

#[test]
fn test_every_keyword_is_one_token() {
    for (word, kind) in KEYWORDS {
        for text in [word.to_string(), word.to_uppercase()] {
            let tokens = tokenize(&text);
            assert_eq!(tokens.len(), 2, "{text}");
            assert_eq!(tokens[0].kind, *kind, "{text}");
            assert_eq!(tokens[1].kind, TokenKind::Eof);
        }
    }
}

#[test]
fn test_composite_literals() {
    let tokens = compose(tokenize("ip.dst == 10.20.30.40 or eth.src == aa:bb:cc:dd:ee:ff"));
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Field,
            TokenKind::EqEq,
            TokenKind::Ipv4,
            TokenKind::Or,
            TokenKind::Field,
            TokenKind::EqEq,
            TokenKind::Mac,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[2].text, "10.20.30.40");
    assert_eq!(tokens[6].text, "aa:bb:cc:dd:ee:ff");
}

#[test]
fn test_wildcard_select() {
    let stmt = parse("select * from a;").unwrap();
    assert_eq!(stmt.projection, Projection::Wildcard);
    assert!(stmt.filter.is_none());
    assert_eq!(stmt.sources, vec!["a"]);
    assert!(stmt.protocols.is_empty());
}

#[test]
fn test_port_filter() {
    let stmt = parse("select * from a where tcp.dport == 53;").unwrap();
    assert_eq!(
        stmt.filter,
        Some(Node::binary(
            BinaryOp::Eq,
            Node::Field("tcp.dport".into()),
            Node::Integer(53)
        ))
    );
    assert!(stmt.protocols.contains("TCP"));
}

#[test]
fn test_cidr_literal_bounds() {
    let stmt = parse("select * from a where ip.dst == 192.168.3.0/24;").unwrap();
    let literal = stmt.ip_literals.dst[0];
    assert!(stmt.ip_literals.src.is_empty());
    assert_eq!(literal, Ipv4Literal::new(0xC0A8_0300, 24));
    assert_eq!(literal.range_min, 0xC0A8_0300);
    assert_eq!(literal.range_max, 0xC0A8_03FF);
    assert!(literal.contains(0xC0A8_03FF));
    assert!(!literal.contains(0xC0A8_0400));
    assert!(!literal.contains(0xC0A8_02FF));
}

#[test]
fn test_aggregate_projection() {
    let stmt = parse("select ip.src, avg(frame.len) as mean from a group by ip.src top 3;").unwrap();
    let Projection::Items(items) = &stmt.projection else {
        panic!("expected items");
    };
    assert_eq!(items[0], SelectItem::Field("ip.src".into()));
    let SelectItem::Aggregate(call) = &items[1] else {
        panic!("expected aggregate");
    };
    assert_eq!(call.function, AggregateFn::Avg);
    assert_eq!(call.field.as_deref(), Some("frame.len"));
    assert_eq!(call.alias, "mean");
    assert_eq!(stmt.group_by, vec!["ip.src"]);
    assert_eq!(stmt.top, Some(3));
    assert!(stmt.protocols.contains("IP"));
}

#[test]
fn test_syntax_error_position() {
    let err = parse("select *\nfrom a\nwhere tcp.dport ==").unwrap_err();
    assert_eq!(err.line, 3);
    assert!(err.to_string().contains("line 3"));
}
