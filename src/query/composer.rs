//! Literal composer.
//!
//! Fuses fixed windows of raw tokens into composite literals. Windows are
//! tried longest first at every position, left to right:
//!
//! | Literal | Window |
//! |---------|--------|
//! | MAC | `H : H : H : H : H : H` (1-2 hex digits each) |
//! | TIMESTAMP | `I - I - I I : I : I` |
//! | IPV4 | `I . I . I . I` |
//! | DATE | `I - I - I` |
//! | TIME | `I : I : I` |
//! | FIELD | `N . N` |

use super::token::{Token, TokenKind};

type Matcher = fn(&[Token]) -> Option<(TokenKind, String)>;

const WINDOWS: &[(usize, Matcher)] = &[
    (11, match_mac),
    (10, match_timestamp),
    (7, match_ipv4),
    (5, match_date),
    (5, match_time),
    (3, match_field),
];

/// Compose raw tokens. Composed tokens take the position of their first
/// source token; everything else passes through.
pub fn compose(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    'outer: while i < tokens.len() {
        for &(width, matcher) in WINDOWS {
            let Some(window) = tokens.get(i..i + width) else {
                continue;
            };
            if let Some((kind, text)) = matcher(window) {
                out.push(Token::new(kind, text, window[0].line, window[0].column));
                i += width;
                continue 'outer;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

fn is_decimal(token: &Token) -> bool {
    token.kind == TokenKind::Integer
        && !token.text.is_empty()
        && token.text.bytes().all(|b| b.is_ascii_digit())
}

fn is_hex_group(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Integer | TokenKind::Name)
        && (1..=2).contains(&token.text.len())
        && token.text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Tokens at even positions satisfy `item`, odd positions are `sep`.
fn separated(window: &[Token], sep: TokenKind, item: fn(&Token) -> bool) -> bool {
    window.iter().enumerate().all(|(i, t)| {
        if i % 2 == 0 {
            item(t)
        } else {
            t.kind == sep
        }
    })
}

fn joined(window: &[Token]) -> String {
    window.iter().map(|t| t.text.as_str()).collect()
}

fn match_mac(window: &[Token]) -> Option<(TokenKind, String)> {
    if !separated(window, TokenKind::Colon, is_hex_group) {
        return None;
    }
    let groups: Vec<String> = window
        .iter()
        .step_by(2)
        .map(|t| format!("{:0>2}", t.text.to_ascii_lowercase()))
        .collect();
    Some((TokenKind::Mac, groups.join(":")))
}

fn match_timestamp(window: &[Token]) -> Option<(TokenKind, String)> {
    let (date, time) = window.split_at(5);
    let (_, date) = match_date(date)?;
    let (_, time) = match_time(time)?;
    Some((TokenKind::Timestamp, format!("{date} {time}")))
}

fn match_ipv4(window: &[Token]) -> Option<(TokenKind, String)> {
    separated(window, TokenKind::Dot, is_decimal).then(|| (TokenKind::Ipv4, joined(window)))
}

fn match_date(window: &[Token]) -> Option<(TokenKind, String)> {
    separated(window, TokenKind::Minus, is_decimal).then(|| (TokenKind::Date, joined(window)))
}

fn match_time(window: &[Token]) -> Option<(TokenKind, String)> {
    separated(window, TokenKind::Colon, is_decimal).then(|| (TokenKind::Time, joined(window)))
}

fn match_field(window: &[Token]) -> Option<(TokenKind, String)> {
    (window[0].kind.is_name() && window[1].kind == TokenKind::Dot && window[2].kind.is_name())
        .then(|| (TokenKind::Field, joined(window)))
}
