//! Tokens produced by the lexer and the literal composer.

use std::fmt;

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Select,
    From,
    Where,
    OrderBy,
    GroupBy,
    Top,
    Limit,
    In,
    And,
    Or,
    Now,
    Interval,
    To,
    As,
    True,
    False,
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Between,
    Distinct,

    // Words and literals
    Name,
    Constant,
    Integer,
    Float,
    String,

    // Composed literals
    Field,
    Ipv4,
    Mac,
    Date,
    Time,
    Timestamp,

    // Operators and punctuation
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    Shl,
    Shr,
    Lt,
    Gt,
    Slash,
    Star,
    Plus,
    Minus,
    Bang,
    Amp,
    Pipe,
    Caret,
    Semicolon,
    Comma,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Quote,
    Dot,

    Eof,
}

/// Reserved words, lowercase.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("select", TokenKind::Select),
    ("from", TokenKind::From),
    ("where", TokenKind::Where),
    ("order by", TokenKind::OrderBy),
    ("group by", TokenKind::GroupBy),
    ("top", TokenKind::Top),
    ("limit", TokenKind::Limit),
    ("in", TokenKind::In),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("now", TokenKind::Now),
    ("interval", TokenKind::Interval),
    ("to", TokenKind::To),
    ("as", TokenKind::As),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("sum", TokenKind::Sum),
    ("avg", TokenKind::Avg),
    ("min", TokenKind::Min),
    ("max", TokenKind::Max),
    ("count", TokenKind::Count),
    ("between", TokenKind::Between),
    ("distinct", TokenKind::Distinct),
];

impl TokenKind {
    /// Keyword for a single word, matched case-insensitively.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        KEYWORDS
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(word))
            .map(|(_, kind)| *kind)
    }

    /// A word usable on either side of a dotted field name.
    pub fn is_name(self) -> bool {
        matches!(self, TokenKind::Name | TokenKind::Constant)
    }
}

/// A lexed token with its 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == TokenKind::Eof {
            f.write_str("end of input")
        } else {
            f.write_str(&self.text)
        }
    }
}
