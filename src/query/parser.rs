//! Recursive-descent parser.
//!
//! ```text
//! statement  = SELECT [DISTINCT] projection FROM source {"," source}
//!              [WHERE expr] [GROUP BY field {"," field}] [ORDER BY field {"," field}]
//!              [INTERVAL time TO time] [TOP int] [LIMIT int ["," int]] [";"] EOF
//! projection = "*" | item {"," item}
//! item       = field | aggfn "(" [field] ")" [AS name]
//! expr       = and {OR and}
//! and        = rel {AND rel}
//! rel        = bitwise [relop bitwise [TO bitwise]]
//! bitwise    = additive {("&" | "|" | "^" | "<<" | ">>") additive}
//! additive   = mult {("+" | "-") mult}
//! mult       = unary {"*" unary}
//! unary      = ("+" | "-" | "!") unary | primary
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::ast::{
    AggregateCall, AggregateFn, BinaryOp, Ipv4Literal, Node, Projection, SelectItem,
    SelectStatement, TimeUnit, UnaryOp,
};
use super::composer::compose;
use super::context::CompileContext;
use super::lexer::tokenize;
use super::token::{Token, TokenKind};
use crate::error::ParseError;

/// Layers that accept a `[offset:length]` byte subscript.
pub const BYTE_FIELD_BASES: &[&str] = &[
    "frame", "eth", "vlan", "arp", "ip", "ip6", "icmp", "tcp", "udp", "dns", "payload",
];

/// Deepest allowed nesting of groupings and prefix operators.
pub const MAX_NESTING: usize = 64;

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a statement with a fresh context, resolving times against now.
pub fn parse(text: &str) -> ParseResult<SelectStatement> {
    let mut ctx = CompileContext::new();
    parse_with(text, &mut ctx, Utc::now())
}

/// Parse a statement. `ctx` is reset first; afterwards it holds the
/// referenced protocols and IP literals of this statement.
pub fn parse_with(
    text: &str,
    ctx: &mut CompileContext,
    now: DateTime<Utc>,
) -> ParseResult<SelectStatement> {
    ctx.reset();
    let tokens = compose(tokenize(text));
    Parser {
        tokens,
        pos: 0,
        depth: 0,
        ctx,
        now,
    }
    .statement()
}

struct Parser<'c> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    ctx: &'c mut CompileContext,
    now: DateTime<Utc>,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The token list always ends with EOF and pos never passes it.
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_next_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        error_at(self.peek(), message)
    }

    fn statement(mut self) -> ParseResult<SelectStatement> {
        self.expect(TokenKind::Select, "expected SELECT")?;
        let distinct = self.accept(TokenKind::Distinct);
        let projection = self.projection()?;

        self.expect(TokenKind::From, "expected FROM")?;
        let mut sources = vec![self.source()?];
        while self.accept(TokenKind::Comma) {
            sources.push(self.source()?);
        }

        let filter = if self.accept(TokenKind::Where) {
            Some(self.expr()?)
        } else {
            None
        };

        let group_by = if self.accept(TokenKind::GroupBy) {
            self.field_list()?
        } else {
            Vec::new()
        };

        let order_by = if self.accept(TokenKind::OrderBy) {
            self.field_list()?
        } else {
            Vec::new()
        };

        let interval = if self.accept(TokenKind::Interval) {
            let start = self.time_bound()?;
            self.expect(TokenKind::To, "expected TO in INTERVAL")?;
            let end = self.time_bound()?;
            Some((start, end))
        } else {
            None
        };

        let top = if self.accept(TokenKind::Top) {
            Some(self.unsigned()?)
        } else {
            None
        };

        let limit = if self.accept(TokenKind::Limit) {
            let first = self.unsigned()?;
            if self.accept(TokenKind::Comma) {
                Some((first, self.unsigned()?))
            } else {
                Some((0, first))
            }
        } else {
            None
        };

        self.accept(TokenKind::Semicolon);
        self.expect(TokenKind::Eof, "unexpected token after end of statement")?;

        Ok(SelectStatement {
            distinct,
            projection,
            sources,
            filter,
            group_by,
            order_by,
            protocols: self.ctx.protocols().clone(),
            ip_literals: self.ctx.ip_literals().clone(),
            top,
            limit,
            interval,
        })
    }

    fn projection(&mut self) -> ParseResult<Projection> {
        if self.accept(TokenKind::Star) {
            return Ok(Projection::Wildcard);
        }
        let mut items = vec![self.item()?];
        while self.accept(TokenKind::Comma) {
            items.push(self.item()?);
        }
        Ok(Projection::Items(items))
    }

    fn item(&mut self) -> ParseResult<SelectItem> {
        let function = match self.peek_kind() {
            TokenKind::Sum => AggregateFn::Sum,
            TokenKind::Avg => AggregateFn::Avg,
            TokenKind::Min => AggregateFn::Min,
            TokenKind::Max => AggregateFn::Max,
            TokenKind::Count => AggregateFn::Count,
            _ => return Ok(SelectItem::Field(self.field_name()?)),
        };
        self.advance();

        self.expect(TokenKind::LParen, "expected '(' after aggregate function")?;
        let field = match self.peek_kind() {
            TokenKind::RParen => None,
            TokenKind::Star => {
                self.advance();
                None
            }
            _ => Some(self.field_name()?),
        };
        self.expect(TokenKind::RParen, "expected ')' after aggregate argument")?;

        let alias = if self.accept(TokenKind::As) {
            self.alias()?
        } else {
            format!("{}({})", function.name(), field.as_deref().unwrap_or(""))
        };

        Ok(SelectItem::Aggregate(AggregateCall {
            function,
            field,
            alias,
        }))
    }

    fn field_name(&mut self) -> ParseResult<String> {
        match self.peek_kind() {
            TokenKind::Field => {
                let token = self.advance();
                self.ctx.note_field(&token.text);
                Ok(token.text)
            }
            TokenKind::Name => Ok(self.advance().text),
            _ => Err(self.error("expected field name")),
        }
    }

    fn field_list(&mut self) -> ParseResult<Vec<String>> {
        let mut fields = vec![self.field_name()?];
        while self.accept(TokenKind::Comma) {
            fields.push(self.field_name()?);
        }
        Ok(fields)
    }

    fn alias(&mut self) -> ParseResult<String> {
        match self.peek_kind() {
            TokenKind::Name | TokenKind::Constant | TokenKind::Field | TokenKind::String => {
                Ok(self.advance().text)
            }
            _ => Err(self.error("expected column alias")),
        }
    }

    fn source(&mut self) -> ParseResult<String> {
        match self.peek_kind() {
            TokenKind::Name
            | TokenKind::Constant
            | TokenKind::Field
            | TokenKind::String
            | TokenKind::Integer => Ok(self.advance().text),
            _ => Err(self.error("expected source name")),
        }
    }

    fn unsigned(&mut self) -> ParseResult<u64> {
        let token = self.expect(TokenKind::Integer, "expected integer")?;
        let value = parse_integer(&token)?;
        u64::try_from(value).map_err(|_| error_at(&token, "expected non-negative integer"))
    }

    /// An INTERVAL bound, resolved to epoch seconds.
    fn time_bound(&mut self) -> ParseResult<i64> {
        match self.peek_kind() {
            TokenKind::Date | TokenKind::Time | TokenKind::Timestamp => {
                let token = self.advance();
                self.epoch_seconds(&token)
            }
            TokenKind::Integer => {
                let token = self.advance();
                parse_integer(&token)
            }
            TokenKind::Now => {
                let token = self.peek().clone();
                match self.now_call()? {
                    Node::Now { offset, unit } => unit
                        .shift_back(self.now.timestamp(), offset)
                        .ok_or_else(|| error_at(&token, "now() offset out of range")),
                    _ => Err(error_at(&token, "expected now(...)")),
                }
            }
            _ => Err(self.error("expected date, time or timestamp")),
        }
    }

    fn epoch_seconds(&self, token: &Token) -> ParseResult<i64> {
        let naive = match token.kind {
            TokenKind::Date => NaiveDate::parse_from_str(&token.text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            TokenKind::Timestamp => {
                NaiveDateTime::parse_from_str(&token.text, "%Y-%m-%d %H:%M:%S").ok()
            }
            TokenKind::Time => NaiveTime::parse_from_str(&token.text, "%H:%M:%S")
                .ok()
                .map(|t| NaiveDateTime::new(self.now.date_naive(), t)),
            _ => None,
        };
        naive
            .map(|dt| Utc.from_utc_datetime(&dt).timestamp())
            .ok_or_else(|| error_at(token, "invalid date or time"))
    }

    fn expr(&mut self) -> ParseResult<Node> {
        let mut left = self.and()?;
        while self.accept(TokenKind::Or) {
            let right = self.and()?;
            left = Node::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> ParseResult<Node> {
        let mut left = self.rel()?;
        while self.accept(TokenKind::And) {
            let right = self.rel()?;
            left = Node::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn rel(&mut self) -> ParseResult<Node> {
        let left = self.bitwise()?;
        let op = match self.peek_kind() {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::In => BinaryOp::In,
            TokenKind::Between => BinaryOp::Between,
            TokenKind::To => BinaryOp::To,
            _ => return Ok(left),
        };
        self.advance();

        let mut right = self.bitwise()?;
        if op != BinaryOp::To && self.accept(TokenKind::To) {
            let upper = self.bitwise()?;
            right = Node::binary(BinaryOp::To, right, upper);
        }
        Ok(Node::binary(op, left, right))
    }

    fn bitwise(&mut self) -> ParseResult<Node> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Amp => BinaryOp::BitAnd,
                TokenKind::Pipe => BinaryOp::BitOr,
                TokenKind::Caret => BinaryOp::BitXor,
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = Node::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> ParseResult<Node> {
        let mut left = self.mult()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.mult()?;
            left = Node::binary(op, left, right);
        }
    }

    fn mult(&mut self) -> ParseResult<Node> {
        let mut left = self.unary()?;
        while self.accept(TokenKind::Star) {
            let right = self.unary()?;
            left = Node::binary(BinaryOp::Mul, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Node> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let node = self.prefixed();
        self.depth -= 1;
        node
    }

    fn prefixed(&mut self) -> ParseResult<Node> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.primary(),
        };
        self.advance();
        Ok(Node::unary(op, self.unary()?))
    }

    fn primary(&mut self) -> ParseResult<Node> {
        let kind = self.peek_kind();
        match kind {
            TokenKind::Integer => {
                let token = self.advance();
                Ok(Node::Integer(parse_integer(&token)?))
            }
            TokenKind::Float => {
                let token = self.advance();
                token
                    .text
                    .parse()
                    .map(Node::Float)
                    .map_err(|_| error_at(&token, "invalid number"))
            }
            TokenKind::String => Ok(Node::String(self.advance().text)),
            TokenKind::True => {
                self.advance();
                Ok(Node::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Boolean(false))
            }
            TokenKind::Date | TokenKind::Time | TokenKind::Timestamp => {
                let token = self.advance();
                Ok(Node::Date(self.epoch_seconds(&token)?))
            }
            TokenKind::Ipv4 => self.ipv4(),
            TokenKind::Mac => {
                let token = self.advance();
                Ok(Node::Mac(parse_mac(&token)?))
            }
            TokenKind::LBrace => self.byte_array(),
            TokenKind::Field => {
                let token = self.advance();
                self.ctx.note_field(&token.text);
                Ok(Node::Field(token.text))
            }
            TokenKind::Name | TokenKind::Constant
                if self.peek_next_kind() == TokenKind::LBracket =>
            {
                self.byte_field()
            }
            TokenKind::Name => Ok(Node::Field(self.advance().text)),
            TokenKind::Constant => {
                let token = self.advance();
                self.ctx.note_protocol(&token.text);
                Ok(Node::Protocol(token.text.to_ascii_uppercase()))
            }
            TokenKind::LParen => {
                self.advance();
                let first = self.expr()?;
                if self.accept(TokenKind::Comma) {
                    let mut members = vec![first, self.expr()?];
                    while self.accept(TokenKind::Comma) {
                        members.push(self.expr()?);
                    }
                    self.expect(TokenKind::RParen, "expected ')'")?;
                    Ok(Node::Sequence(members))
                } else {
                    self.expect(TokenKind::RParen, "expected ')'")?;
                    Ok(Node::Grouping(Box::new(first)))
                }
            }
            TokenKind::Now => self.now_call(),
            TokenKind::Star => {
                self.advance();
                Ok(Node::Wildcard)
            }
            _ => Err(self.error("unexpected token in expression")),
        }
    }

    fn ipv4(&mut self) -> ParseResult<Node> {
        let token = self.advance();
        let address = parse_ipv4(&token)?;

        let prefix = if self.accept(TokenKind::Slash) {
            let prefix_token = self.expect(TokenKind::Integer, "expected prefix length")?;
            match parse_integer(&prefix_token)? {
                p @ 0..=32 => p as u8,
                _ => return Err(error_at(&prefix_token, "prefix length must be 0 to 32")),
            }
        } else {
            32
        };

        let literal = Ipv4Literal::new(address, prefix);
        self.ctx.note_ipv4(literal);
        Ok(Node::Ipv4(literal))
    }

    fn byte_array(&mut self) -> ParseResult<Node> {
        self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut bytes = Vec::new();
        loop {
            let token = self.expect(TokenKind::Integer, "expected byte value")?;
            let value = u8::try_from(parse_integer(&token)?)
                .map_err(|_| error_at(&token, "byte value out of range"))?;
            bytes.push(value);
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "expected '}'")?;
        Ok(Node::Bytes(bytes))
    }

    fn byte_field(&mut self) -> ParseResult<Node> {
        let base_token = self.advance();
        let base = base_token.text.to_ascii_lowercase();
        if !BYTE_FIELD_BASES.contains(&base.as_str()) {
            return Err(error_at(&base_token, "byte subscript not allowed on this name"));
        }
        if base != "frame" && base != "payload" {
            self.ctx.note_protocol(&base);
        }

        self.expect(TokenKind::LBracket, "expected '['")?;
        let offset = self.unsigned()?;
        self.expect(TokenKind::Colon, "expected ':' in byte subscript")?;
        let length = self.unsigned()?;
        self.expect(TokenKind::RBracket, "expected ']'")?;

        let to_usize =
            |v: u64| usize::try_from(v).map_err(|_| error_at(&base_token, "subscript too large"));
        Ok(Node::FieldBytes {
            base,
            offset: to_usize(offset)?,
            length: to_usize(length)?,
        })
    }

    /// `now ( [("-" | "+") INTEGER unit] )`
    fn now_call(&mut self) -> ParseResult<Node> {
        self.expect(TokenKind::Now, "expected now")?;
        self.expect(TokenKind::LParen, "expected '(' after now")?;
        if self.accept(TokenKind::RParen) {
            return Ok(Node::Now {
                offset: 0,
                unit: TimeUnit::Seconds,
            });
        }

        // A leading '-' (or no sign) looks back from now; '+' looks ahead.
        let sign = if self.accept(TokenKind::Plus) {
            -1
        } else {
            self.accept(TokenKind::Minus);
            1
        };
        let amount_token = self.expect(TokenKind::Integer, "expected offset in now()")?;
        let offset = sign * parse_integer(&amount_token)?;

        let unit_token = self.expect(TokenKind::Name, "expected time unit (s, m, h, d, w, M)")?;
        let unit = TimeUnit::from_suffix(&unit_token.text)
            .ok_or_else(|| error_at(&unit_token, "unknown time unit"))?;
        if unit.shift_back(self.now.timestamp(), offset).is_none() {
            return Err(error_at(&amount_token, "now() offset out of range"));
        }

        self.expect(TokenKind::RParen, "expected ')' after now offset")?;
        Ok(Node::Now { offset, unit })
    }
}

fn error_at(token: &Token, message: &str) -> ParseError {
    ParseError {
        message: message.to_string(),
        token: token.to_string(),
        line: token.line,
        column: token.column,
    }
}

fn parse_integer(token: &Token) -> ParseResult<i64> {
    let text = token.text.as_str();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| error_at(token, "invalid integer"))
}

fn parse_ipv4(token: &Token) -> ParseResult<u32> {
    let mut octets = [0u8; 4];
    let mut parts = token.text.split('.');
    for octet in octets.iter_mut() {
        *octet = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| error_at(token, "invalid IPv4 address"))?;
    }
    Ok(u32::from_be_bytes(octets))
}

fn parse_mac(token: &Token) -> ParseResult<u64> {
    token.text.split(':').try_fold(0u64, |acc, group| {
        u8::from_str_radix(group, 16)
            .map(|b| (acc << 8) | b as u64)
            .map_err(|_| error_at(token, "invalid MAC address"))
    })
}
