//! Raw tokenizer.
//!
//! A single forward scan over the query text. Multi-token literals (IPv4
//! and MAC addresses, dates, dotted field names) are left in pieces here
//! and fused afterwards by [`compose`](super::composer::compose).

use super::constants::is_protocol_constant;
use super::token::{Token, TokenKind};

/// Split `text` into tokens. Always ends with an EOF token.
pub fn tokenize(text: &str) -> Vec<Token> {
    Lexer::new(text).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, line: u32, column: u32) {
        self.tokens.push(Token::new(kind, text, line, column));
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek(0) {
            let (line, column) = (self.line, self.column);

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '#' {
                while self.peek(0).is_some_and(|c| c != '\n') {
                    self.bump();
                }
                continue;
            }

            if let Some(kind) = self.peek(1).and_then(|next| two_char_operator(c, next)) {
                let text = self.text(self.pos, self.pos + 2);
                self.bump_n(2);
                self.push(kind, text, line, column);
                continue;
            }

            if c == '\'' || c == '"' {
                self.string(c, line, column);
                continue;
            }

            if c.is_ascii_digit() {
                self.number(line, column);
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' {
                self.word(line, column);
                continue;
            }

            if let Some(kind) = one_char_operator(c) {
                self.bump();
                self.push(kind, c.to_string(), line, column);
                continue;
            }

            // Unrecognized character
            self.bump();
        }

        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, "", line, column);
        self.tokens
    }

    fn string(&mut self, quote: char, line: u32, column: u32) {
        let start = self.pos + 1;
        let close = self.chars[start..].iter().position(|&c| c == quote);

        match close {
            Some(len) => {
                let content = self.text(start, start + len);
                self.bump_n(len + 2);
                self.push(TokenKind::String, content, line, column);
            }
            None => {
                self.bump();
                if quote == '\'' {
                    self.push(TokenKind::Quote, "'", line, column);
                }
            }
        }
    }

    fn number(&mut self, line: u32, column: u32) {
        let start = self.pos;

        // 0x-prefixed hex
        if self.peek(0) == Some('0')
            && matches!(self.peek(1), Some('x' | 'X'))
            && self.peek(2).is_some_and(|c| c.is_ascii_hexdigit())
        {
            let mut end = start + 2;
            while self.chars.get(end).is_some_and(|c| c.is_ascii_hexdigit()) {
                end += 1;
            }
            let text = self.text(start, end);
            self.bump_n(end - start);
            self.push(TokenKind::Integer, text, line, column);
            return;
        }

        // Hex group next to a colon (MAC octet, time field, byte subscript)
        let mut hex_end = start;
        while self.chars.get(hex_end).is_some_and(|c| c.is_ascii_hexdigit()) {
            hex_end += 1;
        }
        let after_colon = start > 0 && self.chars[start - 1] == ':';
        let before_colon = self.chars.get(hex_end) == Some(&':');
        if after_colon || before_colon {
            let text = self.text(start, hex_end);
            self.bump_n(hex_end - start);
            self.push(TokenKind::Integer, text, line, column);
            return;
        }

        // Decimal digits, possibly dotted
        let mut pieces = Vec::new();
        let mut end = self.digits_end(start);
        pieces.push((start, end));
        while self.chars.get(end) == Some(&'.')
            && self.chars.get(end + 1).is_some_and(|c| c.is_ascii_digit())
        {
            let piece_start = end + 1;
            end = self.digits_end(piece_start);
            pieces.push((piece_start, end));
        }

        match pieces.len() {
            1 => {
                let text = self.text(start, end);
                self.push(TokenKind::Integer, text, line, column);
            }
            2 => {
                let text = self.text(start, end);
                self.push(TokenKind::Float, text, line, column);
            }
            _ => {
                // Several dots: INTEGER . INTEGER . ... for the composer
                for (i, &(s, e)) in pieces.iter().enumerate() {
                    if i > 0 {
                        let dot_column = column + (s - 1 - start) as u32;
                        self.push(TokenKind::Dot, ".", line, dot_column);
                    }
                    let text = self.text(s, e);
                    self.push(TokenKind::Integer, text, line, column + (s - start) as u32);
                }
            }
        }
        self.bump_n(end - start);
    }

    fn digits_end(&self, mut pos: usize) -> usize {
        while self.chars.get(pos).is_some_and(|c| c.is_ascii_digit()) {
            pos += 1;
        }
        pos
    }

    fn word_end(&self, mut pos: usize) -> usize {
        while self
            .chars
            .get(pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            pos += 1;
        }
        pos
    }

    fn word(&mut self, line: u32, column: u32) {
        let start = self.pos;
        let end = self.word_end(start);
        let word = self.text(start, end);

        // "order by" / "group by" lex as one token
        let two_word = if word.eq_ignore_ascii_case("order") {
            Some(TokenKind::OrderBy)
        } else if word.eq_ignore_ascii_case("group") {
            Some(TokenKind::GroupBy)
        } else {
            None
        };
        if let Some(kind) = two_word {
            let mut next = end;
            while self.chars.get(next).is_some_and(|c| c.is_whitespace()) {
                next += 1;
            }
            let next_end = self.word_end(next);
            if next > end && self.text(next, next_end).eq_ignore_ascii_case("by") {
                let text = format!("{} {}", word, self.text(next, next_end));
                self.bump_n(next_end - start);
                self.push(kind, text, line, column);
                return;
            }
        }

        self.bump_n(end - start);
        let kind = match TokenKind::keyword(&word) {
            Some(kind) => kind,
            None if is_protocol_constant(&word) => TokenKind::Constant,
            None => TokenKind::Name,
        };
        self.push(kind, word, line, column);
    }
}

fn two_char_operator(first: char, second: char) -> Option<TokenKind> {
    let kind = match (first, second) {
        ('=', '=') => TokenKind::EqEq,
        ('!', '=') => TokenKind::NotEq,
        ('<', '=') => TokenKind::LtEq,
        ('>', '=') => TokenKind::GtEq,
        ('<', '<') => TokenKind::Shl,
        ('>', '>') => TokenKind::Shr,
        _ => return None,
    };
    Some(kind)
}

fn one_char_operator(c: char) -> Option<TokenKind> {
    let kind = match c {
        '=' => TokenKind::EqEq,
        '/' => TokenKind::Slash,
        '*' => TokenKind::Star,
        ';' => TokenKind::Semicolon,
        ',' => TokenKind::Comma,
        '>' => TokenKind::Gt,
        '<' => TokenKind::Lt,
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        ':' => TokenKind::Colon,
        '\'' => TokenKind::Quote,
        '.' => TokenKind::Dot,
        '!' => TokenKind::Bang,
        '&' => TokenKind::Amp,
        '|' => TokenKind::Pipe,
        '^' => TokenKind::Caret,
        _ => return None,
    };
    Some(kind)
}
