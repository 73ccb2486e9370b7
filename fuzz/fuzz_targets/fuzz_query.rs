//! Fuzz target for the query front end.
//!
//! Arbitrary text through the lexer, literal composer and parser. Must
//! return a statement or a ParseError, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pcapql::query::{compose, parse, tokenize};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = compose(tokenize(text));
        let _ = parse(text);
    }
});
