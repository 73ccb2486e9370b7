//! PQL front end: lexer, literal composer, parser and evaluator.
//!
//! ```text
//! text ─▶ tokenize ─▶ compose ─▶ parse_with(ctx) ─▶ SelectStatement
//!                                                      │
//!                        DecodedPacket ─▶ evaluate ◀───┘ filter
//! ```
//!
//! # Example
//!
//! ```
//! use pcapql::query::{parse, Node, BinaryOp};
//!
//! let stmt = parse("select * from a where tcp.dport == 53;").unwrap();
//! assert!(stmt.protocols.contains("TCP"));
//! assert!(matches!(stmt.filter, Some(Node::Binary { op: BinaryOp::Eq, .. })));
//! ```

pub mod ast;
pub mod composer;
pub mod constants;
pub mod context;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use ast::{
    AggregateCall, AggregateFn, BinaryOp, Ipv4Literal, Node, Projection, SelectItem,
    SelectStatement, TimeUnit, UnaryOp,
};
pub use composer::compose;
pub use context::{CompileContext, IpLiterals, IpRole};
pub use eval::{evaluate, matches};
pub use lexer::tokenize;
pub use parser::{parse, parse_with};
pub use token::{Token, TokenKind};
pub use value::Value;
