//! Abstract syntax tree for PQL statements.

use std::collections::BTreeSet;
use std::fmt;

use super::context::IpLiterals;

/// An IPv4 address or network, with its inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Literal {
    /// Network address (host bits cleared).
    pub address: u32,
    /// Prefix length, 0 to 32.
    pub mask: u8,
    pub range_min: u32,
    pub range_max: u32,
}

impl Ipv4Literal {
    /// Build from an address and prefix length. Prefixes above 32 clamp to 32.
    pub fn new(address: u32, prefix: u8) -> Self {
        let prefix = prefix.min(32);
        let netmask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix as u32)
        };
        let network = address & netmask;
        Self {
            address: network,
            mask: prefix,
            range_min: network,
            range_max: network | !netmask,
        }
    }

    /// A single host (`/32`).
    pub fn host(address: u32) -> Self {
        Self::new(address, 32)
    }

    /// True if `address` lies in this network.
    pub fn contains(&self, address: u32) -> bool {
        (self.range_min..=self.range_max).contains(&address)
    }
}

impl fmt::Display for Ipv4Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", std::net::Ipv4Addr::from(self.address), self.mask)
    }
}

/// Unit of a `now(...)` offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    /// `M`; counted as days.
    Months,
}

impl TimeUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        let unit = match suffix {
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            "w" => TimeUnit::Weeks,
            "M" => TimeUnit::Months,
            _ => return None,
        };
        Some(unit)
    }

    pub fn seconds(self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3_600,
            TimeUnit::Days | TimeUnit::Months => 86_400,
            TimeUnit::Weeks => 7 * 86_400,
        }
    }

    /// `now` moved back by `offset` units, or `None` if that overflows.
    pub fn shift_back(self, now: i64, offset: i64) -> Option<i64> {
        offset
            .checked_mul(self.seconds())
            .and_then(|delta| now.checked_sub(delta))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    In,
    Between,
    To,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    /// Seconds since the Unix epoch.
    Date(i64),
    /// `now(-offset unit)`: evaluates to `now - offset * unit`.
    Now { offset: i64, unit: TimeUnit },
    Ipv4(Ipv4Literal),
    /// 48-bit MAC address.
    Mac(u64),
    /// `{1, 2, 3}`
    Bytes(Vec<u8>),
    /// Dotted field name, e.g. `tcp.dport`.
    Field(String),
    /// `base[offset:length]`
    FieldBytes {
        base: String,
        offset: usize,
        length: usize,
    },
    /// Bare protocol name, e.g. `TCP`.
    Protocol(String),
    Grouping(Box<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `*`: matches anything.
    Wildcard,
    /// `(a, b, c)`
    Sequence(Vec<Node>),
}

impl Node {
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// The node with any enclosing parentheses removed.
    pub fn ungrouped(&self) -> &Node {
        match self {
            Node::Grouping(inner) => inner.ungrouped(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

impl AggregateFn {
    pub fn name(self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::Count => "count",
        }
    }
}

/// `fn(field) [AS alias]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCall {
    pub function: AggregateFn,
    pub field: Option<String>,
    /// Output column name: the `AS` alias, or `fn(field)`.
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    Field(String),
    Aggregate(AggregateCall),
}

impl SelectItem {
    /// Output column name.
    pub fn name(&self) -> &str {
        match self {
            SelectItem::Field(name) => name,
            SelectItem::Aggregate(call) => &call.alias,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Wildcard,
    Items(Vec<SelectItem>),
}

impl Projection {
    pub fn has_aggregates(&self) -> bool {
        match self {
            Projection::Wildcard => false,
            Projection::Items(items) => items
                .iter()
                .any(|item| matches!(item, SelectItem::Aggregate(_))),
        }
    }
}

/// A compiled `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub projection: Projection,
    pub sources: Vec<String>,
    pub filter: Option<Node>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    /// Upper-cased protocol names referenced anywhere in the statement.
    pub protocols: BTreeSet<String>,
    pub ip_literals: IpLiterals,
    pub top: Option<u64>,
    /// `LIMIT offset, count`
    pub limit: Option<(u64, u64)>,
    /// `INTERVAL start TO end`, epoch seconds.
    pub interval: Option<(i64, i64)>,
}
