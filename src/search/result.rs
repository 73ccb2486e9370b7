//! Query results and column metadata.

use std::collections::HashSet;
use std::fmt;

use pcapql_core::format::{detect_address_column, AddressKind};

use crate::query::{AggregateFn, SelectItem, Value};

/// Placeholder error list entry of a query that hit no problems.
pub const NO_ERRORS: &str = "no errors";

/// How a column's values should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayType {
    /// 32-bit integer shown as a dotted quad
    Ipv4,
    /// 48-bit integer shown as colon-separated hex
    Mac,
    /// Epoch seconds shown as a UTC date and time
    Timestamp,
    Int,
    Float,
    Text,
}

impl DisplayType {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayType::Ipv4 => "ipv4",
            DisplayType::Mac => "mac",
            DisplayType::Timestamp => "timestamp",
            DisplayType::Int => "int",
            DisplayType::Float => "float",
            DisplayType::Text => "text",
        }
    }

    /// Display type implied by a field name alone, if any.
    pub fn for_field(name: &str) -> Option<Self> {
        match detect_address_column(name) {
            Some(AddressKind::Ipv4) => return Some(DisplayType::Ipv4),
            Some(AddressKind::Mac) => return Some(DisplayType::Mac),
            None => {}
        }
        if name.eq_ignore_ascii_case("frame.ts") {
            return Some(DisplayType::Timestamp);
        }
        None
    }

    /// Display type of a value seen in the column.
    pub fn for_value(value: &Value) -> Self {
        match value {
            Value::Int(_) | Value::Bool(_) => DisplayType::Int,
            Value::Float(_) => DisplayType::Float,
            _ => DisplayType::Text,
        }
    }

    /// Best-effort type for projection item `item`, falling back to the
    /// first non-null value in `values`.
    pub fn infer<'a, I>(item: &SelectItem, values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let from_values = |values: I| {
            values
                .into_iter()
                .find(|v| !v.is_null())
                .map_or(DisplayType::Text, DisplayType::for_value)
        };

        match item {
            SelectItem::Field(name) => Self::for_field(name).unwrap_or_else(|| from_values(values)),
            SelectItem::Aggregate(call) => match call.function {
                AggregateFn::Count => DisplayType::Int,
                AggregateFn::Avg => DisplayType::Float,
                AggregateFn::Sum => from_values(values),
                AggregateFn::Min | AggregateFn::Max => call
                    .field
                    .as_deref()
                    .and_then(Self::for_field)
                    .unwrap_or_else(|| from_values(values)),
            },
        }
    }
}

impl fmt::Display for DisplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and display type of one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub display_type: DisplayType,
}

/// Everything a query produced.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Packets that passed the filter.
    pub matched_count: u64,
    /// Index candidates examined.
    pub searched_count: u64,
    /// Earliest and latest matched packet, microseconds.
    pub min_ts: Option<u64>,
    pub max_ts: Option<u64>,
    pub columns: Vec<ColumnDescriptor>,
    /// Flat rows, or one row per group bucket.
    pub rows: Vec<Vec<Value>>,
    /// Fingerprints of the rows kept by DISTINCT.
    pub fingerprints: HashSet<String>,
    /// Per-segment problems, or the single [`NO_ERRORS`] entry.
    pub errors: Vec<String>,
}

impl Default for QueryResult {
    fn default() -> Self {
        Self {
            matched_count: 0,
            searched_count: 0,
            min_ts: None,
            max_ts: None,
            columns: Vec::new(),
            rows: Vec::new(),
            fingerprints: HashSet::new(),
            errors: vec![NO_ERRORS.to_string()],
        }
    }
}

impl QueryResult {
    /// Record a problem. The first one replaces the placeholder entry.
    pub fn push_error(&mut self, message: impl Into<String>) {
        if !self.has_errors() {
            self.errors.clear();
        }
        self.errors.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !(self.errors.len() == 1 && self.errors[0] == NO_ERRORS)
    }

    pub(crate) fn observe_timestamp(&mut self, ts: u64) {
        self.min_ts = Some(self.min_ts.map_or(ts, |m| m.min(ts)));
        self.max_ts = Some(self.max_ts.map_or(ts, |m| m.max(ts)));
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of the column named `name`, case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Values of column `name` across all rows.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(index)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::AggregateCall;

    #[test]
    fn test_error_list_placeholder() {
        let mut result = QueryResult::default();
        assert_eq!(result.errors, vec![NO_ERRORS]);
        assert!(!result.has_errors());

        result.push_error("segment 3: missing index");
        result.push_error("segment 4: missing index");
        assert_eq!(result.errors.len(), 2);
        assert!(result.has_errors());
    }

    #[test]
    fn test_observe_timestamp() {
        let mut result = QueryResult::default();
        result.observe_timestamp(50);
        result.observe_timestamp(10);
        result.observe_timestamp(30);
        assert_eq!((result.min_ts, result.max_ts), (Some(10), Some(50)));
    }

    #[test]
    fn test_display_type_inference() {
        let field = |n: &str| SelectItem::Field(n.to_string());
        let none: &[Value] = &[];
        assert_eq!(DisplayType::infer(&field("ip.src"), none), DisplayType::Ipv4);
        assert_eq!(DisplayType::infer(&field("eth.dst"), none), DisplayType::Mac);
        assert_eq!(DisplayType::infer(&field("frame.ts"), none), DisplayType::Timestamp);
        assert_eq!(
            DisplayType::infer(&field("tcp.dport"), &[Value::Null, Value::Int(443)]),
            DisplayType::Int
        );
        assert_eq!(
            DisplayType::infer(&field("dns.qname"), &[Value::Str("a".into())]),
            DisplayType::Text
        );

        let avg = SelectItem::Aggregate(AggregateCall {
            function: AggregateFn::Avg,
            field: Some("frame.len".into()),
            alias: "avg(frame.len)".into(),
        });
        assert_eq!(DisplayType::infer(&avg, &[Value::Int(1)]), DisplayType::Float);
    }
}
