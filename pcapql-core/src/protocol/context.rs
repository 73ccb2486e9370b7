//! Parse context and result types.

use smallvec::SmallVec;

use super::FieldValue;

/// Field entry for parse results: (field_name, value).
pub type FieldEntry<'data> = (&'static str, FieldValue<'data>);

/// Hint entry for child protocol detection: (hint_name, value).
pub type HintEntry = (&'static str, u64);

/// Context passed down the parsing chain.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Link type from the segment header (1 = Ethernet).
    pub link_type: u16,

    /// Protocol that handed the bytes to the current parser.
    pub parent_protocol: Option<&'static str>,

    /// Hints from the parent (ethertype, ip_protocol, ports).
    pub hints: SmallVec<[HintEntry; 4]>,

    /// Offset into the frame where the current layer starts.
    pub offset: usize,
}

impl ParseContext {
    pub fn new(link_type: u16) -> Self {
        Self {
            link_type,
            parent_protocol: None,
            hints: SmallVec::new(),
            offset: 0,
        }
    }

    /// Get a hint value by key.
    #[inline]
    pub fn hint(&self, key: &str) -> Option<u64> {
        self.hints.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// Insert a hint value (appends, may create duplicates).
    #[inline]
    pub fn insert_hint(&mut self, key: &'static str, value: u64) {
        self.hints.push((key, value));
    }

    /// True at the start of the frame.
    pub fn is_root(&self) -> bool {
        self.parent_protocol.is_none()
    }
}

/// Result of parsing one protocol layer.
#[derive(Debug, Clone)]
pub struct ParseResult<'data> {
    /// Extracted field values.
    pub fields: SmallVec<[FieldEntry<'data>; 16]>,

    /// Bytes left for the next layer.
    pub remaining: &'data [u8],

    /// Hints for child protocol identification.
    pub child_hints: SmallVec<[HintEntry; 4]>,

    /// Parse error if the layer was malformed or truncated.
    pub error: Option<String>,
}

impl<'data> ParseResult<'data> {
    pub fn success(
        fields: SmallVec<[FieldEntry<'data>; 16]>,
        remaining: &'data [u8],
        child_hints: SmallVec<[HintEntry; 4]>,
    ) -> Self {
        Self {
            fields,
            remaining,
            child_hints,
            error: None,
        }
    }

    pub fn error(error: String, remaining: &'data [u8]) -> Self {
        Self {
            fields: SmallVec::new(),
            remaining,
            child_hints: SmallVec::new(),
            error: Some(error),
        }
    }

    /// A result with the fields decoded before the error was hit.
    pub fn partial(
        fields: SmallVec<[FieldEntry<'data>; 16]>,
        remaining: &'data [u8],
        error: String,
    ) -> Self {
        Self {
            fields,
            remaining,
            child_hints: SmallVec::new(),
            error: Some(error),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue<'data>> {
        self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// Get a child hint value by name.
    pub fn hint(&self, name: &str) -> Option<u64> {
        self.child_hints
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
