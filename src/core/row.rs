// Raw rows as delivered by the store and the decoded points handed to a sink.
use bytes::Bytes;

use crate::core::codec::{self, APPEND_TYPE, NUMERIC_TYPE};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnEntry {
    pub qualifier: Bytes,
    pub value: Bytes,
}

impl ColumnEntry {
    pub fn new(qualifier: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }
}

/// One row key and its columns, in the order the store returned them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRow {
    pub key: Bytes,
    pub columns: Vec<ColumnEntry>,
}

impl RawRow {
    pub fn new(key: impl Into<Bytes>, columns: Vec<ColumnEntry>) -> Self {
        Self {
            key: key.into(),
            columns,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedPoint {
    pub base_timestamp: u32,
    pub series_id: Bytes,
    pub type_code: u8,
    pub qualifier: Bytes,
    pub value: Bytes,
}

impl DecodedPoint {
    /// Absolute sample time in milliseconds for numeric and append points.
    ///
    /// Other type codes carry offsets in a type-specific layout and return `None`,
    /// as do compacted numeric columns holding more than one sample.
    pub fn sample_time_ms(&self) -> Option<u64> {
        if self.type_code != NUMERIC_TYPE && self.type_code != APPEND_TYPE {
            return None;
        }
        let numeric = codec::NumericQualifier::parse(&self.qualifier).ok()?;
        if numeric.width != self.qualifier.len() {
            return None;
        }
        Some(u64::from(self.base_timestamp) * 1000 + u64::from(numeric.offset_ms))
    }
}
