//! Purpose: Decode a raw row's qualifier/value pairs into typed data points.
//! Exports: `decode_row`, `decode_columns`, `QualifierRule`, `NumericQualifier`, type-code constants.
//! Role: Pure decoding layer used by the scan unit; no I/O and no shared state.
//! Invariants: Qualifier length parity and leading byte fully determine the rule.
//! Invariants: Columns are emitted in ascending qualifier order; append sub-entries keep value order.
#![allow(clippy::result_large_err)]

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::core::error::{Error, ErrorKind};
use crate::core::row::{ColumnEntry, DecodedPoint, RawRow};
use crate::core::schema::RowKeyLayout;

pub const NUMERIC_TYPE: u8 = 0;
pub const APPEND_PREFIX: u8 = 5;
pub const APPEND_TYPE: u8 = APPEND_PREFIX;

const MS_BYTE_FLAG: u8 = 0xF0;
const FLAG_BITS: u32 = 4;
const MS_FLAG_BITS: u32 = 6;
const FLAGS_MASK: u8 = 0x0F;
const LENGTH_MASK: u8 = 0x07;
const FLAG_FLOAT: u8 = 0x08;
const MS_OFFSET_MASK: u32 = 0x0FFF_FFC0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QualifierRule {
    NumericPut,
    Append,
    Typed(u8),
}

impl QualifierRule {
    pub fn classify(qualifier: &[u8]) -> Result<Self, Error> {
        match qualifier {
            [] | [_] => Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("qualifier too short ({} bytes)", qualifier.len()))),
            q if q.len() % 2 == 0 => Ok(QualifierRule::NumericPut),
            [APPEND_PREFIX, ..] => Ok(QualifierRule::Append),
            [prefix, ..] => Ok(QualifierRule::Typed(*prefix)),
        }
    }

    pub fn type_code(self) -> u8 {
        match self {
            QualifierRule::NumericPut => NUMERIC_TYPE,
            QualifierRule::Append => APPEND_TYPE,
            QualifierRule::Typed(code) => code,
        }
    }
}

/// Offset, length and encoding of one numeric sample qualifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NumericQualifier {
    pub width: usize,
    pub offset_ms: u32,
    pub value_len: usize,
    pub is_float: bool,
}

impl NumericQualifier {
    /// Parses the leading qualifier of `bytes`; trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let Some(&first) = bytes.first() else {
            return Err(Error::new(ErrorKind::Corrupt).with_message("empty numeric qualifier"));
        };
        if first & MS_BYTE_FLAG == MS_BYTE_FLAG {
            if bytes.len() < 4 {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message("truncated millisecond qualifier"));
            }
            let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let flags = (raw as u8) & FLAGS_MASK;
            Ok(Self {
                width: 4,
                offset_ms: (raw & MS_OFFSET_MASK) >> MS_FLAG_BITS,
                value_len: usize::from(flags & LENGTH_MASK) + 1,
                is_float: flags & FLAG_FLOAT != 0,
            })
        } else {
            if bytes.len() < 2 {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message("truncated second qualifier"));
            }
            let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
            let flags = (raw as u8) & FLAGS_MASK;
            Ok(Self {
                width: 2,
                offset_ms: u32::from(raw >> FLAG_BITS) * 1000,
                value_len: usize::from(flags & LENGTH_MASK) + 1,
                is_float: flags & FLAG_FLOAT != 0,
            })
        }
    }
}

/// Decodes every column of `row`, resolving the key through `layout`.
pub fn decode_row(
    row: &RawRow,
    layout: &RowKeyLayout,
    type_filter: Option<&BTreeSet<u8>>,
) -> Result<Vec<DecodedPoint>, Error> {
    let key = layout.decode(&row.key)?;
    decode_columns(
        &row.columns,
        key.base_timestamp,
        &key.series_id(),
        type_filter,
    )
    .map_err(|err| err.with_row_key(&row.key))
}

pub fn decode_columns(
    columns: &[ColumnEntry],
    base_timestamp: u32,
    series_id: &Bytes,
    type_filter: Option<&BTreeSet<u8>>,
) -> Result<Vec<DecodedPoint>, Error> {
    let mut ordered: Vec<&ColumnEntry> = columns.iter().collect();
    ordered.sort_by(|a, b| a.qualifier.cmp(&b.qualifier));

    let mut points = Vec::with_capacity(ordered.len());
    for column in ordered {
        let rule = QualifierRule::classify(&column.qualifier)?;
        if let Some(allowed) = type_filter {
            if !allowed.contains(&rule.type_code()) {
                continue;
            }
        }
        match rule {
            QualifierRule::Append => {
                expand_append(&column.value, base_timestamp, series_id, &mut points)?
            }
            QualifierRule::NumericPut | QualifierRule::Typed(_) => points.push(DecodedPoint {
                base_timestamp,
                series_id: series_id.clone(),
                type_code: rule.type_code(),
                qualifier: column.qualifier.clone(),
                value: column.value.clone(),
            }),
        }
    }
    Ok(points)
}

fn expand_append(
    value: &Bytes,
    base_timestamp: u32,
    series_id: &Bytes,
    out: &mut Vec<DecodedPoint>,
) -> Result<(), Error> {
    let mut offset = 0;
    while offset < value.len() {
        let numeric = NumericQualifier::parse(&value[offset..])
            .map_err(|err| err.with_message("truncated append sub-qualifier"))?;
        let value_start = offset + numeric.width;
        let value_end = value_start + numeric.value_len;
        if value_end > value.len() {
            return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
                "append sub-value needs {} bytes at offset {value_start}, column has {}",
                numeric.value_len,
                value.len()
            )));
        }
        out.push(DecodedPoint {
            base_timestamp,
            series_id: series_id.clone(),
            type_code: APPEND_TYPE,
            qualifier: value.slice(offset..value_start),
            value: value.slice(value_start..value_end),
        });
        offset = value_end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        decode_columns, decode_row, NumericQualifier, QualifierRule, APPEND_TYPE, NUMERIC_TYPE,
    };
    use crate::core::error::ErrorKind;
    use crate::core::row::{ColumnEntry, RawRow};
    use crate::core::schema::RowKeyLayout;
    use bytes::Bytes;
    use std::collections::BTreeSet;

    const TS: u32 = 1_514_764_800;
    const ID: &[u8] = &[0, 0, 1];

    fn row(columns: Vec<ColumnEntry>) -> RawRow {
        let layout = RowKeyLayout::default();
        RawRow::new(layout.encode(ID, TS, &[(ID, ID)]), columns)
    }

    fn col(q: &'static [u8], v: &'static [u8]) -> ColumnEntry {
        ColumnEntry::new(Bytes::from_static(q), Bytes::from_static(v))
    }

    #[test]
    fn rule_table() {
        assert_eq!(QualifierRule::classify(&[0, 0]).unwrap(), QualifierRule::NumericPut);
        assert_eq!(
            QualifierRule::classify(&[0xF0, 0, 0, 0]).unwrap(),
            QualifierRule::NumericPut
        );
        assert_eq!(QualifierRule::classify(&[5, 0, 0]).unwrap(), QualifierRule::Append);
        assert_eq!(QualifierRule::classify(&[8, 2, 0]).unwrap(), QualifierRule::Typed(8));
        assert_eq!(QualifierRule::Typed(8).type_code(), 8);
        assert_eq!(QualifierRule::Append.type_code(), APPEND_TYPE);
        let err = QualifierRule::classify(&[1]).expect_err("too short");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn numeric_qualifier_flags() {
        // offset 10s, float, 4 bytes
        let q = NumericQualifier::parse(&[0x00, 0xAB]).expect("parse");
        assert_eq!(q.width, 2);
        assert_eq!(q.offset_ms, 10_000);
        assert!(q.is_float);
        assert_eq!(q.value_len, 4);
    }

    #[test]
    fn single_numeric_put() {
        let points = decode_row(&row(vec![col(&[0, 0], &[1])]), &RowKeyLayout::default(), None)
            .expect("decode");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].type_code, NUMERIC_TYPE);
        assert_eq!(points[0].base_timestamp, TS);
        assert_eq!(&points[0].qualifier[..], &[0, 0]);
        assert_eq!(&points[0].value[..], &[1]);
        assert_eq!(&points[0].series_id[..], &[0, 0, 1, 0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn multi_types_in_qualifier_order() {
        let points = decode_row(
            &row(vec![col(&[8, 2, 0], &[2]), col(&[0, 1], &[1]), col(&[5, 0, 0], &[0x00, 0x10, 3])]),
            &RowKeyLayout::default(),
            None,
        )
        .expect("decode");
        let codes: Vec<u8> = points.iter().map(|p| p.type_code).collect();
        assert_eq!(codes, vec![NUMERIC_TYPE, APPEND_TYPE, 8]);
    }

    #[test]
    fn type_filter_drops_other_columns() {
        let allowed = BTreeSet::from([8u8]);
        let points = decode_row(
            &row(vec![col(&[0, 1], &[1]), col(&[8, 2, 0], &[2]), col(&[5, 0, 0], &[0, 0, 3])]),
            &RowKeyLayout::default(),
            Some(&allowed),
        )
        .expect("decode");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].type_code, 8);

        let none = BTreeSet::from([1u8]);
        let points = decode_row(&row(vec![col(&[0, 0], &[1])]), &RowKeyLayout::default(), Some(&none))
            .expect("decode");
        assert!(points.is_empty());
    }

    #[test]
    fn append_expands_sub_entries() {
        // two 1-byte ints at offsets 0s and 1s
        let points = decode_row(
            &row(vec![col(&[5, 0, 0], &[0x00, 0x00, 7, 0x00, 0x10, 9])]),
            &RowKeyLayout::default(),
            None,
        )
        .expect("decode");
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.type_code == APPEND_TYPE));
        assert!(points.iter().all(|p| p.base_timestamp == TS));
        assert_eq!(&points[0].qualifier[..], &[0x00, 0x00]);
        assert_eq!(&points[0].value[..], &[7]);
        assert_eq!(&points[1].qualifier[..], &[0x00, 0x10]);
        assert_eq!(&points[1].value[..], &[9]);
        assert_eq!(points[1].sample_time_ms(), Some(u64::from(TS) * 1000 + 1000));
    }

    #[test]
    fn append_mixes_second_and_millisecond_entries() {
        let ms = (0xF000_0000u32 | (250 << 6) | 0x1).to_be_bytes();
        let mut value = vec![0x00, 0x01, 0xAA, 0xBB];
        value.extend_from_slice(&ms);
        value.extend_from_slice(&[0xCC, 0xDD]);
        let columns = vec![ColumnEntry::new(Bytes::from_static(&[5, 0, 0]), value)];
        let points = decode_columns(&columns, TS, &Bytes::from_static(&[1]), None).expect("decode");
        assert_eq!(points.len(), 2);
        assert_eq!(&points[0].value[..], &[0xAA, 0xBB]);
        assert_eq!(points[1].qualifier.len(), 4);
        assert_eq!(&points[1].value[..], &[0xCC, 0xDD]);
    }

    #[test]
    fn empty_append_yields_nothing() {
        let points = decode_columns(&[col(&[5, 0, 0], &[])], TS, &Bytes::new(), None)
            .expect("decode");
        assert!(points.is_empty());
    }

    #[test]
    fn truncated_append_is_corrupt() {
        // declares a 2-byte value but only one follows
        let err = decode_row(
            &row(vec![col(&[5, 0, 0], &[0x00, 0x01, 7])]),
            &RowKeyLayout::default(),
            None,
        )
        .expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(err.row_key().is_some());
    }
}
