//! Purpose: Describe and decode the binary row-key layout of the data table.
//! Exports: `RowKeyLayout`, `RowKey`, `TIMESTAMP_BYTES`.
//! Role: Pure decoding used by the codec and the scan unit; no I/O.
//! Invariants: Layout is `[salt][metric][timestamp:4 BE][tagk tagv]*`.
//! Invariants: Tag pairs keep the order they were written in (sorted by tag-key id).
#![allow(clippy::result_large_err)]

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

pub const TIMESTAMP_BYTES: usize = 4;
const MAX_ID_WIDTH: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowKeyLayout {
    pub salt_width: usize,
    pub metric_width: usize,
    pub tagk_width: usize,
    pub tagv_width: usize,
}

impl Default for RowKeyLayout {
    fn default() -> Self {
        Self {
            salt_width: 0,
            metric_width: 3,
            tagk_width: 3,
            tagv_width: 3,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowKey {
    pub salt: Bytes,
    pub metric: Bytes,
    pub base_timestamp: u32,
    pub tags: Vec<(Bytes, Bytes)>,
}

impl RowKeyLayout {
    pub fn validate(&self) -> Result<(), Error> {
        if self.salt_width > MAX_ID_WIDTH {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("salt width must be at most {MAX_ID_WIDTH}")));
        }
        for (name, width) in [
            ("metric", self.metric_width),
            ("tagk", self.tagk_width),
            ("tagv", self.tagv_width),
        ] {
            if width == 0 || width > MAX_ID_WIDTH {
                return Err(Error::new(ErrorKind::Usage).with_message(format!(
                    "{name} width must be between 1 and {MAX_ID_WIDTH}, got {width}"
                )));
            }
        }
        Ok(())
    }

    fn prefix_len(&self) -> usize {
        self.salt_width + self.metric_width + TIMESTAMP_BYTES
    }

    fn pair_len(&self) -> usize {
        self.tagk_width + self.tagv_width
    }

    /// Reads only the base timestamp; cheaper than a full decode for boundary checks.
    pub fn base_timestamp(&self, key: &[u8]) -> Result<u32, Error> {
        let start = self.salt_width + self.metric_width;
        if key.len() < start + TIMESTAMP_BYTES {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("row key shorter than timestamp prefix")
                .with_row_key(key));
        }
        let mut ts = [0u8; TIMESTAMP_BYTES];
        ts.copy_from_slice(&key[start..start + TIMESTAMP_BYTES]);
        Ok(u32::from_be_bytes(ts))
    }

    pub fn decode(&self, key: &Bytes) -> Result<RowKey, Error> {
        let prefix = self.prefix_len();
        if key.len() < prefix {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("row key shorter than timestamp prefix")
                .with_row_key(key));
        }
        if self.pair_len() == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("row key layout has zero-width tag ids")
                .with_row_key(key));
        }
        let remainder = key.len() - prefix;
        if remainder % self.pair_len() != 0 {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("row key tags are not whole tag pairs")
                .with_row_key(key));
        }

        let salt = key.slice(0..self.salt_width);
        let metric_end = self.salt_width + self.metric_width;
        let metric = key.slice(self.salt_width..metric_end);
        let base_timestamp = self.base_timestamp(key)?;

        let mut tags = Vec::with_capacity(remainder / self.pair_len());
        let mut offset = prefix;
        while offset < key.len() {
            let tagk = key.slice(offset..offset + self.tagk_width);
            offset += self.tagk_width;
            let tagv = key.slice(offset..offset + self.tagv_width);
            offset += self.tagv_width;
            tags.push((tagk, tagv));
        }

        Ok(RowKey {
            salt,
            metric,
            base_timestamp,
            tags,
        })
    }

    pub fn encode(&self, metric: &[u8], base_timestamp: u32, tags: &[(&[u8], &[u8])]) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.prefix_len() + tags.len() * self.pair_len());
        buf.put_bytes(0, self.salt_width);
        buf.put_slice(metric);
        buf.put_u32(base_timestamp);
        for (tagk, tagv) in tags {
            buf.put_slice(tagk);
            buf.put_slice(tagv);
        }
        buf.freeze()
    }
}

impl RowKey {
    /// Series identifier: metric id followed by the tag pairs, without salt or timestamp.
    pub fn series_id(&self) -> Bytes {
        let len = self.metric.len()
            + self
                .tags
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>();
        let mut buf = BytesMut::with_capacity(len);
        buf.put_slice(&self.metric);
        for (tagk, tagv) in &self.tags {
            buf.put_slice(tagk);
            buf.put_slice(tagv);
        }
        buf.freeze()
    }
}
