//! Purpose: In-memory sorted table and range cursor implementing the `Cursor` contract.
//! Exports: `MemoryTable`, `MemoryCursor`, `CursorStats`, `ScanRange`.
//! Role: Reference store for embedding, examples and tests; mirrors a batched store scanner.
//! Invariants: Rows are kept in ascending key order; reverse scans walk the same range backwards.
//! Invariants: Start key is inclusive, stop key is exclusive, regardless of direction.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::cursor::{Cursor, ScanDirection};
use crate::core::error::{Error, ErrorKind};
use crate::core::row::{ColumnEntry, RawRow};

#[derive(Clone, Debug, Default)]
pub struct MemoryTable {
    rows: BTreeMap<Bytes, BTreeMap<Bytes, Bytes>>,
}

#[derive(Clone, Debug, Default)]
pub struct ScanRange {
    pub start: Option<Bytes>,
    pub stop: Option<Bytes>,
    pub direction: ScanDirection,
    pub max_rows: Option<usize>,
}

impl ScanRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, key: impl Into<Bytes>) -> Self {
        self.start = Some(key.into());
        self
    }

    pub fn stop(mut self, key: impl Into<Bytes>) -> Self {
        self.stop = Some(key.into());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.direction = ScanDirection::Reverse;
        self
    }

    pub fn max_rows(mut self, rows: usize) -> Self {
        self.max_rows = Some(rows);
        self
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Bytes>, qualifier: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.rows
            .entry(key.into())
            .or_default()
            .insert(qualifier.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Snapshots the requested range into a cursor.
    pub fn scan(&self, range: ScanRange) -> MemoryCursor {
        let lower = match &range.start {
            Some(start) => Bound::Included(start.clone()),
            None => Bound::Unbounded,
        };
        let upper = match &range.stop {
            Some(stop) => Bound::Excluded(stop.clone()),
            None => Bound::Unbounded,
        };
        let inverted = matches!(
            (&range.start, &range.stop),
            (Some(start), Some(stop)) if start > stop
        );
        let mut rows: Vec<RawRow> = if inverted {
            Vec::new()
        } else {
            self.rows
                .range((lower, upper))
                .map(|(key, columns)| {
                    RawRow::new(
                        key.clone(),
                        columns
                            .iter()
                            .map(|(q, v)| ColumnEntry::new(q.clone(), v.clone()))
                            .collect(),
                    )
                })
                .collect()
        };
        if range.direction == ScanDirection::Reverse {
            rows.reverse();
        }
        MemoryCursor {
            rows,
            position: 0,
            direction: range.direction,
            max_rows: range.max_rows.unwrap_or(usize::MAX).max(1),
            fail_on_fetch: None,
            stats: Arc::new(CursorStats::default()),
        }
    }
}

/// Observable counters shared between a cursor and whoever created it.
#[derive(Debug, Default)]
pub struct CursorStats {
    fetches: AtomicUsize,
    closes: AtomicUsize,
}

impl CursorStats {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    rows: Vec<RawRow>,
    position: usize,
    direction: ScanDirection,
    max_rows: usize,
    fail_on_fetch: Option<usize>,
    stats: Arc<CursorStats>,
}

impl MemoryCursor {
    pub fn stats(&self) -> Arc<CursorStats> {
        Arc::clone(&self.stats)
    }

    /// Makes the `n`th batch request (1-based) fail with a storage error.
    pub fn fail_on_fetch(mut self, n: usize) -> Self {
        self.fail_on_fetch = Some(n);
        self
    }
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Vec<RawRow>, Error> {
        let fetch = self.stats.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stats.closes() > 0 {
            return Err(Error::new(ErrorKind::Storage).with_message("scanner already closed"));
        }
        tokio::task::yield_now().await;
        if self.fail_on_fetch == Some(fetch) {
            return Err(Error::new(ErrorKind::Storage)
                .with_message(format!("injected failure on fetch {fetch}")));
        }
        let end = self.position.saturating_add(self.max_rows).min(self.rows.len());
        let batch = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn direction(&self) -> ScanDirection {
        self.direction
    }
}
