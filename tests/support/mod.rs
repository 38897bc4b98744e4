// Shared fixtures for scan unit integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use tsscan::api::{
    CollectingSink, DecodedPoint, Error, MemoryCursor, MemoryNaming, MemoryTable, ResultsSink,
    RowKeyLayout, ScanGroup, ScanUnit, ScannerConfig, TagValueFilter, UniqueIdKind,
};

pub const BASE: u32 = 1_514_764_800;
pub const HOUR: u32 = 3600;

pub const METRIC: &[u8] = &[0, 0, 1];
pub const HOST: &[u8] = &[0, 0, 1];
pub const WEB01: &[u8] = &[0, 0, 1];
pub const WEB02: &[u8] = &[0, 0, 2];
/// Tag value id the naming fixture does not know.
pub const UNKNOWN: &[u8] = &[0, 0, 9];

pub fn naming() -> Arc<MemoryNaming> {
    Arc::new(
        MemoryNaming::new()
            .with(UniqueIdKind::Metric, METRIC, "sys.cpu.user")
            .with(UniqueIdKind::TagKey, HOST, "host")
            .with(UniqueIdKind::TagValue, WEB01, "web01")
            .with(UniqueIdKind::TagValue, WEB02, "web02"),
    )
}

pub fn row_key(hour: u32, tagv: &[u8]) -> Bytes {
    metric_row_key(METRIC, hour, tagv)
}

pub fn metric_row_key(metric: &[u8], hour: u32, tagv: &[u8]) -> Bytes {
    RowKeyLayout::default().encode(metric, BASE + hour * HOUR, &[(HOST, tagv)])
}

pub fn filtered_group(filter: TagValueFilter) -> Arc<ScanGroup> {
    Arc::new(ScanGroup::new().with_filter(Arc::new(filter)))
}

/// One single-sample numeric column per row, `hours` rows per tag value.
pub fn table(hours: u32, tagvs: &[&[u8]]) -> MemoryTable {
    let mut table = MemoryTable::new();
    for hour in 0..hours {
        for (idx, tagv) in tagvs.iter().enumerate() {
            let value = vec![((hour as u8) << 4) | idx as u8];
            table.put(row_key(hour, tagv), vec![0u8, 0], value);
        }
    }
    table
}

pub fn unit(group: &Arc<ScanGroup>, cursor: MemoryCursor, config: ScannerConfig) -> ScanUnit {
    ScanUnit::builder()
        .coordinator(group.clone())
        .cursor(cursor)
        .naming(naming())
        .config(config)
        .build()
        .expect("build scan unit")
}

/// Collects points and calls `hook` with the running total after every accepted point.
pub struct HookSink<F> {
    pub inner: CollectingSink,
    hook: F,
}

impl<F: FnMut(usize) + Send> HookSink<F> {
    pub fn new(hook: F) -> Self {
        Self {
            inner: CollectingSink::new(),
            hook,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn points(&self) -> &[DecodedPoint] {
        self.inner.points()
    }
}

impl<F: FnMut(usize) + Send> ResultsSink for HookSink<F> {
    fn add_point(&mut self, point: &DecodedPoint) -> Result<(), Error> {
        self.inner.add_point(point)?;
        (self.hook)(self.inner.len());
        Ok(())
    }
}

pub fn base_timestamps(points: &[DecodedPoint]) -> Vec<u32> {
    points.iter().map(|p| p.base_timestamp).collect()
}

pub fn tag_value(point: &DecodedPoint) -> &[u8] {
    &point.series_id[point.series_id.len() - 3..]
}
