//! Purpose: Drive one range-scan cursor through filtering, decoding and flow control.
//! Exports: `ScanUnit`, `ScanUnitBuilder`, `ScanState`.
//! Role: One unit per cursor (e.g. per salt bucket); the coordinator sequences the group.
//! Invariants: Buffered rows are replayed before any new batch is requested.
//! Invariants: A row that has been emitted is never buffered; a buffered row has emitted nothing.
//! Invariants: Terminal states close the cursor first and notify the coordinator exactly once.
//! Notes: Coordinator signals are re-read at every checkpoint and at the top of every row.
#![allow(clippy::result_large_err)]

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, Span, debug, trace, warn};

use crate::core::codec;
use crate::core::config::ScannerConfig;
use crate::core::coordinator::Coordinator;
use crate::core::cursor::Cursor;
use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{ResolvedSeries, TagFilter};
use crate::core::naming::{NamingService, UniqueIdKind};
use crate::core::row::RawRow;
use crate::core::schema::RowKey;
use crate::core::sink::ResultsSink;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    Initialized,
    Continue,
    Complete,
    Exception,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Complete | ScanState::Exception)
    }
}

enum Stop {
    Paused,
    PeerFailed,
}

#[derive(Default)]
pub struct ScanUnitBuilder {
    coordinator: Option<Arc<dyn Coordinator>>,
    cursor: Option<Box<dyn Cursor>>,
    naming: Option<Arc<dyn NamingService>>,
    config: ScannerConfig,
    bucket: usize,
}

impl ScanUnitBuilder {
    pub fn coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn cursor<C: Cursor + 'static>(mut self, cursor: C) -> Self {
        self.cursor = Some(Box::new(cursor));
        self
    }

    /// Needed only when the coordinator supplies a tag filter.
    pub fn naming(mut self, naming: Arc<dyn NamingService>) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bucket(mut self, bucket: usize) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn build(self) -> Result<ScanUnit, Error> {
        let coordinator = self.coordinator.ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("scan unit requires a coordinator")
        })?;
        let cursor = self
            .cursor
            .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("scan unit requires a cursor"))?;
        self.config.validate()?;
        Ok(ScanUnit {
            bucket: self.bucket,
            coordinator,
            cursor,
            naming: self.naming,
            config: self.config,
            state: ScanState::Initialized,
            last_error: None,
            buffer: Vec::new(),
            keepers: HashSet::new(),
            skips: HashSet::new(),
            resolved: HashMap::new(),
        })
    }
}

pub struct ScanUnit {
    bucket: usize,
    coordinator: Arc<dyn Coordinator>,
    cursor: Box<dyn Cursor>,
    naming: Option<Arc<dyn NamingService>>,
    config: ScannerConfig,
    state: ScanState,
    last_error: Option<ErrorKind>,
    buffer: Vec<RawRow>,
    // filter verdicts per series id, kept across pauses
    keepers: HashSet<Bytes>,
    skips: HashSet<Bytes>,
    resolved: HashMap<(UniqueIdKind, Bytes), String>,
}

impl fmt::Debug for ScanUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanUnit")
            .field("bucket", &self.bucket)
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("keepers", &self.keepers.len())
            .field("skips", &self.skips.len())
            .finish()
    }
}

impl ScanUnit {
    pub fn builder() -> ScanUnitBuilder {
        ScanUnitBuilder::default()
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Rows held back by the last pause, oldest first.
    pub fn pending_buffer(&self) -> &[RawRow] {
        &self.buffer
    }

    pub fn keepers(&self) -> usize {
        self.keepers.len()
    }

    pub fn skips(&self) -> usize {
        self.skips.len()
    }

    /// Runs the unit until it pauses, exhausts its cursor or fails.
    ///
    /// Every call that does work ends with exactly one coordinator notification:
    /// `notify_done` for pauses and completion, `notify_exception` for this
    /// unit's own failures. Calls made after a terminal state do nothing.
    pub async fn fetch_next(
        &mut self,
        sink: &mut dyn ResultsSink,
        trace: Option<&Span>,
    ) -> ScanState {
        if self.state.is_terminal() {
            return self.state;
        }
        let span = match trace {
            Some(parent) => tracing::debug_span!(
                parent: parent,
                "scan_unit",
                bucket = self.bucket,
                status = tracing::field::Empty
            ),
            None => tracing::debug_span!(
                "scan_unit",
                bucket = self.bucket,
                status = tracing::field::Empty
            ),
        };
        let state = self.run(sink).instrument(span.clone()).await;
        span.record("status", self.status_label());
        state
    }

    async fn run(&mut self, sink: &mut dyn ResultsSink) -> ScanState {
        if let Some(state) = self.checkpoint().await {
            return state;
        }

        if !self.buffer.is_empty() {
            let rows = std::mem::take(&mut self.buffer);
            debug!(rows = rows.len(), "replaying buffered rows");
            match self.process_rows(rows, sink).await {
                Ok(None) => {}
                Ok(Some(stop)) => return self.stop(stop).await,
                Err(err) => return self.fail(err).await,
            }
        }

        loop {
            if let Some(state) = self.checkpoint().await {
                return state;
            }
            let batch = match self.cursor.next_batch().await {
                Ok(batch) => batch,
                Err(err) => return self.fail(err.reclassify(ErrorKind::Storage)).await,
            };
            if batch.is_empty() {
                return self.complete().await;
            }
            trace!(rows = batch.len(), "batch received");
            match self.process_rows(batch, sink).await {
                Ok(None) => {}
                Ok(Some(stop)) => return self.stop(stop).await,
                Err(err) => return self.fail(err).await,
            }
        }
    }

    async fn checkpoint(&mut self) -> Option<ScanState> {
        if self.coordinator.has_fatal_error() {
            debug!("scan group already failed, standing down");
            return Some(self.complete().await);
        }
        if self.coordinator.is_full() {
            return Some(self.pause());
        }
        None
    }

    async fn process_rows(
        &mut self,
        mut rows: Vec<RawRow>,
        sink: &mut dyn ResultsSink,
    ) -> Result<Option<Stop>, Error> {
        let filter = self.coordinator.filter();
        let direction = self.cursor.direction();

        for idx in 0..rows.len() {
            if self.coordinator.has_fatal_error() {
                debug!("scan group failed mid-batch, standing down");
                return Ok(Some(Stop::PeerFailed));
            }
            if self.coordinator.is_full() {
                self.buffer = rows.split_off(idx);
                return Ok(Some(Stop::Paused));
            }

            let key = self.config.row_key.decode(&rows[idx].key)?;
            if let Some(boundary) = self.coordinator.sequence_boundary() {
                if direction.reached(key.base_timestamp, boundary) {
                    trace!(base_timestamp = key.base_timestamp, boundary, "sequence boundary reached");
                    self.buffer = rows.split_off(idx);
                    return Ok(Some(Stop::Paused));
                }
            }

            let row = &rows[idx];
            let series_id = key.series_id();
            if let Some(filter) = &filter {
                if !self.admit(filter.as_ref(), &key, &series_id, row).await? {
                    continue;
                }
            }

            let points = codec::decode_columns(
                &row.columns,
                key.base_timestamp,
                &series_id,
                self.config.data_types.as_ref(),
            )
            .map_err(|err| err.with_row_key(&row.key))?;
            for point in &points {
                sink.add_point(point)
                    .map_err(|err| err.reclassify(ErrorKind::Sink).with_row_key(&row.key))?;
            }
        }
        Ok(None)
    }

    async fn admit(
        &mut self,
        filter: &dyn TagFilter,
        key: &RowKey,
        series_id: &Bytes,
        row: &RawRow,
    ) -> Result<bool, Error> {
        if self.keepers.contains(series_id) {
            return Ok(true);
        }
        if self.skips.contains(series_id) {
            return Ok(false);
        }
        let series = match self.resolve_series(key).await {
            Ok(series) => series,
            Err(err) if err.kind() == ErrorKind::NoSuchUniqueId && self.config.skip_nsui => {
                warn!(error = %err, bucket = self.bucket, "skipping series with unresolvable id");
                self.skips.insert(series_id.clone());
                return Ok(false);
            }
            Err(err) => return Err(err.with_row_key(&row.key)),
        };
        let keep = filter.matches(&series);
        if keep {
            self.keepers.insert(series_id.clone());
        } else {
            self.skips.insert(series_id.clone());
        }
        Ok(keep)
    }

    async fn resolve_series(&mut self, key: &RowKey) -> Result<ResolvedSeries, Error> {
        let naming = self.naming.clone().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("tag filter set but no naming service configured")
        })?;
        let mut series = ResolvedSeries {
            metric: self.resolve(naming.as_ref(), UniqueIdKind::Metric, &key.metric).await?,
            ..ResolvedSeries::default()
        };
        for (tagk, tagv) in &key.tags {
            let name = self.resolve(naming.as_ref(), UniqueIdKind::TagKey, tagk).await?;
            let value = self.resolve(naming.as_ref(), UniqueIdKind::TagValue, tagv).await?;
            series.tags.insert(name, value);
        }
        Ok(series)
    }

    async fn resolve(
        &mut self,
        naming: &dyn NamingService,
        kind: UniqueIdKind,
        id: &Bytes,
    ) -> Result<String, Error> {
        let cache_key = (kind, id.clone());
        if let Some(name) = self.resolved.get(&cache_key) {
            return Ok(name.clone());
        }
        let name = naming.resolve(kind, id).await.map_err(|err| match err.kind() {
            ErrorKind::NoSuchUniqueId => err,
            _ => err.reclassify(ErrorKind::Storage),
        })?;
        self.resolved.insert(cache_key, name.clone());
        Ok(name)
    }

    async fn stop(&mut self, stop: Stop) -> ScanState {
        match stop {
            Stop::Paused => self.pause(),
            Stop::PeerFailed => self.complete().await,
        }
    }

    fn pause(&mut self) -> ScanState {
        self.state = ScanState::Continue;
        debug!(buffered = self.buffer.len(), "scan paused");
        self.coordinator.notify_done();
        self.state
    }

    async fn complete(&mut self) -> ScanState {
        self.close_cursor().await;
        self.clear();
        self.state = ScanState::Complete;
        debug!("scan complete");
        self.coordinator.notify_done();
        self.state
    }

    async fn fail(&mut self, err: Error) -> ScanState {
        self.close_cursor().await;
        self.clear();
        self.state = ScanState::Exception;
        self.last_error = Some(err.kind());
        debug!(error = %err, "scan failed");
        self.coordinator.notify_exception(err);
        self.state
    }

    async fn close_cursor(&mut self) {
        if let Err(err) = self.cursor.close().await {
            warn!(error = %err, bucket = self.bucket, "failed to close scanner");
        }
    }

    fn clear(&mut self) {
        self.buffer = Vec::new();
        self.keepers.clear();
        self.skips.clear();
        self.resolved.clear();
    }

    fn status_label(&self) -> &'static str {
        match self.state {
            ScanState::Initialized => "INITIALIZED",
            ScanState::Continue => "PAUSED",
            ScanState::Complete => "OK",
            ScanState::Exception => self.last_error.map_or("ERROR", ErrorKind::as_str),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanState, ScanUnit};
    use crate::core::coordinator::ScanGroup;
    use crate::core::error::ErrorKind;
    use crate::core::memory::{MemoryTable, ScanRange};
    use std::sync::Arc;

    #[test]
    fn builder_requires_coordinator_and_cursor() {
        let err = ScanUnit::builder()
            .cursor(MemoryTable::new().scan(ScanRange::new()))
            .build()
            .expect_err("no coordinator");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = ScanUnit::builder()
            .coordinator(Arc::new(ScanGroup::new()))
            .build()
            .expect_err("no cursor");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let unit = ScanUnit::builder()
            .coordinator(Arc::new(ScanGroup::new()))
            .cursor(MemoryTable::new().scan(ScanRange::new()))
            .bucket(3)
            .build()
            .expect("build");
        assert_eq!(unit.state(), ScanState::Initialized);
        assert_eq!(unit.bucket(), 3);
        assert!(unit.pending_buffer().is_empty());
    }

    #[test]
    fn terminal_states() {
        assert!(!ScanState::Initialized.is_terminal());
        assert!(!ScanState::Continue.is_terminal());
        assert!(ScanState::Complete.is_terminal());
        assert!(ScanState::Exception.is_terminal());
    }
}
