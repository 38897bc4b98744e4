//! Purpose: Contract between scan units and the component that owns their scan group.
//! Exports: `Coordinator`, `ScanGroup`.
//! Role: Scan units read flow-control signals here and report their outcomes here.
//! Invariants: Signals are re-read at every checkpoint; scan units never cache them.
//! Invariants: A failure is reported once, by the unit that detected it; peers stand down.
#![allow(clippy::result_large_err)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::TagFilter;

pub trait Coordinator: Send + Sync {
    /// The shared result buffer cannot take more points right now.
    fn is_full(&self) -> bool;

    /// Some unit in the group has already failed.
    fn has_fatal_error(&self) -> bool;

    /// Base timestamp at which every unit in the group pauses, if set.
    fn sequence_boundary(&self) -> Option<u32>;

    fn filter(&self) -> Option<Arc<dyn TagFilter>>;

    fn notify_done(&self);

    fn notify_exception(&self, error: Error);
}

const NO_BOUNDARY: u64 = u64::MAX;

/// Lock-free group state shared by every scan unit of one query.
#[derive(Debug)]
pub struct ScanGroup {
    full: AtomicBool,
    fatal: AtomicBool,
    boundary: AtomicU64,
    filter: Option<Arc<dyn TagFilter>>,
    done: AtomicUsize,
    exceptions: AtomicUsize,
    first_error: Mutex<Option<(ErrorKind, String)>>,
}

impl Default for ScanGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanGroup {
    pub fn new() -> Self {
        Self {
            full: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
            boundary: AtomicU64::new(NO_BOUNDARY),
            filter: None,
            done: AtomicUsize::new(0),
            exceptions: AtomicUsize::new(0),
            first_error: Mutex::new(None),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn TagFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn set_full(&self, full: bool) {
        self.full.store(full, Ordering::SeqCst);
    }

    pub fn set_fatal_error(&self) {
        self.fatal.store(true, Ordering::SeqCst);
    }

    pub fn set_sequence_boundary(&self, boundary: Option<u32>) {
        let raw = boundary.map_or(NO_BOUNDARY, u64::from);
        self.boundary.store(raw, Ordering::SeqCst);
    }

    pub fn done_count(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn exception_count(&self) -> usize {
        self.exceptions.load(Ordering::SeqCst)
    }

    /// Kind and rendered message of the first reported exception.
    pub fn first_error(&self) -> Option<(ErrorKind, String)> {
        self.first_error
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl Coordinator for ScanGroup {
    fn is_full(&self) -> bool {
        self.full.load(Ordering::SeqCst)
    }

    fn has_fatal_error(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    fn sequence_boundary(&self) -> Option<u32> {
        match self.boundary.load(Ordering::SeqCst) {
            NO_BOUNDARY => None,
            raw => u32::try_from(raw).ok(),
        }
    }

    fn filter(&self) -> Option<Arc<dyn TagFilter>> {
        self.filter.clone()
    }

    fn notify_done(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_exception(&self, error: Error) {
        self.exceptions.fetch_add(1, Ordering::SeqCst);
        let mut first = self
            .first_error
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        if first.is_none() {
            *first = Some((error.kind(), error.to_string()));
        }
        self.fatal.store(true, Ordering::SeqCst);
    }
}
