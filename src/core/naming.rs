// Identifier-to-name resolution contract plus an in-memory implementation.
#![allow(clippy::result_large_err)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UniqueIdKind {
    Metric,
    TagKey,
    TagValue,
}

impl fmt::Display for UniqueIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UniqueIdKind::Metric => "metric",
            UniqueIdKind::TagKey => "tagk",
            UniqueIdKind::TagValue => "tagv",
        };
        f.write_str(label)
    }
}

/// Resolves binary unique ids to names.
///
/// Unknown ids must fail with `ErrorKind::NoSuchUniqueId`; any other error kind
/// is treated by the scan unit as a storage failure.
#[async_trait]
pub trait NamingService: Send + Sync {
    async fn resolve(&self, kind: UniqueIdKind, id: &[u8]) -> Result<String, Error>;
}

pub fn no_such_unique_id(kind: UniqueIdKind, id: &[u8]) -> Error {
    Error::new(ErrorKind::NoSuchUniqueId).with_message(format!(
        "no such {kind} id: {}",
        id.iter().map(|b| format!("{b:02x}")).collect::<String>()
    ))
}

#[derive(Debug, Default)]
pub struct MemoryNaming {
    names: HashMap<(UniqueIdKind, Bytes), String>,
    lookups: AtomicUsize,
}

impl MemoryNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: UniqueIdKind, id: impl Into<Bytes>, name: impl Into<String>) -> Self {
        self.insert(kind, id, name);
        self
    }

    pub fn insert(&mut self, kind: UniqueIdKind, id: impl Into<Bytes>, name: impl Into<String>) {
        self.names.insert((kind, id.into()), name.into());
    }

    /// Number of `resolve` calls served so far, hits and misses alike.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NamingService for MemoryNaming {
    async fn resolve(&self, kind: UniqueIdKind, id: &[u8]) -> Result<String, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.names
            .get(&(kind, Bytes::copy_from_slice(id)))
            .cloned()
            .ok_or_else(|| no_such_unique_id(kind, id))
    }
}
