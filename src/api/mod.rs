//! Purpose: Define the stable public Rust API boundary for the scan engine.
//! Exports: Scan unit, collaborator contracts, reference collaborators and the codec.
//! Role: Public, additive-only surface; callers should not need `crate::core` paths.
//! Invariants: Everything a query executor needs to drive a scan group is re-exported here.

mod logging;

pub use crate::core::codec::{
    APPEND_TYPE, NUMERIC_TYPE, NumericQualifier, QualifierRule, decode_columns, decode_row,
};
pub use crate::core::config::ScannerConfig;
pub use crate::core::coordinator::{Coordinator, ScanGroup};
pub use crate::core::cursor::{Cursor, ScanDirection};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::filter::{
    FilterChain, MatchKind, ResolvedSeries, ResolvedTags, TagFilter, TagFilterSpec, TagValueFilter,
    compile_filter,
};
pub use crate::core::memory::{CursorStats, MemoryCursor, MemoryTable, ScanRange};
pub use crate::core::naming::{MemoryNaming, NamingService, UniqueIdKind, no_such_unique_id};
pub use crate::core::row::{ColumnEntry, DecodedPoint, RawRow};
pub use crate::core::scanner::{ScanState, ScanUnit, ScanUnitBuilder};
pub use crate::core::schema::{RowKey, RowKeyLayout};
pub use crate::core::sink::{CollectingSink, ResultsSink};
pub use logging::init_tracing;
