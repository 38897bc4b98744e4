//! Purpose: Row scanning and decoding engine for a wide-column time-series store.
//! Exports: `api` (stable surface), `core` (codec, contracts, scan unit).
//! Role: Embedded by a query executor that owns one scan unit per range cursor.
//! Invariants: Prefer the `api` re-exports; `core` paths may move between releases.
pub mod api;
pub mod core;
