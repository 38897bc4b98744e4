// Range-scan cursor contract consumed by the scan unit.
#![allow(clippy::result_large_err)]

use async_trait::async_trait;

use crate::core::error::Error;
use crate::core::row::RawRow;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScanDirection {
    #[default]
    Forward,
    Reverse,
}

impl ScanDirection {
    /// True once `base_timestamp` has reached `boundary` in scan order.
    pub fn reached(self, base_timestamp: u32, boundary: u32) -> bool {
        match self {
            ScanDirection::Forward => base_timestamp >= boundary,
            ScanDirection::Reverse => base_timestamp <= boundary,
        }
    }
}

/// An open range scan over the data table.
///
/// `next_batch` returns rows in key order for the cursor's direction. An empty
/// batch means the range is exhausted. The scan unit owns the cursor exclusively
/// and calls `close` exactly once before reaching a terminal state.
#[async_trait]
pub trait Cursor: Send {
    async fn next_batch(&mut self) -> Result<Vec<RawRow>, Error>;

    async fn close(&mut self) -> Result<(), Error>;

    fn direction(&self) -> ScanDirection;
}
