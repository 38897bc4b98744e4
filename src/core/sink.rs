// Results sink contract and a collecting implementation with optional capacity.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::row::DecodedPoint;

pub trait ResultsSink: Send {
    fn add_point(&mut self, point: &DecodedPoint) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct CollectingSink {
    points: Vec<DecodedPoint>,
    capacity: Option<usize>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every push after `capacity` points have been accepted.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            points: Vec::new(),
            capacity: Some(capacity),
        }
    }

    pub fn points(&self) -> &[DecodedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<DecodedPoint> {
        self.points
    }
}

impl ResultsSink for CollectingSink {
    fn add_point(&mut self, point: &DecodedPoint) -> Result<(), Error> {
        if let Some(capacity) = self.capacity {
            if self.points.len() >= capacity {
                return Err(Error::new(ErrorKind::Sink)
                    .with_message(format!("sink capacity of {capacity} points exceeded")));
            }
        }
        self.points.push(point.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectingSink, ResultsSink};
    use crate::core::error::ErrorKind;
    use crate::core::row::DecodedPoint;
    use bytes::Bytes;

    #[test]
    fn capacity_limit_rejects_overflow() {
        let point = DecodedPoint {
            base_timestamp: 0,
            series_id: Bytes::from_static(&[1]),
            type_code: 0,
            qualifier: Bytes::from_static(&[0, 0]),
            value: Bytes::from_static(&[1]),
        };
        let mut sink = CollectingSink::with_capacity_limit(1);
        sink.add_point(&point).expect("first");
        let err = sink.add_point(&point).expect_err("second");
        assert_eq!(err.kind(), ErrorKind::Sink);
        assert_eq!(sink.len(), 1);
    }
}
