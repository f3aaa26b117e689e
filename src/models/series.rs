use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::models::FixedPoint;

/// Ordered fixed-point readings. Stages never mutate a series in place; each
/// produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(Vec<FixedPoint>);

impl Series {
    pub fn new(values: Vec<FixedPoint>) -> Self {
        Self(values)
    }

    /// Build a series from already scaled integers.
    pub fn from_raw(raw: &[i32]) -> Self {
        Self(raw.iter().copied().map(FixedPoint::from_raw).collect())
    }

    pub fn to_raw(&self) -> Vec<i32> {
        self.0.iter().map(|v| v.raw()).collect()
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0] <= w[1])
    }
}

impl Deref for Series {
    type Target = [FixedPoint];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<FixedPoint>> for Series {
    fn from(values: Vec<FixedPoint>) -> Self {
        Self(values)
    }
}

impl FromIterator<FixedPoint> for Series {
    fn from_iter<I: IntoIterator<Item = FixedPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A series extended with sentinel elements up to a multiple of the
/// work-group size. Only the aligner constructs one, which keeps
/// `len() - pad_count() == original_len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedSeries {
    values: Series,
    original_len: usize,
    work_group_size: usize,
    sentinel: FixedPoint,
}

impl PaddedSeries {
    pub(crate) fn new(
        values: Series,
        original_len: usize,
        work_group_size: usize,
        sentinel: FixedPoint,
    ) -> Self {
        debug_assert!(values.len() >= original_len);
        debug_assert_eq!(values.len() % work_group_size, 0);
        Self {
            values,
            original_len,
            work_group_size,
            sentinel,
        }
    }

    pub fn values(&self) -> &Series {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn pad_count(&self) -> usize {
        self.values.len() - self.original_len
    }

    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    pub fn work_group_count(&self) -> usize {
        self.values.len() / self.work_group_size
    }

    pub fn sentinel(&self) -> FixedPoint {
        self.sentinel
    }
}
