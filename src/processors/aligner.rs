use crate::error::{Result, StatsError};
use crate::models::{FixedPoint, PaddedSeries, Series};

/// Pads a series to the backend's work-group granularity and strips the
/// padding off results again.
pub struct Aligner;

impl Aligner {
    /// Number of sentinel elements needed to reach the next multiple of
    /// `work_group_size`; zero when `len` is already aligned.
    pub fn pad_count(len: usize, work_group_size: usize) -> usize {
        match len % work_group_size {
            0 => 0,
            remainder => work_group_size - remainder,
        }
    }

    pub fn pad(
        series: &Series,
        work_group_size: usize,
        sentinel: FixedPoint,
    ) -> Result<PaddedSeries> {
        if work_group_size == 0 {
            return Err(StatsError::InvalidWorkGroupSize(work_group_size));
        }

        let original_len = series.len();
        let pad_count = Self::pad_count(original_len, work_group_size);

        let mut values = Vec::with_capacity(original_len + pad_count);
        values.extend_from_slice(series);
        values.resize(original_len + pad_count, sentinel);

        Ok(PaddedSeries::new(
            Series::new(values),
            original_len,
            work_group_size,
            sentinel,
        ))
    }

    /// Keep the first `original_len` elements. Only meaningful where padding
    /// still sits at the tail, such as reduction outputs.
    pub fn depad_by_length<T: Copy>(values: &[T], original_len: usize) -> Vec<T> {
        values[..original_len.min(values.len())].to_vec()
    }

    /// Wrap each element, marking padding as `None`.
    pub fn tag_padding(values: &Series, sentinel: FixedPoint) -> Vec<Option<FixedPoint>> {
        values
            .iter()
            .map(|&v| if v == sentinel { None } else { Some(v) })
            .collect()
    }

    /// Drop every padding element wherever it ended up, e.g. after sorting.
    pub fn depad_by_value(values: &Series, sentinel: FixedPoint) -> Series {
        Self::tag_padding(values, sentinel)
            .into_iter()
            .flatten()
            .collect()
    }
}
