use crate::error::{Result, StatsError};
use crate::models::{FixedPoint, Series};
use crate::utils::constants::{FIXED_POINT_SCALE, MEDIAN_RANK, Q1_RANK, Q3_RANK};

/// Interprets raw kernel outputs for a series of `count` real readings.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsAggregator {
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

impl StatisticsAggregator {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(StatsError::EmptyDataset);
        }
        Ok(Self { count })
    }

    /// Reductions deposit their aggregate at index 0.
    fn aggregate(raw: &[i64]) -> Result<i64> {
        raw.first().copied().ok_or_else(|| {
            StatsError::BackendDispatch("reduction returned an empty buffer".to_string())
        })
    }

    pub fn minimum(&self, raw: &[i64]) -> Result<f64> {
        match Self::aggregate(raw)? {
            i64::MAX => Err(StatsError::EmptyDataset),
            min => Ok(FixedPoint::decode_raw(min)),
        }
    }

    pub fn maximum(&self, raw: &[i64]) -> Result<f64> {
        match Self::aggregate(raw)? {
            i64::MIN => Err(StatsError::EmptyDataset),
            max => Ok(FixedPoint::decode_raw(max)),
        }
    }

    pub fn mean(&self, raw_sum: &[i64]) -> Result<f64> {
        Ok(FixedPoint::decode_raw(Self::aggregate(raw_sum)?) / self.count as f64)
    }

    /// The mean still in fixed-point form, as handed to `varianceReduce`.
    pub fn integer_mean(&self, raw_sum: &[i64]) -> Result<FixedPoint> {
        let mean = (Self::aggregate(raw_sum)? as f64 / self.count as f64).round();
        Ok(FixedPoint::from_raw(mean as i32))
    }

    /// Population standard deviation from a sum of squared deviations at
    /// scale `FIXED_POINT_SCALE²`.
    pub fn std_dev(&self, raw_squared_deviations: &[i64]) -> Result<f64> {
        let sum = Self::aggregate(raw_squared_deviations)?;
        if sum < 0 {
            return Err(StatsError::BackendDispatch(format!(
                "negative sum of squared deviations: {}",
                sum
            )));
        }
        Ok((sum as f64 / self.count as f64).sqrt() / FIXED_POINT_SCALE as f64)
    }

    /// Index of the `fraction` rank statistic, `round(count * fraction)`
    /// rounded half away from zero and clamped to the last element.
    pub fn rank_index(&self, fraction: f64) -> usize {
        let index = (self.count as f64 * fraction).round() as usize;
        index.min(self.count - 1)
    }

    pub fn quantile(&self, sorted: &Series, fraction: f64) -> Result<f64> {
        if sorted.len() != self.count {
            return Err(StatsError::BackendDispatch(format!(
                "sorted series has {} elements after depadding, expected {}",
                sorted.len(),
                self.count
            )));
        }
        Ok(sorted[self.rank_index(fraction)].decode())
    }

    pub fn quartiles(&self, sorted: &Series) -> Result<Quartiles> {
        Ok(Quartiles {
            q1: self.quantile(sorted, Q1_RANK)?,
            median: self.quantile(sorted, MEDIAN_RANK)?,
            q3: self.quantile(sorted, Q3_RANK)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_count_rejected() {
        assert!(matches!(
            StatisticsAggregator::new(0),
            Err(StatsError::EmptyDataset)
        ));
    }

    #[test]
    fn test_scalar_results() {
        let agg = StatisticsAggregator::new(3).unwrap();
        assert_eq!(agg.minimum(&[1000, 0, 0]).unwrap(), 10.0);
        assert_eq!(agg.maximum(&[3000]).unwrap(), 30.0);
        assert_eq!(agg.mean(&[6000, 0, 0]).unwrap(), 20.0);
        assert_eq!(agg.integer_mean(&[6001]).unwrap(), FixedPoint::from_raw(2000));
        assert_eq!(agg.integer_mean(&[-6005]).unwrap(), FixedPoint::from_raw(-2002));
    }

    #[test]
    fn test_identity_left_in_output_means_no_data() {
        let agg = StatisticsAggregator::new(1).unwrap();
        assert!(agg.minimum(&[i64::MAX]).is_err());
        assert!(agg.maximum(&[i64::MIN]).is_err());
        assert!(agg.minimum(&[]).is_err());
    }

    #[test]
    fn test_std_dev_compensates_squared_scale() {
        // readings 10, 20, 30: squared deviations 1000² + 0 + 1000²
        let agg = StatisticsAggregator::new(3).unwrap();
        let sd = agg.std_dev(&[2_000_000]).unwrap();
        assert!((sd - (200.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_rank_indices() {
        let agg = StatisticsAggregator::new(5).unwrap();
        assert_eq!(agg.rank_index(MEDIAN_RANK), 3);
        assert_eq!(agg.rank_index(Q1_RANK), 1);
        assert_eq!(agg.rank_index(Q3_RANK), 4);

        // round(2 * 0.75) = 2 would fall off the end
        let small = StatisticsAggregator::new(2).unwrap();
        assert_eq!(small.rank_index(Q3_RANK), 1);
        assert_eq!(small.rank_index(MEDIAN_RANK), 1);
    }

    #[test]
    fn test_quartiles_of_sorted_series() {
        let agg = StatisticsAggregator::new(5).unwrap();
        let sorted = Series::from_raw(&[100, 200, 300, 400, 500]);
        let q = agg.quartiles(&sorted).unwrap();
        assert_eq!(q.median, 4.0);
        assert_eq!(q.q1, 2.0);
        assert_eq!(q.q3, 5.0);
    }

    #[test]
    fn test_quantile_rejects_wrong_length() {
        let agg = StatisticsAggregator::new(4).unwrap();
        assert!(agg
            .quantile(&Series::from_raw(&[1, 2, 3]), MEDIAN_RANK)
            .is_err());
    }
}
