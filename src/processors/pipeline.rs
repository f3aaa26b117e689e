use tracing::{debug, info, info_span};

use crate::compute::{ComputeBackend, ComputeSession};
use crate::error::{Result, StatsError};
use crate::models::{DatasetSummary, FixedPoint, RunReport, Series, StatisticsReport};
use crate::processors::{Aligner, StatisticsAggregator};
use crate::utils::constants::DEFAULT_WORK_GROUP_SIZE;
use crate::utils::progress::ProgressReporter;

/// Drives one statistics run: pad, upload once, four reductions, one sort,
/// then turns the raw outputs into a report.
pub struct StatisticsPipeline {
    work_group_size: usize,
}

impl StatisticsPipeline {
    pub fn new(work_group_size: usize) -> Self {
        Self { work_group_size }
    }

    pub fn work_group_size(&self) -> usize {
        self.work_group_size
    }

    pub fn run<B: ComputeBackend>(
        &self,
        session: &mut ComputeSession<B>,
        series: &Series,
        progress: Option<&ProgressReporter>,
    ) -> Result<RunReport> {
        if series.is_empty() {
            return Err(StatsError::EmptyDataset);
        }
        let _span = info_span!("statistics", records = series.len()).entered();

        let padded = Aligner::pad(series, self.work_group_size, FixedPoint::SENTINEL)?;
        let count = padded.original_len();
        info!(
            work_group_size = self.work_group_size,
            work_groups = padded.work_group_count(),
            pad_count = padded.pad_count(),
            padded_len = padded.len(),
            "series aligned"
        );

        let aggregator = StatisticsAggregator::new(count)?;
        session.upload(&padded)?;

        if let Some(p) = progress {
            p.set_message("Reducing min/max/mean...");
        }
        let min = aggregator.minimum(&Aligner::depad_by_length(&session.min_reduce()?, count))?;
        let max = aggregator.maximum(&Aligner::depad_by_length(&session.max_reduce()?, count))?;
        let sums = Aligner::depad_by_length(&session.sum_reduce()?, count);
        let mean = aggregator.mean(&sums)?;
        debug!(min, max, mean, "scalar reductions read back");

        if let Some(p) = progress {
            p.set_message("Reducing standard deviation...");
        }
        // The mean must be on the host before varianceReduce is issued.
        let integer_mean = aggregator.integer_mean(&sums)?;
        let squared = session.variance_reduce(integer_mean, count)?;
        let std_dev = aggregator.std_dev(&squared)?;

        if let Some(p) = progress {
            p.set_message("Sorting for quartiles...");
        }
        let sorted = session.selection_sort()?;
        let depadded = Aligner::depad_by_value(&sorted, padded.sentinel());
        let quartiles = aggregator.quartiles(&depadded)?;

        let statistics = StatisticsReport {
            min,
            max,
            mean,
            std_dev,
            median: quartiles.median,
            q1: quartiles.q1,
            q3: quartiles.q3,
        };
        info!(?statistics, "statistics computed");

        let dataset = DatasetSummary {
            records: count,
            padded_len: padded.len(),
            pad_count: padded.pad_count(),
            work_group_size: padded.work_group_size(),
            work_groups: padded.work_group_count(),
        };

        Ok(RunReport::new(
            session.device().clone(),
            dataset,
            statistics,
            session.take_timings(),
        ))
    }
}

impl Default for StatisticsPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_GROUP_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{HostBackend, KernelName};

    fn run(readings: &[f64], work_group_size: usize) -> Result<RunReport> {
        let series: Series = readings
            .iter()
            .map(|&r| FixedPoint::encode(r))
            .collect::<Result<Vec<_>>>()?
            .into();
        let mut session = ComputeSession::new(HostBackend::new(2)?);
        StatisticsPipeline::new(work_group_size).run(&mut session, &series, None)
    }

    #[test]
    fn test_min_max_mean_ignore_padding() {
        let report = run(&[10.0, 20.0, 30.0], 4).unwrap();
        assert_eq!(report.statistics.min, 10.0);
        assert_eq!(report.statistics.max, 30.0);
        assert_eq!(report.statistics.mean, 20.0);
        assert_eq!(report.dataset.pad_count, 1);
    }

    #[test]
    fn test_negative_only_readings() {
        let report = run(&[-4.5, -1.25, -9.0], 4).unwrap();
        assert_eq!(report.statistics.max, -1.25);
        assert_eq!(report.statistics.min, -9.0);
    }

    #[test]
    fn test_quartiles_from_sorted_series() {
        let report = run(&[5.0, 1.0, 3.0, 2.0, 4.0], 4).unwrap();
        assert_eq!(report.dataset.padded_len, 8);
        assert_eq!(report.statistics.median, 4.0);
        assert_eq!(report.statistics.q1, 2.0);
        assert_eq!(report.statistics.q3, 5.0);
        assert!(report.statistics.is_ordered());
    }

    #[test]
    fn test_standard_deviation() {
        let report = run(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 4).unwrap();
        assert_eq!(report.statistics.mean, 5.0);
        assert!((report.statistics.std_dev - 2.0).abs() < 1e-9);
        assert_eq!(report.dataset.pad_count, 0);
    }

    #[test]
    fn test_single_reading() {
        let report = run(&[12.34], 256).unwrap();
        let s = report.statistics;
        assert_eq!(s.values().to_vec(), vec![12.34, 12.34, 12.34, 0.0, 12.34, 12.34, 12.34]);
    }

    #[test]
    fn test_all_five_kernels_timed_in_order() {
        let report = run(&[1.0, 2.0, 3.0], 2).unwrap();
        let kernels: Vec<KernelName> = report.timings.iter().map(|t| t.kernel).collect();
        assert_eq!(
            kernels,
            vec![
                KernelName::MinReduce,
                KernelName::MaxReduce,
                KernelName::SumReduce,
                KernelName::VarianceReduce,
                KernelName::SelectionSort,
            ]
        );
    }

    #[test]
    fn test_earlier_dispatches_not_reported() {
        let mut session = ComputeSession::new(HostBackend::new(2).unwrap());
        let stale = Aligner::pad(&Series::from_raw(&[1, 2]), 2, FixedPoint::SENTINEL).unwrap();
        session.upload(&stale).unwrap();
        session.min_reduce().unwrap();
        session.sum_reduce().unwrap();

        let series = Series::from_raw(&[100, 200, 300]);
        let report = StatisticsPipeline::new(2).run(&mut session, &series, None).unwrap();
        assert_eq!(report.timings.len(), 5);
        assert_eq!(report.timings[0].kernel, KernelName::MinReduce);
        assert_eq!(report.statistics.max, 3.0);
    }

    #[test]
    fn test_empty_series_rejected() {
        assert!(matches!(run(&[], 4), Err(StatsError::EmptyDataset)));
    }
}
