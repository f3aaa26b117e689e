use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compute::{DeviceInfo, KernelTiming};
use crate::readers::LineDiagnostic;

/// The seven descriptive statistics, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
}

impl StatisticsReport {
    pub const NAMES: [&'static str; 7] = ["Min", "Max", "Mean", "StdDev", "Median", "Q1", "Q3"];

    pub fn values(&self) -> [f64; 7] {
        [
            self.min,
            self.max,
            self.mean,
            self.std_dev,
            self.median,
            self.q1,
            self.q3,
        ]
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        Self::NAMES.into_iter().zip(self.values())
    }

    /// `min <= q1 <= median <= q3 <= max`
    pub fn is_ordered(&self) -> bool {
        self.min <= self.q1 && self.q1 <= self.median && self.median <= self.q3 && self.q3 <= self.max
    }
}

/// Facts about the series the statistics were computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub padded_len: usize,
    pub pad_count: usize,
    pub work_group_size: usize,
    pub work_groups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub device: DeviceInfo,
    pub dataset: DatasetSummary,
    pub statistics: StatisticsReport,
    pub timings: Vec<KernelTiming>,
    pub skipped_records: Vec<LineDiagnostic>,
}

impl RunReport {
    pub fn new(
        device: DeviceInfo,
        dataset: DatasetSummary,
        statistics: StatisticsReport,
        timings: Vec<KernelTiming>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            device,
            dataset,
            statistics,
            timings,
            skipped_records: Vec::new(),
        }
    }

    pub fn with_skipped_records(mut self, skipped: Vec<LineDiagnostic>) -> Self {
        self.skipped_records = skipped;
        self
    }

    pub fn total_kernel_seconds(&self) -> f64 {
        self.timings.iter().map(|t| t.seconds).sum()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Device: {}\n", self.device));
        out.push_str(&format!(
            "Records: {} (padded to {} = {} work-groups of {}, {} padding)\n",
            self.dataset.records,
            self.dataset.padded_len,
            self.dataset.work_groups,
            self.dataset.work_group_size,
            self.dataset.pad_count
        ));
        if !self.skipped_records.is_empty() {
            out.push_str(&format!(
                "Skipped malformed records: {}\n",
                self.skipped_records.len()
            ));
        }

        out.push('\n');
        for (name, _) in self.statistics.named() {
            out.push_str(&format!("| {:>9} ", name));
        }
        out.push_str("|\n");
        for (_, value) in self.statistics.named() {
            out.push_str(&format!("| {:>9.3} ", value));
        }
        out.push_str("|\n");

        out.push_str("\nKernel execution times:\n");
        for (i, timing) in self.timings.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {}: {:.9} [secs]\n",
                i + 1,
                timing.kernel,
                timing.seconds
            ));
        }
        out.push_str(&format!(
            "Total run time: {:.9} [secs]",
            self.total_kernel_seconds()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{BackendKind, KernelEvent, KernelName};

    fn sample() -> RunReport {
        let statistics = StatisticsReport {
            min: -2.5,
            max: 30.0,
            mean: 10.25,
            std_dev: 4.0,
            median: 9.5,
            q1: 5.0,
            q3: 14.0,
        };
        let timings = vec![
            KernelTiming::new(
                KernelName::MinReduce,
                KernelEvent {
                    start_ns: 0,
                    end_ns: 500_000_000,
                },
            ),
            KernelTiming::new(
                KernelName::SelectionSort,
                KernelEvent {
                    start_ns: 0,
                    end_ns: 250_000_000,
                },
            ),
        ];
        RunReport::new(
            DeviceInfo {
                backend: BackendKind::Host,
                name: "test".to_string(),
                vendor: "none".to_string(),
                max_work_group_size: 1024,
            },
            DatasetSummary {
                records: 10,
                padded_len: 12,
                pad_count: 2,
                work_group_size: 4,
                work_groups: 3,
            },
            statistics,
            timings,
        )
    }

    #[test]
    fn test_statistics_ordering() {
        let report = sample();
        assert!(report.statistics.is_ordered());
        let names: Vec<&str> = report.statistics.named().map(|(n, _)| n).collect();
        assert_eq!(names, StatisticsReport::NAMES.to_vec());
    }

    #[test]
    fn test_total_kernel_seconds() {
        assert!((sample().total_kernel_seconds() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_json_exposes_structured_values() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["statistics"]["std_dev"], 4.0);
        assert_eq!(json["timings"][0]["kernel"], "minReduce");
        assert_eq!(json["dataset"]["pad_count"], 2);
    }

    #[test]
    fn test_summary_mentions_every_kernel() {
        let summary = sample().summary();
        assert!(summary.contains("minReduce"));
        assert!(summary.contains("selectionSort"));
        assert!(summary.contains("StdDev"));
    }
}
