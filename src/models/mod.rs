pub mod fixed_point;
pub mod report;
pub mod series;

pub use fixed_point::FixedPoint;
pub use report::{DatasetSummary, RunReport, StatisticsReport};
pub use series::{PaddedSeries, Series};
