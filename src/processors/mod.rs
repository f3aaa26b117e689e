pub mod aligner;
pub mod pipeline;
pub mod statistics_aggregator;

pub use aligner::Aligner;
pub use pipeline::StatisticsPipeline;
pub use statistics_aggregator::{Quartiles, StatisticsAggregator};
