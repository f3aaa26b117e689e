/// Fixed-point scale: readings are stored as `round(reading * 100)`.
pub const FIXED_POINT_SCALE: i32 = 100;

/// Work-group defaults
pub const DEFAULT_WORK_GROUP_SIZE: usize = 256;
pub const MAX_WORK_GROUP_SIZE: usize = 1024;
pub const HOST_MAX_WORK_GROUP_SIZE: usize = MAX_WORK_GROUP_SIZE;

/// Rank statistic positions within the sorted series
pub const Q1_RANK: f64 = 0.25;
pub const MEDIAN_RANK: f64 = 0.5;
pub const Q3_RANK: f64 = 0.75;

/// Processing defaults
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB

/// Configuration sources
pub const DEFAULT_CONFIG_FILE: &str = "tempstats.toml";
pub const ENV_PREFIX: &str = "TEMPSTATS";
