//! Compute backends and the session that drives them.
//!
//! The statistics pipeline only talks to [`ComputeSession`], which in turn
//! talks to a [`ComputeBackend`]. A backend owns device memory and knows how
//! to run the five kernels (`minReduce`, `maxReduce`, `sumReduce`,
//! `varianceReduce`, `selectionSort`); how it parallelises them is its own
//! business.
//!
//! Kernel contracts shared by every backend:
//!
//! * reductions fold every input element except [`FixedPoint::SENTINEL`]
//!   and combine each work-group's partial into output index 0, which starts
//!   at the reduction's identity ([`Reduction::identity`]);
//! * `varianceReduce` additionally ignores work-items whose global id is not
//!   below `count`, and leaves the sum of squared deviations from `mean` in
//!   output index 0, at scale `FIXED_POINT_SCALE²`;
//! * `selectionSort` writes a non-decreasing copy of the whole input,
//!   sentinels included.

pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;
pub mod session;

pub use host::HostBackend;
#[cfg(feature = "opencl")]
pub use opencl::OpenClBackend;
pub use session::{ComputeSession, Dispatched, KernelTiming};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Result, StatsError};
use crate::models::FixedPoint;

/// Which backend implementation to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Multi-threaded host emulation of the device kernels
    #[default]
    Host,
    /// OpenCL device (requires the `opencl` feature)
    #[value(name = "opencl")]
    OpenCl,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Host => write!(f, "host"),
            BackendKind::OpenCl => write!(f, "opencl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelName {
    #[serde(rename = "minReduce")]
    MinReduce,
    #[serde(rename = "maxReduce")]
    MaxReduce,
    #[serde(rename = "sumReduce")]
    SumReduce,
    #[serde(rename = "varianceReduce")]
    VarianceReduce,
    #[serde(rename = "selectionSort")]
    SelectionSort,
}

impl KernelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelName::MinReduce => "minReduce",
            KernelName::MaxReduce => "maxReduce",
            KernelName::SumReduce => "sumReduce",
            KernelName::VarianceReduce => "varianceReduce",
            KernelName::SelectionSort => "selectionSort",
        }
    }
}

impl fmt::Display for KernelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-aggregate fold over the uploaded series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Min,
    Max,
    Sum,
    /// Sum of squared deviations from `mean` over the first `count` elements.
    Variance { mean: FixedPoint, count: i32 },
}

impl Reduction {
    pub fn kernel(&self) -> KernelName {
        match self {
            Reduction::Min => KernelName::MinReduce,
            Reduction::Max => KernelName::MaxReduce,
            Reduction::Sum => KernelName::SumReduce,
            Reduction::Variance { .. } => KernelName::VarianceReduce,
        }
    }

    /// Value the output buffer is filled with before dispatch.
    pub fn identity(&self) -> i64 {
        match self {
            Reduction::Min => i64::MAX,
            Reduction::Max => i64::MIN,
            Reduction::Sum | Reduction::Variance { .. } => 0,
        }
    }

    /// What work-item `global_id` holding `value` feeds into the fold.
    pub fn contribution(&self, global_id: usize, value: i32) -> i64 {
        if value == FixedPoint::SENTINEL.raw() {
            return self.identity();
        }
        match *self {
            Reduction::Min | Reduction::Max | Reduction::Sum => value as i64,
            Reduction::Variance { mean, count } => {
                if usize::try_from(count).map_or(true, |count| global_id >= count) {
                    return 0;
                }
                let deviation = value as i64 - mean.raw() as i64;
                deviation * deviation
            }
        }
    }

    /// Sums wrap on overflow, the same as the atomic add that folds
    /// work-group results into output[0].
    pub fn combine(&self, a: i64, b: i64) -> i64 {
        match self {
            Reduction::Min => a.min(b),
            Reduction::Max => a.max(b),
            Reduction::Sum | Reduction::Variance { .. } => a.wrapping_add(b),
        }
    }
}

/// NDRange-style launch shape: `global` work-items split into groups of
/// `local`. `local: None` leaves grouping to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub global: usize,
    pub local: Option<usize>,
}

impl Launch {
    pub fn new(global: usize, local: usize) -> Self {
        Self {
            global,
            local: Some(local),
        }
    }

    pub fn ungrouped(global: usize) -> Self {
        Self {
            global,
            local: None,
        }
    }

    pub fn validate(&self, max_work_group_size: usize) -> Result<()> {
        if self.global == 0 {
            return Err(StatsError::InvalidLaunch(
                "global work size must be non-zero".to_string(),
            ));
        }

        if let Some(local) = self.local {
            if local == 0 || local > max_work_group_size {
                return Err(StatsError::InvalidLaunch(format!(
                    "local work size {} outside device limit 1..={}",
                    local, max_work_group_size
                )));
            }
            if self.global % local != 0 {
                return Err(StatsError::InvalidLaunch(format!(
                    "global work size {} is not a multiple of local work size {}",
                    self.global, local
                )));
            }
        }

        Ok(())
    }

    /// Local size, required by kernels that use work-group scratch memory.
    pub fn require_local(&self) -> Result<usize> {
        self.local.ok_or_else(|| {
            StatsError::InvalidLaunch("reduction kernels need an explicit local size".to_string())
        })
    }
}

/// Device-side start/end timestamps of one dispatch, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelEvent {
    pub start_ns: u64,
    pub end_ns: u64,
}

impl KernelEvent {
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.end_ns.saturating_sub(self.start_ns))
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub backend: BackendKind,
    pub name: String,
    pub vendor: String,
    pub max_work_group_size: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (vendor: {}, max work-group size: {})",
            self.name, self.backend, self.vendor, self.max_work_group_size
        )
    }
}

/// The capability the statistics pipeline needs from a parallel runtime.
///
/// Buffers are owned handles; dropping one releases the device memory.
/// Every call blocks until the device work it issued has finished.
pub trait ComputeBackend {
    /// Device buffer of `i32` fixed-point elements.
    type Values;
    /// Device buffer of `i64` accumulators.
    type Accumulators;

    fn device(&self) -> DeviceInfo;

    /// Allocate a read-only buffer holding `data`.
    fn upload(&mut self, data: &[i32]) -> Result<Self::Values>;

    fn zeroed_values(&mut self, len: usize) -> Result<Self::Values>;

    fn filled_accumulators(&mut self, len: usize, value: i64) -> Result<Self::Accumulators>;

    fn reduce(
        &mut self,
        reduction: Reduction,
        input: &Self::Values,
        output: &mut Self::Accumulators,
        launch: Launch,
    ) -> Result<KernelEvent>;

    fn sort(
        &mut self,
        input: &Self::Values,
        output: &mut Self::Values,
        launch: Launch,
    ) -> Result<KernelEvent>;

    fn read_values(&mut self, buffer: &Self::Values, len: usize) -> Result<Vec<i32>>;

    fn read_accumulators(&mut self, buffer: &Self::Accumulators, len: usize) -> Result<Vec<i64>>;
}
