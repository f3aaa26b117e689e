use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compute::{ComputeBackend, DeviceInfo, KernelEvent, KernelName, Launch, Reduction};
use crate::error::{Result, StatsError};
use crate::models::{FixedPoint, PaddedSeries, Series};

/// Per-dispatch profiling record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelTiming {
    pub kernel: KernelName,
    pub event: KernelEvent,
    pub seconds: f64,
}

impl KernelTiming {
    pub fn new(kernel: KernelName, event: KernelEvent) -> Self {
        Self {
            kernel,
            event,
            seconds: event.seconds(),
        }
    }
}

/// Output buffer of a finished dispatch. Its timing is already recorded on the
/// session; dropping it releases the buffer.
pub struct Dispatched<T> {
    pub buffer: T,
}

struct UploadedInput<V> {
    buffer: V,
    padded_len: usize,
    original_len: usize,
    work_group_size: usize,
}

/// Owns one backend and the read-only input buffer shared by every dispatch.
///
/// Dispatches run one at a time: each allocates its own output buffer, waits
/// for completion and is read back before the next one is issued.
pub struct ComputeSession<B: ComputeBackend> {
    backend: B,
    device: DeviceInfo,
    input: Option<UploadedInput<B::Values>>,
    timings: Vec<KernelTiming>,
}

impl<B: ComputeBackend> ComputeSession<B> {
    pub fn new(backend: B) -> Self {
        let device = backend.device();
        info!(device = %device, "compute session opened");
        Self {
            backend,
            device,
            input: None,
            timings: Vec::new(),
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Upload the padded series, replacing any earlier input and clearing
    /// timings left from earlier dispatches.
    ///
    /// Backends only skip [`FixedPoint::SENTINEL`], so a series padded with
    /// any other value is rejected.
    pub fn upload(&mut self, series: &PaddedSeries) -> Result<()> {
        if series.is_empty() {
            return Err(StatsError::EmptyDataset);
        }
        if series.sentinel() != FixedPoint::SENTINEL {
            return Err(StatsError::InvalidLaunch(format!(
                "series padded with {} but backends only skip the reserved sentinel",
                series.sentinel().raw()
            )));
        }
        if series.work_group_size() > self.device.max_work_group_size {
            return Err(StatsError::InvalidWorkGroupSize(series.work_group_size()));
        }

        let raw = series.values().to_raw();
        let buffer = self.backend.upload(&raw)?;
        debug!(
            elements = series.len(),
            pad_count = series.pad_count(),
            "input series uploaded"
        );

        self.timings.clear();
        self.input = Some(UploadedInput {
            buffer,
            padded_len: series.len(),
            original_len: series.original_len(),
            work_group_size: series.work_group_size(),
        });
        Ok(())
    }

    pub fn padded_len(&self) -> Option<usize> {
        self.input.as_ref().map(|i| i.padded_len)
    }

    pub fn original_len(&self) -> Option<usize> {
        self.input.as_ref().map(|i| i.original_len)
    }

    fn uploaded(&self) -> Result<&UploadedInput<B::Values>> {
        self.input.as_ref().ok_or(StatsError::NoInputUploaded)
    }

    /// Run one reduction into a fresh output buffer of padded length whose
    /// slots start at the reduction's identity.
    pub fn dispatch_reduction(
        &mut self,
        reduction: Reduction,
    ) -> Result<Dispatched<B::Accumulators>> {
        let input = self.input.as_ref().ok_or(StatsError::NoInputUploaded)?;
        let launch = Launch::new(input.padded_len, input.work_group_size);

        let mut buffer = self
            .backend
            .filled_accumulators(input.padded_len, reduction.identity())?;
        let event = self
            .backend
            .reduce(reduction, &input.buffer, &mut buffer, launch)?;

        Ok(self.record(reduction.kernel(), buffer, event))
    }

    /// Sort the whole padded input into a fresh zeroed buffer. Grouping is
    /// left to the backend.
    pub fn dispatch_sort(&mut self) -> Result<Dispatched<B::Values>> {
        let input = self.input.as_ref().ok_or(StatsError::NoInputUploaded)?;
        let launch = Launch::ungrouped(input.padded_len);

        let mut buffer = self.backend.zeroed_values(input.padded_len)?;
        let event = self.backend.sort(&input.buffer, &mut buffer, launch)?;

        Ok(self.record(KernelName::SelectionSort, buffer, event))
    }

    fn record<T>(&mut self, kernel: KernelName, buffer: T, event: KernelEvent) -> Dispatched<T> {
        let timing = KernelTiming::new(kernel, event);
        debug!(kernel = %kernel, seconds = timing.seconds, "dispatch complete");
        self.timings.push(timing);
        Dispatched { buffer }
    }

    /// Blocking read of the first `len` accumulators of a reduction output.
    pub fn read_accumulators(
        &mut self,
        dispatched: &Dispatched<B::Accumulators>,
        len: usize,
    ) -> Result<Vec<i64>> {
        self.backend.read_accumulators(&dispatched.buffer, len)
    }

    /// Blocking read of the first `len` elements of a sort output.
    pub fn read_series(&mut self, dispatched: &Dispatched<B::Values>, len: usize) -> Result<Series> {
        let raw = self.backend.read_values(&dispatched.buffer, len)?;
        Ok(Series::from_raw(&raw))
    }

    fn reduce(&mut self, reduction: Reduction) -> Result<Vec<i64>> {
        let len = self.uploaded()?.padded_len;
        let dispatched = self.dispatch_reduction(reduction)?;
        self.read_accumulators(&dispatched, len)
    }

    pub fn min_reduce(&mut self) -> Result<Vec<i64>> {
        self.reduce(Reduction::Min)
    }

    pub fn max_reduce(&mut self) -> Result<Vec<i64>> {
        self.reduce(Reduction::Max)
    }

    pub fn sum_reduce(&mut self) -> Result<Vec<i64>> {
        self.reduce(Reduction::Sum)
    }

    /// Needs the mean from a completed `sum_reduce`; `count` is the unpadded
    /// element count.
    pub fn variance_reduce(&mut self, mean: FixedPoint, count: usize) -> Result<Vec<i64>> {
        let count = i32::try_from(count).map_err(|_| {
            StatsError::InvalidLaunch(format!("element count {} exceeds kernel range", count))
        })?;
        self.reduce(Reduction::Variance { mean, count })
    }

    /// Full sorted copy of the padded input, sentinels included.
    pub fn selection_sort(&mut self) -> Result<Series> {
        let len = self.uploaded()?.padded_len;
        let dispatched = self.dispatch_sort()?;
        self.read_series(&dispatched, len)
    }

    pub fn timings(&self) -> &[KernelTiming] {
        &self.timings
    }

    pub fn take_timings(&mut self) -> Vec<KernelTiming> {
        std::mem::take(&mut self.timings)
    }
}
