//! Host backend: runs the kernel contracts on a rayon thread pool.
//!
//! Each work-group becomes one rayon task with its own scratch region, so the
//! grouping, local tree reduction and atomic fold into output index 0 follow
//! the same shape as the device kernels.

use rayon::prelude::*;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::compute::{BackendKind, ComputeBackend, DeviceInfo, KernelEvent, Launch, Reduction};
use crate::error::{Result, StatsError};
use crate::utils::constants::HOST_MAX_WORK_GROUP_SIZE;

pub struct HostValues(Vec<i32>);

impl HostValues {
    fn len(&self) -> usize {
        self.0.len()
    }
}

pub struct HostAccumulators(Vec<AtomicI64>);

impl HostAccumulators {
    fn len(&self) -> usize {
        self.0.len()
    }
}

pub struct HostBackend {
    pool: rayon::ThreadPool,
    threads: usize,
    epoch: Instant,
}

impl HostBackend {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tempstats-host-{}", i))
            .build()
            .map_err(|e| StatsError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            pool,
            threads,
            epoch: Instant::now(),
        })
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn check_extent(launch: &Launch, available: usize, what: &str) -> Result<()> {
        if launch.global > available {
            return Err(StatsError::InvalidLaunch(format!(
                "{} work-items requested but the {} buffer holds {}",
                launch.global, what, available
            )));
        }
        Ok(())
    }
}

/// Reduce one work-group: load each work-item's contribution into scratch,
/// then halve the active range per step the way barrier-separated device
/// code does.
fn fold_work_group(
    reduction: Reduction,
    base: usize,
    group: &[i32],
    scratch: &mut Vec<i64>,
) -> i64 {
    scratch.clear();
    scratch.extend(
        group
            .iter()
            .enumerate()
            .map(|(lid, &value)| reduction.contribution(base + lid, value)),
    );

    let len = scratch.len();
    let mut stride = 1;
    while stride < len {
        let mut lid = 0;
        while lid + stride < len {
            scratch[lid] = reduction.combine(scratch[lid], scratch[lid + stride]);
            lid += stride * 2;
        }
        stride *= 2;
    }

    scratch.first().copied().unwrap_or_else(|| reduction.identity())
}

impl ComputeBackend for HostBackend {
    type Values = HostValues;
    type Accumulators = HostAccumulators;

    fn device(&self) -> DeviceInfo {
        DeviceInfo {
            backend: BackendKind::Host,
            name: format!("host ({} threads)", self.threads),
            vendor: "rayon".to_string(),
            max_work_group_size: HOST_MAX_WORK_GROUP_SIZE,
        }
    }

    fn upload(&mut self, data: &[i32]) -> Result<HostValues> {
        Ok(HostValues(data.to_vec()))
    }

    fn zeroed_values(&mut self, len: usize) -> Result<HostValues> {
        Ok(HostValues(vec![0; len]))
    }

    fn filled_accumulators(&mut self, len: usize, value: i64) -> Result<HostAccumulators> {
        Ok(HostAccumulators(
            (0..len).map(|_| AtomicI64::new(value)).collect(),
        ))
    }

    fn reduce(
        &mut self,
        reduction: Reduction,
        input: &HostValues,
        output: &mut HostAccumulators,
        launch: Launch,
    ) -> Result<KernelEvent> {
        launch.validate(HOST_MAX_WORK_GROUP_SIZE)?;
        let local = launch.require_local()?;
        Self::check_extent(&launch, input.len(), "input")?;
        let target = output.0.first().ok_or_else(|| {
            StatsError::BackendDispatch("reduction output buffer is empty".to_string())
        })?;

        let data = &input.0[..launch.global];
        let start_ns = self.now_ns();
        self.pool.install(|| {
            data.par_chunks(local).enumerate().for_each_init(
                || Vec::with_capacity(local),
                |scratch, (group_id, group)| {
                    let partial = fold_work_group(reduction, group_id * local, group, scratch);
                    match reduction {
                        Reduction::Min => {
                            target.fetch_min(partial, Ordering::Relaxed);
                        }
                        Reduction::Max => {
                            target.fetch_max(partial, Ordering::Relaxed);
                        }
                        Reduction::Sum | Reduction::Variance { .. } => {
                            target.fetch_add(partial, Ordering::Relaxed);
                        }
                    }
                },
            );
        });
        let end_ns = self.now_ns();

        debug!(
            kernel = %reduction.kernel(),
            work_groups = launch.global / local,
            "host reduction finished"
        );
        Ok(KernelEvent { start_ns, end_ns })
    }

    fn sort(
        &mut self,
        input: &HostValues,
        output: &mut HostValues,
        launch: Launch,
    ) -> Result<KernelEvent> {
        launch.validate(HOST_MAX_WORK_GROUP_SIZE)?;
        Self::check_extent(&launch, input.len(), "input")?;
        Self::check_extent(&launch, output.len(), "output")?;

        let start_ns = self.now_ns();
        let sorted = &mut output.0[..launch.global];
        sorted.copy_from_slice(&input.0[..launch.global]);
        self.pool.install(|| sorted.par_sort_unstable());
        let end_ns = self.now_ns();

        Ok(KernelEvent { start_ns, end_ns })
    }

    fn read_values(&mut self, buffer: &HostValues, len: usize) -> Result<Vec<i32>> {
        buffer.0.get(..len).map(<[i32]>::to_vec).ok_or_else(|| {
            StatsError::BackendDispatch(format!(
                "read of {} elements from a buffer of {}",
                len,
                buffer.len()
            ))
        })
    }

    fn read_accumulators(&mut self, buffer: &HostAccumulators, len: usize) -> Result<Vec<i64>> {
        buffer
            .0
            .get(..len)
            .map(|slots| slots.iter().map(|a| a.load(Ordering::Acquire)).collect())
            .ok_or_else(|| {
                StatsError::BackendDispatch(format!(
                    "read of {} accumulators from a buffer of {}",
                    len,
                    buffer.len()
                ))
            })
    }
}
