//! OpenCL backend.
//!
//! Builds `kernels/statistics.cl` once per backend and creates a kernel object
//! per dispatch. The queue is created with profiling enabled so every
//! dispatch can report device-side start/end timestamps.
//!
//! Only compiled with the `opencl` feature:
//! ```bash
//! cargo build --features opencl
//! ```

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{get_all_devices, Device, CL_DEVICE_TYPE_ALL};
use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE};
use opencl3::program::Program;
use opencl3::types::{cl_device_id, cl_int, cl_long, CL_BLOCKING};
use std::mem::size_of;
use std::ptr;
use tracing::{debug, info};

use crate::compute::{BackendKind, ComputeBackend, DeviceInfo, KernelEvent, Launch, Reduction};
use crate::error::{Result, StatsError};
use crate::models::FixedPoint;

const STATISTICS_KERNEL_SOURCE: &str = include_str!("../../kernels/statistics.cl");

fn dispatch_error(context: &str) -> impl Fn(opencl3::error_codes::ClError) -> StatsError + '_ {
    move |e| StatsError::BackendDispatch(format!("{}: {}", context, e))
}

fn device_ids() -> Result<Vec<cl_device_id>> {
    get_all_devices(CL_DEVICE_TYPE_ALL)
        .map_err(|e| StatsError::BackendUnavailable(format!("no OpenCL runtime: {}", e)))
}

fn describe(device: &Device) -> DeviceInfo {
    DeviceInfo {
        backend: BackendKind::OpenCl,
        name: device.name().unwrap_or_default().trim().to_string(),
        vendor: device.vendor().unwrap_or_default().trim().to_string(),
        max_work_group_size: device.max_work_group_size().unwrap_or(1),
    }
}

/// Enumerate every OpenCL device, in the order `OpenClBackend::new` indexes them.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    Ok(device_ids()?
        .into_iter()
        .map(|id| describe(&Device::new(id)))
        .collect())
}

pub struct ClValues {
    buffer: Buffer<cl_int>,
    len: usize,
}

pub struct ClAccumulators {
    buffer: Buffer<cl_long>,
    len: usize,
}

pub struct OpenClBackend {
    info: DeviceInfo,
    context: Context,
    queue: CommandQueue,
    program: Program,
}

// SAFETY: OpenCL 1.2+ guarantees thread safety for context, command queue,
// program and memory objects; the opencl3 handles are opaque pointers into
// the runtime, which serialises access internally.
unsafe impl Send for OpenClBackend {}
unsafe impl Send for ClValues {}
unsafe impl Send for ClAccumulators {}

impl OpenClBackend {
    /// Open device `index` (see [`list_devices`]) and build the kernels.
    pub fn new(index: usize) -> Result<Self> {
        let ids = device_ids()?;
        let id = *ids.get(index).ok_or_else(|| {
            StatsError::BackendUnavailable(format!(
                "OpenCL device {} does not exist ({} available)",
                index,
                ids.len()
            ))
        })?;

        let device = Device::new(id);
        let info = describe(&device);

        let context = Context::from_device(&device)
            .map_err(|e| StatsError::BackendUnavailable(format!("context creation: {}", e)))?;

        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, CL_QUEUE_PROFILING_ENABLE)
            .map_err(|e| StatsError::BackendUnavailable(format!("command queue: {}", e)))?;

        let options = format!("-D SENTINEL={}", FixedPoint::SENTINEL.raw());
        let program =
            Program::create_and_build_from_source(&context, STATISTICS_KERNEL_SOURCE, &options)
                .map_err(StatsError::BackendBuild)?;

        info!(device = %info.name, vendor = %info.vendor, "OpenCL program built");

        Ok(Self {
            info,
            context,
            queue,
            program,
        })
    }

    fn kernel(&self, name: &str) -> Result<Kernel> {
        Kernel::create(&self.program, name)
            .map_err(|e| StatsError::BackendBuild(format!("kernel '{}': {}", name, e)))
    }

    fn finish(&self, event: Event) -> Result<KernelEvent> {
        event.wait().map_err(dispatch_error("waiting for kernel"))?;
        let start_ns = event
            .profiling_command_start()
            .map_err(dispatch_error("profiling start"))?;
        let end_ns = event
            .profiling_command_end()
            .map_err(dispatch_error("profiling end"))?;
        Ok(KernelEvent { start_ns, end_ns })
    }

    fn check_extent(launch: &Launch, available: usize) -> Result<()> {
        if launch.global > available {
            return Err(StatsError::InvalidLaunch(format!(
                "{} work-items requested but the buffer holds {}",
                launch.global, available
            )));
        }
        Ok(())
    }

    fn check_len(requested: usize, available: usize) -> Result<()> {
        if requested > available {
            return Err(StatsError::BackendDispatch(format!(
                "read of {} elements from a buffer of {}",
                requested, available
            )));
        }
        Ok(())
    }
}

impl ComputeBackend for OpenClBackend {
    type Values = ClValues;
    type Accumulators = ClAccumulators;

    fn device(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn upload(&mut self, data: &[i32]) -> Result<ClValues> {
        let mut buffer = unsafe {
            Buffer::<cl_int>::create(&self.context, CL_MEM_READ_ONLY, data.len(), ptr::null_mut())
                .map_err(dispatch_error("allocating input buffer"))?
        };
        let event = unsafe {
            self.queue
                .enqueue_write_buffer(&mut buffer, CL_BLOCKING, 0, data, &[])
                .map_err(dispatch_error("uploading input"))?
        };
        event.wait().map_err(dispatch_error("uploading input"))?;

        Ok(ClValues {
            buffer,
            len: data.len(),
        })
    }

    fn zeroed_values(&mut self, len: usize) -> Result<ClValues> {
        let mut buffer = unsafe {
            Buffer::<cl_int>::create(&self.context, CL_MEM_READ_WRITE, len, ptr::null_mut())
                .map_err(dispatch_error("allocating output buffer"))?
        };
        let event = unsafe {
            self.queue
                .enqueue_fill_buffer(&mut buffer, &[0 as cl_int], 0, len * size_of::<cl_int>(), &[])
                .map_err(dispatch_error("zeroing output buffer"))?
        };
        event.wait().map_err(dispatch_error("zeroing output buffer"))?;

        Ok(ClValues { buffer, len })
    }

    fn filled_accumulators(&mut self, len: usize, value: i64) -> Result<ClAccumulators> {
        let mut buffer = unsafe {
            Buffer::<cl_long>::create(&self.context, CL_MEM_READ_WRITE, len, ptr::null_mut())
                .map_err(dispatch_error("allocating output buffer"))?
        };
        let event = unsafe {
            self.queue
                .enqueue_fill_buffer(
                    &mut buffer,
                    &[value as cl_long],
                    0,
                    len * size_of::<cl_long>(),
                    &[],
                )
                .map_err(dispatch_error("filling output buffer"))?
        };
        event.wait().map_err(dispatch_error("filling output buffer"))?;

        Ok(ClAccumulators { buffer, len })
    }

    fn reduce(
        &mut self,
        reduction: Reduction,
        input: &ClValues,
        output: &mut ClAccumulators,
        launch: Launch,
    ) -> Result<KernelEvent> {
        launch.validate(self.info.max_work_group_size)?;
        let local = launch.require_local()?;
        Self::check_extent(&launch, input.len)?;

        let kernel = self.kernel(reduction.kernel().as_str())?;
        let scratch_bytes = local * size_of::<cl_long>();

        let event = unsafe {
            let mut exec = ExecuteKernel::new(&kernel);
            exec.set_arg(&input.buffer)
                .set_arg(&output.buffer)
                .set_arg_local_buffer(scratch_bytes);

            let params: Option<(cl_int, cl_int)> = match reduction {
                Reduction::Variance { mean, count } => Some((mean.raw(), count)),
                _ => None,
            };
            if let Some((mean, count)) = params.as_ref() {
                exec.set_arg(mean).set_arg(count);
            }

            exec.set_global_work_size(launch.global)
                .set_local_work_size(local)
                .enqueue_nd_range(&self.queue)
                .map_err(dispatch_error(reduction.kernel().as_str()))?
        };

        let timing = self.finish(event)?;
        debug!(kernel = %reduction.kernel(), "OpenCL reduction finished");
        Ok(timing)
    }

    fn sort(
        &mut self,
        input: &ClValues,
        output: &mut ClValues,
        launch: Launch,
    ) -> Result<KernelEvent> {
        launch.validate(self.info.max_work_group_size)?;
        Self::check_extent(&launch, input.len)?;
        Self::check_extent(&launch, output.len)?;

        let kernel = self.kernel("selectionSort")?;
        let event = unsafe {
            let mut exec = ExecuteKernel::new(&kernel);
            exec.set_arg(&input.buffer)
                .set_arg(&output.buffer)
                .set_global_work_size(launch.global);
            if let Some(local) = launch.local {
                exec.set_local_work_size(local);
            }
            exec.enqueue_nd_range(&self.queue)
                .map_err(dispatch_error("selectionSort"))?
        };

        self.finish(event)
    }

    fn read_values(&mut self, buffer: &ClValues, len: usize) -> Result<Vec<i32>> {
        Self::check_len(len, buffer.len)?;
        let mut host = vec![0 as cl_int; len];
        unsafe {
            self.queue
                .enqueue_read_buffer(&buffer.buffer, CL_BLOCKING, 0, &mut host, &[])
                .map_err(dispatch_error("reading values"))?;
        }
        self.queue.finish().map_err(dispatch_error("finishing queue"))?;
        Ok(host)
    }

    fn read_accumulators(&mut self, buffer: &ClAccumulators, len: usize) -> Result<Vec<i64>> {
        Self::check_len(len, buffer.len)?;
        let mut host = vec![0 as cl_long; len];
        unsafe {
            self.queue
                .enqueue_read_buffer(&buffer.buffer, CL_BLOCKING, 0, &mut host, &[])
                .map_err(dispatch_error("reading accumulators"))?;
        }
        self.queue.finish().map_err(dispatch_error("finishing queue"))?;
        Ok(host)
    }
}
