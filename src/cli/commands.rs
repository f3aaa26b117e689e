use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::args::{Cli, Commands};
use crate::compute::{BackendKind, ComputeBackend, ComputeSession, HostBackend};
use crate::config::{Overrides, Settings};
use crate::error::Result;
use crate::models::{RunReport, Series};
use crate::processors::StatisticsPipeline;
use crate::readers::{LoadedSeries, RecordLoader};
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            input,
            work_group_size,
            backend,
            device,
            threads,
            skip_malformed,
            mmap,
            json,
        } => {
            let settings = settings.apply(&Overrides {
                work_group_size,
                backend,
                device,
                threads,
                skip_malformed,
                use_mmap: mmap,
            })?;
            analyze(input, settings, json).await
        }
        Commands::Devices => list_devices(&settings),
    }
}

async fn analyze(input: PathBuf, settings: Settings, json: bool) -> Result<()> {
    info!(input = %input.display(), ?settings, "starting analysis");

    let progress = Arc::new(ProgressReporter::new_spinner("Loading readings...", json));

    let loader = RecordLoader::new()
        .with_policy(settings.malformed)
        .with_mmap(settings.use_mmap);
    let LoadedSeries {
        series,
        diagnostics,
    } = tokio::task::spawn_blocking(move || loader.load(&input)).await??;

    for diagnostic in &diagnostics {
        warn!(line = diagnostic.line, reason = %diagnostic.reason, "skipped malformed record");
    }
    if !diagnostics.is_empty() {
        progress.println(&format!("Skipped {} malformed line(s)", diagnostics.len()));
    }

    // Backends are built on the blocking thread; device handles never cross tasks.
    let compute_progress = Arc::clone(&progress);
    let report =
        tokio::task::spawn_blocking(move || compute(&settings, &series, &compute_progress))
            .await??
            .with_skipped_records(diagnostics);

    progress.finish_with_message(&format!("Analyzed {} readings", report.dataset.records));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", report.summary());
    }

    Ok(())
}

fn compute(settings: &Settings, series: &Series, progress: &ProgressReporter) -> Result<RunReport> {
    let pipeline = StatisticsPipeline::new(settings.work_group_size);

    match settings.backend {
        BackendKind::Host => {
            let mut session = ComputeSession::new(HostBackend::new(settings.threads)?);
            progress.set_message(&format!("Computing on {}...", session.device().name));
            pipeline.run(&mut session, series, Some(progress))
        }
        BackendKind::OpenCl => compute_opencl(&pipeline, settings, series, progress),
    }
}

#[cfg(feature = "opencl")]
fn compute_opencl(
    pipeline: &StatisticsPipeline,
    settings: &Settings,
    series: &Series,
    progress: &ProgressReporter,
) -> Result<RunReport> {
    let mut session = ComputeSession::new(crate::compute::OpenClBackend::new(settings.device)?);
    progress.set_message(&format!("Computing on {}...", session.device().name));
    pipeline.run(&mut session, series, Some(progress))
}

#[cfg(not(feature = "opencl"))]
fn compute_opencl(
    _pipeline: &StatisticsPipeline,
    _settings: &Settings,
    _series: &Series,
    _progress: &ProgressReporter,
) -> Result<RunReport> {
    Err(crate::error::StatsError::BackendUnavailable(
        "tempstats was built without the `opencl` feature".to_string(),
    ))
}

fn list_devices(settings: &Settings) -> Result<()> {
    let host = HostBackend::new(settings.threads)?;
    println!("host: {}", host.device());

    #[cfg(feature = "opencl")]
    {
        match crate::compute::opencl::list_devices() {
            Ok(devices) if devices.is_empty() => println!("No OpenCL devices found"),
            Ok(devices) => {
                for (index, device) in devices.iter().enumerate() {
                    println!("opencl {}: {}", index, device);
                }
            }
            Err(e) => println!("OpenCL unavailable: {}", e),
        }
    }

    #[cfg(not(feature = "opencl"))]
    println!("OpenCL support not compiled in (enable the `opencl` feature)");

    Ok(())
}
