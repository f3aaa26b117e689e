use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::compute::BackendKind;

#[derive(Parser)]
#[command(name = "tempstats")]
#[command(about = "Parallel descriptive statistics over temperature readings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Settings file [default: tempstats.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute min, max, mean, standard deviation and quartiles of a readings file
    Analyze {
        #[arg(short, long, help = "Text file with one temperature reading per line")]
        input: PathBuf,

        #[arg(short, long, help = "Work-group size (1..=1024)")]
        work_group_size: Option<usize>,

        #[arg(short, long, value_enum)]
        backend: Option<BackendKind>,

        #[arg(short, long, help = "OpenCL device index")]
        device: Option<usize>,

        #[arg(long, help = "Worker threads for the host backend")]
        threads: Option<usize>,

        #[arg(long, help = "Skip malformed lines instead of aborting")]
        skip_malformed: bool,

        #[arg(long, help = "Memory-map the input file")]
        mmap: bool,

        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },

    /// List available compute devices
    Devices,
}
