use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::compute::BackendKind;
use crate::error::Result;
use crate::readers::MalformedPolicy;
use crate::utils::constants::{DEFAULT_CONFIG_FILE, DEFAULT_WORK_GROUP_SIZE, ENV_PREFIX};

/// Run settings, layered: built-in defaults, then the config file, then
/// `TEMPSTATS_*` environment variables. CLI flags are applied last through
/// [`Settings::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[validate(range(min = 1, max = 1024))]
    pub work_group_size: usize,

    pub backend: BackendKind,

    /// Device index for the OpenCL backend
    pub device: usize,

    #[validate(range(min = 1))]
    pub threads: usize,

    pub malformed: MalformedPolicy,

    pub use_mmap: bool,
}

/// Per-run values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub work_group_size: Option<usize>,
    pub backend: Option<BackendKind>,
    pub device: Option<usize>,
    pub threads: Option<usize>,
    pub skip_malformed: bool,
    pub use_mmap: bool,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise
    /// `tempstats.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = Config::builder()
            .set_default("work_group_size", DEFAULT_WORK_GROUP_SIZE as i64)?
            .set_default("backend", "host")?
            .set_default("device", 0i64)?
            .set_default("threads", num_cpus::get() as i64)?
            .set_default("malformed", "abort")?
            .set_default("use_mmap", false)?;

        let builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder
                .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line overrides and re-validate.
    pub fn apply(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(size) = overrides.work_group_size {
            self.work_group_size = size;
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(threads) = overrides.threads {
            self.threads = threads;
        }
        if overrides.skip_malformed {
            self.malformed = MalformedPolicy::Skip;
        }
        if overrides.use_mmap {
            self.use_mmap = true;
        }

        self.validate()?;
        Ok(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            backend: BackendKind::Host,
            device: 0,
            threads: num_cpus::get(),
            malformed: MalformedPolicy::Abort,
            use_mmap: false,
        }
    }
}
