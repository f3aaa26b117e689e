use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, StatsError};
use crate::models::{FixedPoint, Series};
use crate::utils::constants::DEFAULT_BUFFER_SIZE;

/// What to do with a line whose reading cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Stop loading at the first malformed line
    #[default]
    Abort,
    /// Record a diagnostic and keep going
    Skip,
}

/// A line that was skipped under [`MalformedPolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiagnostic {
    /// 1-based line number
    pub line: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedSeries {
    pub series: Series,
    pub diagnostics: Vec<LineDiagnostic>,
}

pub struct RecordLoader {
    policy: MalformedPolicy,
    use_mmap: bool,
}

impl RecordLoader {
    pub fn new() -> Self {
        Self {
            policy: MalformedPolicy::Abort,
            use_mmap: false,
        }
    }

    pub fn with_policy(mut self, policy: MalformedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    /// Read every reading from a file, in file order.
    pub fn load(&self, path: &Path) -> Result<LoadedSeries> {
        let file = File::open(path).map_err(|source| StatsError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

        let loaded = if self.use_mmap {
            self.load_mmap(&file)?
        } else {
            self.load_from_reader(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file))?
        };

        info!(
            path = %path.display(),
            records = loaded.series.len(),
            skipped = loaded.diagnostics.len(),
            "records loaded"
        );
        Ok(loaded)
    }

    /// Read readings from any buffered source.
    pub fn load_from_reader<R: BufRead>(&self, reader: R) -> Result<LoadedSeries> {
        let mut values = Vec::new();
        let mut diagnostics = Vec::new();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            self.accept(index + 1, &line, &mut values, &mut diagnostics)?;
        }

        Ok(LoadedSeries {
            series: Series::new(values),
            diagnostics,
        })
    }

    /// Read readings through a read-only memory map of the whole file.
    fn load_mmap(&self, file: &File) -> Result<LoadedSeries> {
        if file.metadata()?.len() == 0 {
            return Ok(LoadedSeries::default());
        }

        // SAFETY: the mapping is read-only and dropped before returning; the
        // file is not expected to be truncated while it is being loaded.
        let mmap = unsafe { Mmap::map(file)? };
        let mut values = Vec::new();
        let mut diagnostics = Vec::new();

        let bytes: &[u8] = &mmap;
        let content = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        for (index, line) in content.split(|b| *b == b'\n').enumerate() {
            self.accept(index + 1, line, &mut values, &mut diagnostics)?;
        }

        Ok(LoadedSeries {
            series: Series::new(values),
            diagnostics,
        })
    }

    fn accept(
        &self,
        line_number: usize,
        raw: &[u8],
        values: &mut Vec<FixedPoint>,
        diagnostics: &mut Vec<LineDiagnostic>,
    ) -> Result<()> {
        let parsed = std::str::from_utf8(raw)
            .map_err(|e| StatsError::InvalidReading(format!("invalid UTF-8: {}", e)))
            .and_then(Self::parse_line);

        match parsed {
            Ok(Some(value)) => values.push(value),
            Ok(None) => {}
            Err(e) => match self.policy {
                MalformedPolicy::Abort => {
                    return Err(StatsError::MalformedRecord {
                        line: line_number,
                        reason: e.to_string(),
                    });
                }
                MalformedPolicy::Skip => {
                    warn!(line = line_number, error = %e, "skipping malformed record");
                    diagnostics.push(LineDiagnostic {
                        line: line_number,
                        content: String::from_utf8_lossy(raw).trim_end().to_string(),
                        reason: e.to_string(),
                    });
                }
            },
        }

        Ok(())
    }

    /// Parse one record: the reading is the last whitespace-delimited token.
    /// Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<FixedPoint>> {
        match line.split_whitespace().next_back() {
            Some(token) => token.parse::<FixedPoint>().map(Some),
            None => Ok(None),
        }
    }
}

impl Default for RecordLoader {
    fn default() -> Self {
        Self::new()
    }
}
