pub mod record_loader;

pub use record_loader::{LineDiagnostic, LoadedSeries, MalformedPolicy, RecordLoader};
