use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown on stderr while a run is in progress. Silent reporters
/// (e.g. JSON output) accept the same calls and draw nothing.
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new_spinner(message: &str, silent: bool) -> Self {
        if silent {
            return Self::silent();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { spinner: Some(pb) }
    }

    pub fn silent() -> Self {
        Self { spinner: None }
    }

    pub fn is_silent(&self) -> bool {
        self.spinner.is_none()
    }

    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.spinner {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(ref pb) = self.spinner {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn println(&self, message: &str) {
        match self.spinner {
            Some(ref pb) => pb.println(message),
            None => eprintln!("{}", message),
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.spinner {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}
