//! Progress reporting for acquisition and consolidation batches

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Optional progress bar; every method is a no-op when disabled
#[derive(Clone, Default)]
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(total: usize, message: &str, enabled: bool) -> Self {
        if !enabled {
            return Self::default();
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        Self {
            progress_bar: Some(pb),
        }
    }

    pub fn set_message(&self, message: impl Into<String>) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.into());
        }
    }

    pub fn inc(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
    }

    pub fn finish(&self, message: impl Into<String>) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(message.into());
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.progress_bar.is_some()
    }
}
