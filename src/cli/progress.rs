use crate::pipeline::Stage;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// A RAII step counter for one caption that is removed when dropped.
pub struct Steps<'a> {
    /// The global progress bar collection that's integrated with the logger.
    global_progress: &'a MultiProgress,
    /// The progress bar for this caption.
    bar: ProgressBar,
}

impl<'a> Steps<'a> {
    /// Create a `[step/total]` bar for one caption, hooked into the global
    /// progress bar collection so log lines print above it.
    pub fn new(global_progress: &'a MultiProgress, caption: &str) -> Self {
        let bar = global_progress.add(ProgressBar::new(Stage::STEPS));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.blue} [{pos}/{len}] {prefix:.bold} {msg}",
            )
            .unwrap()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓",
            ]),
        );
        bar.set_prefix(caption.to_string());
        Self {
            global_progress,
            bar,
        }
    }

    pub fn advance(&self, stage: Stage) {
        self.bar.set_position(stage.step());
        self.bar.set_message(stage.to_string());
    }
}

impl Drop for Steps<'_> {
    fn drop(&mut self) {
        // Clean up the bar
        self.bar.finish();
        self.global_progress.remove(&self.bar);
    }
}
