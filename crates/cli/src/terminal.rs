//! Terminal implementations of the run log and progress sinks.
//!
//! Both share one spinner: progress messages update it, log lines are
//! printed above it.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use locsync_core::{LogSink, ProgressSink};

use crate::style;

#[derive(Clone)]
pub struct Terminal {
    spinner: ProgressBar,
}

impl Terminal {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let template = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(
            template.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl LogSink for Terminal {
    fn write(&self, line: &str) {
        // println on a hidden bar drops the line, suspend does not.
        self.spinner
            .suspend(|| println!("{}", style::log_line(line)));
    }
}

impl ProgressSink for Terminal {
    fn report(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }
}
