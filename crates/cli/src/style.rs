//! Terminal styling for run log lines and command output.

use console::Style;

/// Visual category of a run log line, derived from the prefix the run
/// logger puts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Fatal,
    Error,
    Debug,
    Banner,
    Success,
    Plain,
}

impl LineKind {
    pub fn classify(line: &str) -> Self {
        if line.starts_with("--- [FATAL]") {
            Self::Fatal
        } else if line.starts_with("[ERROR]") {
            Self::Error
        } else if line.starts_with("[DEBUG]") {
            Self::Debug
        } else if line.starts_with("---") && line.ends_with("---") {
            Self::Banner
        } else if line.trim_start().starts_with("> SUCCESS") {
            Self::Success
        } else {
            Self::Plain
        }
    }
}

/// Style one run log line for the terminal.
pub fn log_line(line: &str) -> String {
    let style = match LineKind::classify(line) {
        LineKind::Fatal => Style::new().red().bold(),
        LineKind::Error => Style::new().red(),
        LineKind::Debug => Style::new().dim(),
        LineKind::Banner => Style::new().bold(),
        LineKind::Success => Style::new().green(),
        LineKind::Plain => return line.to_string(),
    };
    style.apply_to(line).to_string()
}

/// Green `[OK]` check line.
pub fn ok(msg: &str) -> String {
    format!("  {} {}", Style::new().green().apply_to("[OK]"), msg)
}

/// Red `[FAIL]` check line.
pub fn fail(msg: &str) -> String {
    format!("  {} {}", Style::new().red().apply_to("[FAIL]"), msg)
}

/// Yellow warning with a marker.
pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}
