//! Output formatting for the CLI

mod formatter;

pub use formatter::Formatter;

/// Output settings from the global flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Strict JSON on stdout, no colors or progress
    pub json: bool,
    pub no_color: bool,
    /// Suppress everything except errors
    pub quiet: bool,
}

impl OutputConfig {
    pub fn from_flags(json: bool, no_color: bool, quiet: bool) -> Self {
        Self {
            json,
            no_color,
            quiet,
        }
    }

    /// ANSI styling is used only for human output with colors allowed
    pub fn colored(&self) -> bool {
        !self.json && !self.no_color
    }

    /// Whether progress bars, notes and warnings reach the terminal
    pub fn chatty(&self) -> bool {
        !self.json && !self.quiet
    }
}
