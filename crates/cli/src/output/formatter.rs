//! Terminal and JSON rendering shared by every command
//!
//! Human mode prints colored one-line reports, tables and progress bars.
//! JSON mode prints exactly one document per command on stdout and reports
//! errors as `{"error": ...}` on stderr.

use comfy_table::{ContentArrangement, Table, presets};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use super::OutputConfig;

/// What a piece of styled text stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// `bucket/object` references
    Object,
    Size,
    Timestamp,
    /// Field labels in `stat` and `acl get`
    Field,
    /// Upload session URLs
    Session,
    Done,
    Failed,
    Caution,
}

impl Role {
    fn style(self) -> Style {
        match self {
            Role::Object => Style::new().bold(),
            Role::Size | Role::Done => Style::new().green(),
            Role::Timestamp => Style::new().dim(),
            Role::Field => Style::new().cyan(),
            Role::Session => Style::new().cyan().underlined(),
            Role::Failed => Style::new().red(),
            Role::Caution => Style::new().yellow(),
        }
    }

    fn mark(self) -> &'static str {
        match self {
            Role::Done => "✓",
            Role::Failed => "✗",
            Role::Caution => "⚠",
            _ => "",
        }
    }
}

/// Renders command results according to the global output flags
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn colors_enabled(&self) -> bool {
        self.config.colored()
    }

    fn paint(&self, role: Role, text: &str) -> String {
        if self.config.colored() {
            role.style().apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn marked(&self, role: Role, message: &str) -> String {
        format!("{} {message}", self.paint(role, role.mark()))
    }

    pub fn style_name(&self, text: &str) -> String {
        self.paint(Role::Object, text)
    }

    pub fn style_size(&self, text: &str) -> String {
        self.paint(Role::Size, text)
    }

    pub fn style_date(&self, text: &str) -> String {
        self.paint(Role::Timestamp, text)
    }

    pub fn style_key(&self, text: &str) -> String {
        self.paint(Role::Field, text)
    }

    pub fn style_url(&self, text: &str) -> String {
        self.paint(Role::Session, text)
    }

    /// Human-readable byte count
    pub fn format_size(&self, bytes: u64) -> String {
        humansize::format_size(bytes, humansize::BINARY)
    }

    /// Report a completed operation; silent in JSON and quiet modes
    pub fn success(&self, message: &str) {
        if self.config.chatty() {
            println!("{}", self.marked(Role::Done, message));
        }
    }

    /// Report a failure on stderr, whatever the mode
    pub fn error(&self, message: &str) {
        if !self.config.json {
            eprintln!("{}", self.marked(Role::Failed, message));
            return;
        }
        let document = serde_json::json!({ "error": message });
        match serde_json::to_string_pretty(&document) {
            Ok(text) => eprintln!("{text}"),
            Err(_) => eprintln!("{message}"),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.chatty() {
            eprintln!("{}", self.marked(Role::Caution, message));
        }
    }

    /// Print `value` as the command's JSON document
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Plain line on stdout, dropped in quiet mode
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// Table for listings, without box drawing when colors are off
    pub fn table(&self, header: &[&str]) -> Table {
        let mut table = Table::new();
        if self.colors_enabled() {
            table.load_preset(presets::UTF8_FULL_CONDENSED);
        } else {
            table.load_preset(presets::ASCII_MARKDOWN).force_no_tty();
        }
        table
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.iter().copied());
        table
    }

    /// Byte progress bar, or `None` in JSON and quiet modes
    pub fn progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if !self.config.chatty() {
            return None;
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        Some(pb)
    }
}
