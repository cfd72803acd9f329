//! Diagnostic output for the CLI
//!
//! The generated document owns stdout, so everything printed here goes to
//! stderr.

use crate::convert::Warning;

/// Diagnostic format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Formats a conversion warning
    pub fn format_warning(&self, warning: &Warning) -> String {
        match self.format {
            OutputFormat::Text => format!("Warning: {}", warning),
            OutputFormat::Json => serde_json::json!({
                "level": "warning",
                "subject": warning.subject,
                "message": warning.message,
            })
            .to_string(),
        }
    }

    /// Prints a conversion warning
    pub fn warning(&self, warning: &Warning) {
        eprintln!("{}", self.format_warning(warning));
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning() -> Warning {
        Warning {
            subject: "service web".into(),
            message: "unsupported attribute 'privileged' skipped".into(),
        }
    }

    #[test]
    fn text_warning() {
        let output = Output::new(OutputFormat::Text, false);
        assert_eq!(
            output.format_warning(&warning()),
            "Warning: service web: unsupported attribute 'privileged' skipped"
        );
    }

    #[test]
    fn json_warning() {
        let output = Output::new(OutputFormat::Json, true);
        let line = output.format_warning(&warning());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "warning");
        assert_eq!(value["subject"], "service web");
        assert_eq!(value["message"], "unsupported attribute 'privileged' skipped");
    }
}
