//! # Command-Line Interface
//!
//! Argument parsing, the conversion run and operator diagnostics.
//!
//! ## Streams
//!
//! - stdout carries the generated document when no output file is given
//! - stderr carries warnings, verbose logs and errors
//!
//! ## Output Formats
//!
//! Warnings honour the `--format` flag:
//! - `text` (default) - `Warning: service web: ...` lines
//! - `json` - one JSON object per warning
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for a log line per pipeline stage:
//! ```bash
//! compose2ansible --verbose docker-compose.yml site.yml
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 2 | Usage error |
//! | 3 | Invalid compose document |
//! | 4 | Dependency cycle |
//! | 5 | Invalid configuration or options |
//! | 6 | Output could not be written |
//! | 1 | Anything else |
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and convert, and [`exit_code()`] to
//! map its error onto a process exit code.

mod app;
mod output;

pub use app::{exit_code, run, Cli};
pub use output::{Output, OutputFormat};
