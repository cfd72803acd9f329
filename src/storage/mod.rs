//! # Storage Layer
//!
//! Everything that touches the filesystem or a stream.
//!
//! ## Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Compose document | YAML | input path or stdin |
//! | Playbook / task list | YAML with `---` marker | output path or stdout |
//! | Config | TOML | `--config` or platform config dir |
//!
//! ## Write Safety
//!
//! - [`emit`] writes to a sibling temp file under an exclusive `fs2` lock
//! - The temp file is renamed over the target, or removed on failure

mod config;
mod emitter;
mod loader;

pub use config::{Config, ConfigError, ConversionOptions, Defaults};
pub use emitter::{emit, render, write_file, EmitError};
pub use loader::{load_path, load_reader, parse_str, validate, SchemaError};
