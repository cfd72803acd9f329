//! Document output
//!
//! Writes the generated document as YAML. File output goes through a locked
//! sibling temp file that is renamed over the target, so readers never see
//! a partial document.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::domain::{Document, OutputTarget};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Output path is not writable: {0}")]
    NotWritable(PathBuf),

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Document marker opening every generated file
const DOCUMENT_START: &str = "---\n";

/// Renders the document as YAML text
pub fn render(document: &Document) -> Result<String, EmitError> {
    let body = serde_yaml::to_string(document)?;
    Ok(format!("{}{}", DOCUMENT_START, body))
}

/// Renders and writes the document to its target
pub fn emit(document: &Document, target: &OutputTarget) -> Result<(), EmitError> {
    let text = render(document)?;
    match target {
        OutputTarget::Stdout => write_stdout(&text),
        OutputTarget::File(path) => write_file(path, &text),
    }
}

fn write_stdout(text: &str) -> Result<(), EmitError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .and_then(|_| handle.flush())
        .map_err(|source| EmitError::Write {
            path: PathBuf::from("-"),
            source,
        })
}

/// Temp file removed again unless it was renamed into place
struct PendingFile {
    path: PathBuf,
    persisted: bool,
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Attempts at a fresh temp name before giving up
const TEMP_ATTEMPTS: u32 = 16;

/// Atomically replaces `path` with `text`
///
/// An existing target must be writable by the current user, even though
/// the rename only needs a writable directory.
pub fn write_file(path: &Path, text: &str) -> Result<(), EmitError> {
    let write_error = |source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Ok(metadata) = fs::metadata(path) {
        if metadata.is_dir() || metadata.permissions().readonly() {
            return Err(EmitError::NotWritable(path.to_path_buf()));
        }
        // Opening without truncation leaves the target untouched
        if let Err(err) = OpenOptions::new().write(true).open(path) {
            return Err(match err.kind() {
                io::ErrorKind::PermissionDenied => EmitError::NotWritable(path.to_path_buf()),
                _ => write_error(err),
            });
        }
    }

    let (file, mut pending) = create_temp(path).map_err(write_error)?;

    {
        let file = file;
        file.lock_exclusive().map_err(write_error)?;

        let mut writer = BufWriter::new(&file);
        writer.write_all(text.as_bytes()).map_err(write_error)?;
        writer.flush().map_err(write_error)?;
        // Lock is released when file is dropped
    }

    fs::rename(&pending.path, path).map_err(write_error)?;
    pending.persisted = true;

    Ok(())
}

/// Creates a temp file that did not exist before, so no file of the user
/// is ever truncated or removed
fn create_temp(path: &Path) -> io::Result<(File, PendingFile)> {
    let mut attempt = 0;
    loop {
        let candidate = temp_path(path, attempt);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => {
                let pending = PendingFile {
                    path: candidate,
                    persisted: false,
                };
                return Ok((file, pending));
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && attempt + 1 < TEMP_ATTEMPTS => {
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// `<name>.tmp`, then `<name>.tmp.1`, ... next to the target, so the
/// rename stays on one filesystem
fn temp_path(path: &Path, attempt: u32) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".tmp");
    if attempt > 0 {
        name.push(format!(".{}", attempt));
    }
    path.with_file_name(name)
}
