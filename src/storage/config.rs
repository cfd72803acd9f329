//! Configuration handling for compose2ansible
//!
//! Defaults for the conversion options are read from `config.toml` in the
//! platform config directory (e.g. `~/.config/compose2ansible/config.toml`)
//! or from a file named with `--config`. Command-line flags win over the
//! file, the file wins over built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ConversionContext, OutputKind, OutputTarget, RuntimeSettings, SecretExists, State};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default values for the conversion options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub kind: Option<OutputKind>,
    pub state: Option<State>,
    pub secret_exists: Option<SecretExists>,
    pub depends_network: Option<bool>,
    pub hosts: Option<String>,
    pub rootless: Option<bool>,
}

/// Options given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionOptions {
    pub depends_network: Option<bool>,
    pub kind: Option<OutputKind>,
    pub state: Option<State>,
    pub secret_exists: Option<SecretExists>,
    pub hosts: Option<String>,
    pub rootless: Option<bool>,
}

/// Loaded configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub runtime: RuntimeSettings,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Returns the default config file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "compose2ansible", "compose2ansible")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads the explicit config file, or the default one if it exists
    ///
    /// An explicit file must exist; a missing default file means built-in
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses configuration text
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Merges command-line options over the file's defaults
    pub fn resolve(
        &self,
        options: &ConversionOptions,
        input: &Path,
        output: Option<&Path>,
    ) -> Result<ConversionContext, ConfigError> {
        let builtin = ConversionContext::default();
        let defaults = &self.defaults;

        let hosts = options
            .hosts
            .clone()
            .or_else(|| defaults.hosts.clone())
            .unwrap_or(builtin.hosts);
        if hosts.trim().is_empty() {
            return Err(ConfigError::Invalid("hosts must not be empty".to_string()));
        }

        let output = match output {
            None => OutputTarget::Stdout,
            Some(path) if path == Path::new("-") => OutputTarget::Stdout,
            Some(path) => {
                if is_same_file(input, path) {
                    return Err(ConfigError::Invalid(format!(
                        "output path {} would overwrite the input",
                        path.display()
                    )));
                }
                OutputTarget::File(path.to_path_buf())
            }
        };

        Ok(ConversionContext {
            depends_network: options
                .depends_network
                .or(defaults.depends_network)
                .unwrap_or(builtin.depends_network),
            kind: options.kind.or(defaults.kind).unwrap_or(builtin.kind),
            state: options.state.or(defaults.state).unwrap_or(builtin.state),
            secret_exists: options
                .secret_exists
                .or(defaults.secret_exists)
                .unwrap_or(builtin.secret_exists),
            secret_exists_explicit: options.secret_exists.is_some(),
            hosts,
            rootless: options.rootless.or(defaults.rootless).unwrap_or(builtin.rootless),
            runtime: self.runtime.clone(),
            output,
        })
    }
}

fn is_same_file(input: &Path, output: &Path) -> bool {
    if input == Path::new("-") {
        return false;
    }
    if input == output {
        return true;
    }
    match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
