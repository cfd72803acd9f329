//! Conversion context
//!
//! The options of a single run, resolved once from the command line and
//! the configuration file, then passed read-only to every mapper.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Docker's default socket paths, as bind-mounted by compose services
pub const DOCKER_SOCKET_PATHS: &[&str] = &["/var/run/docker.sock", "/run/docker.sock"];

/// Podman socket of the system service
pub const PODMAN_ROOTFUL_SOCKET: &str = "/run/podman/podman.sock";

/// Podman socket of the user service, resolved on the target host
pub const PODMAN_ROOTLESS_SOCKET: &str = "{{ ansible_env.XDG_RUNTIME_DIR }}/podman/podman.sock";

/// Shape of the generated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// A complete playbook with a single play
    #[default]
    Playbook,
    /// A bare task list for inclusion in a role
    Tasks,
}

/// Target state of every generated task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Deploy the compose application
    #[default]
    Present,
    /// Tear the compose application down
    Absent,
}

impl State {
    /// Verb used in task names
    pub fn action(&self) -> &'static str {
        match self {
            State::Present => "deploy",
            State::Absent => "destroy",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Present => "present",
            State::Absent => "absent",
        }
    }
}

/// How podman_secret treats a secret that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SecretExists {
    /// Leave the existing secret untouched
    #[default]
    #[value(name = "skip_existing")]
    SkipExisting,
    /// Replace the existing secret
    #[value(name = "force")]
    Force,
}

impl SecretExists {
    /// podman_secret parameter enabling this policy
    pub fn as_param(&self) -> &'static str {
        match self {
            SecretExists::SkipExisting => "skip_existing",
            SecretExists::Force => "force",
        }
    }
}

/// Constants of the target runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Registry prepended to unqualified image names
    pub default_registry: String,

    /// Namespace of single-component image names
    pub default_library: String,

    /// Command used to build images from a `build` context
    pub build_command: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_registry: "docker.io".to_string(),
            default_library: "library".to_string(),
            build_command: "podman build".to_string(),
        }
    }
}

/// Where the generated document goes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

/// Immutable per-run options
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionContext {
    /// Create networks from `depends_on` relations as well as links
    pub depends_network: bool,
    pub kind: OutputKind,
    pub state: State,
    pub secret_exists: SecretExists,
    /// The secret policy was asked for explicitly rather than defaulted
    pub secret_exists_explicit: bool,
    /// Host pattern of the generated play
    pub hosts: String,
    /// Target a user-level podman instead of the system one
    pub rootless: bool,
    pub runtime: RuntimeSettings,
    pub output: OutputTarget,
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self {
            depends_network: false,
            kind: OutputKind::Playbook,
            state: State::Present,
            secret_exists: SecretExists::SkipExisting,
            secret_exists_explicit: false,
            hosts: "localhost".to_string(),
            rootless: false,
            runtime: RuntimeSettings::default(),
            output: OutputTarget::Stdout,
        }
    }
}

impl ConversionContext {
    /// Podman socket replacing bind mounts of the Docker socket
    pub fn podman_socket(&self) -> &'static str {
        if self.rootless {
            PODMAN_ROOTLESS_SOCKET
        } else {
            PODMAN_ROOTFUL_SOCKET
        }
    }

    /// Whether the play escalates privileges
    pub fn become_root(&self) -> bool {
        !self.rootless
    }
}
