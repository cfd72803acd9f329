//! compose2ansible - Translate Docker Compose files into Podman Ansible
//!
//! A compose document is loaded into a declaration-ordered model, every
//! entity is mapped onto `containers.podman` module tasks, services are
//! ordered by their dependencies, and the result is written out as a
//! playbook or a bare task list.

pub mod domain;
pub mod storage;
pub mod convert;
pub mod cli;

pub use convert::{convert, Conversion, Warning};
pub use domain::{ComposeDocument, ConversionContext, DependencyGraph, Document, Task};
