//! Domain models for compose2ansible
//!
//! Contains the compose model, the generated task model and the service
//! dependency graph, without any I/O concerns.

mod compose;
mod context;
mod graph;
mod task;

pub use compose::{
    BuildLong, BuildSpec, ComposeDocument, DependsOn, EntityRef, FileResource, KeyValues, LongRef,
    Port, PortLong, Resource, Service, ServiceNetworks, VolumeMount, VolumeMountLong,
    DEFAULT_NETWORK,
};
pub use context::{
    ConversionContext, OutputKind, OutputTarget, RuntimeSettings, SecretExists, State,
    DOCKER_SOCKET_PATHS, PODMAN_ROOTFUL_SOCKET, PODMAN_ROOTLESS_SOCKET,
};
pub use graph::{DependencyGraph, EdgeKind, GraphError};
pub use task::{Document, IdempotencyKey, Module, Play, Task};
