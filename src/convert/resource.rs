//! Volume and network mapping
//!
//! Declared volumes and networks only carry their name over. Services that
//! link to (or, optionally, depend on) each other additionally get a
//! generated network so they can resolve each other by name.

use crate::domain::{ConversionContext, Module, Resource, State, Task};

use super::Warnings;

/// A generated network shared by a group of services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNetwork {
    pub name: String,
    /// Member services in declaration order
    pub members: Vec<String>,
}

impl DependencyNetwork {
    /// Names the network `nw-` followed by its members joined with `-`
    pub fn new(members: Vec<String>) -> Self {
        Self {
            name: format!("nw-{}", members.join("-")),
            members,
        }
    }
}

/// Builds the generated networks from the graph's service groups
pub fn dependency_networks(groups: &[Vec<String>]) -> Vec<DependencyNetwork> {
    groups.iter().cloned().map(DependencyNetwork::new).collect()
}

/// Maps a declared network onto a podman_network task
pub fn map_network(network: &Resource, ctx: &ConversionContext, warnings: &mut Warnings) -> Task {
    map_resource(Module::Network, network, ctx, warnings)
}

/// Maps a declared volume onto a podman_volume task
pub fn map_volume(volume: &Resource, ctx: &ConversionContext, warnings: &mut Warnings) -> Task {
    map_resource(Module::Volume, volume, ctx, warnings)
}

/// Maps a generated network onto a podman_network task
pub fn map_dependency_network(network: &DependencyNetwork, ctx: &ConversionContext) -> Task {
    Task::ensure(Module::Network, &network.name, ctx.state)
}

fn map_resource(module: Module, resource: &Resource, ctx: &ConversionContext, warnings: &mut Warnings) -> Task {
    let task = Task::ensure(module, &resource.name, ctx.state);
    if ctx.state == State::Present {
        for key in resource.attributes.keys() {
            warnings.push(
                format!("{} {}", module.kind(), resource.name),
                format!("unsupported attribute '{}' skipped", key),
            );
        }
    }
    task
}
