//! Service mapping
//!
//! Each service becomes one podman_container task, preceded by an image
//! build task when the service is built from a context.

use serde_yaml::{Mapping, Value};

use crate::domain::{
    ConversionContext, Module, Port, RuntimeSettings, Service, State, Task, VolumeMount,
    DEFAULT_NETWORK, DOCKER_SOCKET_PATHS,
};

use super::Warnings;

/// Where a service sits relative to the other services
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    /// Generated network the service joins
    pub dependency_network: Option<String>,
    /// Other services mount this service's volumes
    pub shares_volumes: bool,
    /// The document redefines the implicit `default` network
    pub default_network_declared: bool,
}

/// Maps a service onto its build and container tasks
pub fn map_service(
    service: &Service,
    placement: &Placement,
    ctx: &ConversionContext,
    warnings: &mut Warnings,
) -> Vec<Task> {
    let subject = format!("service {}", service.name);
    let mut tasks = Vec::new();
    let mut container = Task::ensure(Module::Container, &service.name, ctx.state);

    match (&service.build, &service.image) {
        (Some(build), _) => {
            let register = format!("__image_{}", variable_safe(&service.name));
            if ctx.state == State::Present {
                tasks.push(Task::command(
                    format!("build image for container {}", service.name),
                    format!("{} {}", ctx.runtime.build_command, build.build_args()),
                    Some(register.clone()),
                ));
            }
            container.set("image", format!("{{{{ {}.stdout_lines[-1] }}}}", register));
            for key in build.extra_keys() {
                warnings.push(subject.as_str(), format!("unsupported build option '{}' skipped", key));
            }
        }
        (None, Some(image)) => container.set("image", qualify_image(image, &ctx.runtime)),
        (None, None) => {
            if ctx.state == State::Present {
                warnings.push(subject.as_str(), "neither 'build' nor 'image' is defined");
            }
        }
    }

    if let Some(command) = &service.command {
        container.set("command", command.clone());
    }
    if let Some(hostname) = &service.hostname {
        container.set("hostname", hostname.as_str());
    }
    if let Some(restart) = &service.restart {
        container.set("restart_policy", restart.as_str());
    }

    if !service.ports.is_empty() {
        container.set("ports", strings(service.ports.iter().map(|p| p.to_short())));
    }
    for key in service.ports.iter().flat_map(Port::extra_keys) {
        warnings.push(subject.as_str(), format!("unsupported port option '{}' skipped", key));
    }

    let label = if placement.shares_volumes { "z" } else { "Z" };
    let mut volumes = Vec::new();
    let mut tmpfs = Mapping::new();
    for volume in &service.volumes {
        if let VolumeMount::Long(long) = volume {
            for option in long.unsupported_options() {
                warnings.push(subject.as_str(), format!("unsupported volume option '{}' skipped", option));
            }
            match long.kind.as_deref() {
                None | Some("bind") | Some("volume") => {}
                Some("tmpfs") => {
                    tmpfs.insert(Value::from(long.target.as_str()), Value::from(""));
                    continue;
                }
                Some(kind) => {
                    warnings.push(
                        subject.as_str(),
                        format!("unsupported volume type '{}' for {} skipped", kind, long.target),
                    );
                    continue;
                }
            }
        }
        let spec = remap_docker_socket(&volume.to_short(), ctx.podman_socket());
        volumes.push(with_selinux_label(&spec, label));
    }
    if !volumes.is_empty() {
        container.set("volumes", strings(volumes));
    }
    if !tmpfs.is_empty() {
        container.set("tmpfs", Value::Mapping(tmpfs));
    }

    if !service.volumes_from.is_empty() {
        container.set("volumes_from", strings(service.volumes_from.iter().cloned()));
    }

    if let Some(environment) = &service.environment {
        container.set("env", Value::Mapping(environment.to_mapping()));
    }
    if let Some(labels) = &service.labels {
        container.set("labels", Value::Mapping(labels.to_mapping()));
    }

    let mut secrets = Vec::new();
    for secret in &service.secrets {
        secrets.push(match secret.target() {
            Some(target) => format!("{},target={}", secret.source(), target),
            None => secret.source().to_string(),
        });
        for key in secret.extra_keys() {
            warnings.push(subject.as_str(), format!("unsupported secret option '{}' skipped", key));
        }
    }
    for config in &service.configs {
        let target = config
            .target()
            .map(str::to_string)
            .unwrap_or_else(|| format!("/{}", config.source()));
        secrets.push(format!("{},type=mount,target={}", config.source(), target));
        for key in config.extra_keys() {
            warnings.push(subject.as_str(), format!("unsupported config option '{}' skipped", key));
        }
    }
    if !secrets.is_empty() {
        container.set("secrets", strings(secrets));
    }

    if let Some(shm_size) = &service.shm_size {
        container.set("shm_size", shm_size.clone());
    }

    for (target, alias) in service.link_aliases() {
        warnings.push(
            subject.as_str(),
            format!("link alias '{}' for {} skipped", alias, target),
        );
    }

    let mut networks: Vec<String> = service
        .networks
        .names()
        .into_iter()
        .filter(|name| *name != DEFAULT_NETWORK || placement.default_network_declared)
        .map(str::to_string)
        .collect();
    if let Some(network) = &placement.dependency_network {
        networks.push(network.clone());
    }
    match networks.len() {
        0 => {}
        1 => container.set("network", networks.remove(0)),
        _ => container.set("network", strings(networks)),
    }
    if service.networks.has_options() {
        warnings.push(subject.as_str(), "network attachment options skipped");
    }

    for key in service.unsupported.keys() {
        warnings.push(subject.as_str(), format!("unsupported attribute '{}' skipped", key));
    }

    tasks.push(container);
    tasks
}

/// Prefixes an image name with the default registry and library
///
/// `nginx` becomes `docker.io/library/nginx`, `gitlab/gitlab-ee` becomes
/// `docker.io/gitlab/gitlab-ee`. Names with a registry part are kept.
pub fn qualify_image(image: &str, runtime: &RuntimeSettings) -> String {
    match image.matches('/').count() {
        0 => format!("{}/{}/{}", runtime.default_registry, runtime.default_library, image),
        1 => format!("{}/{}", runtime.default_registry, image),
        _ => image.to_string(),
    }
}

/// Rewrites the Docker socket as source or target of a bind mount
fn remap_docker_socket(spec: &str, podman_socket: &str) -> String {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() < 2 {
        return spec.to_string();
    }
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i < 2 && DOCKER_SOCKET_PATHS.contains(part) {
                podman_socket
            } else {
                *part
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Adds an SELinux relabel option unless one is already present
///
/// Anonymous volumes (a bare container path) are left alone.
fn with_selinux_label(spec: &str, label: &str) -> String {
    let mut parts: Vec<String> = spec.split(':').map(str::to_string).collect();
    match parts.len() {
        0 | 1 => spec.to_string(),
        2 => {
            parts.push(label.to_string());
            parts.join(":")
        }
        _ => {
            let options = parts.pop().unwrap_or_default();
            if options.split(',').any(|o| o == "z" || o == "Z") {
                return spec.to_string();
            }
            parts.push(format!("{},{}", options, label));
            parts.join(":")
        }
    }
}

/// Ansible variable names only allow letters, digits and underscores
fn variable_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn strings(items: impl IntoIterator<Item = String>) -> Value {
    Value::Sequence(items.into_iter().map(Value::String).collect())
}
