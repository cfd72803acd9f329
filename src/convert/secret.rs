//! Secret and config mapping
//!
//! Podman has no config object, so configs become secrets as well and are
//! mounted into containers as files.

use crate::domain::{ConversionContext, FileResource, Module, State, Task};

use super::Warnings;

/// Maps a compose secret onto a podman_secret task
pub fn map_secret(secret: &FileResource, ctx: &ConversionContext, warnings: &mut Warnings) -> Task {
    map_file_resource("secret", secret, ctx, warnings)
}

/// Maps a compose config onto a podman_secret task
pub fn map_config(config: &FileResource, ctx: &ConversionContext, warnings: &mut Warnings) -> Task {
    map_file_resource("config", config, ctx, warnings)
}

fn map_file_resource(
    kind: &str,
    resource: &FileResource,
    ctx: &ConversionContext,
    warnings: &mut Warnings,
) -> Task {
    let mut task = Task::ensure(Module::Secret, &resource.name, ctx.state);
    if ctx.state == State::Absent {
        return task;
    }

    for key in resource.attributes.keys() {
        warnings.push(
            format!("{} {}", kind, resource.name),
            format!("unsupported attribute '{}' skipped", key),
        );
    }

    task.set("data", format!("{{{{ lookup('file', '{}') }}}}", resource.file));
    task.set(ctx.secret_exists.as_param(), true);
    task
}
