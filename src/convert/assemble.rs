//! Task assembly
//!
//! Concatenates the mapped task groups in creation order and wraps them in
//! the requested document shape.

use crate::domain::{ConversionContext, Document, OutputKind, Play, State, Task};

use super::{ModeController, Warnings};

/// Mapped tasks, grouped by what they create
#[derive(Debug, Clone, Default)]
pub struct TaskSections {
    /// Secrets, then configs
    pub secrets: Vec<Task>,
    /// Declared networks, then declared volumes
    pub resources: Vec<Task>,
    /// Generated networks shared by linked services
    pub dependency_networks: Vec<Task>,
    /// Build and container tasks in service creation order
    pub services: Vec<Task>,
}

impl TaskSections {
    /// All tasks in creation order
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks = self.secrets;
        tasks.extend(self.resources);
        tasks.extend(self.dependency_networks);
        tasks.extend(self.services);
        tasks
    }
}

/// Builds the final document from the mapped sections
pub fn assemble(
    sections: TaskSections,
    mode: &ModeController,
    ctx: &ConversionContext,
    warnings: &mut Warnings,
) -> Document {
    let tasks = mode.apply(sections.into_tasks(), warnings);

    match ctx.kind {
        OutputKind::Tasks => Document::Tasks(tasks),
        OutputKind::Playbook => Document::Playbook(vec![Play {
            name: play_name(ctx.state).to_string(),
            hosts: ctx.hosts.clone(),
            become_root: ctx.become_root(),
            tasks,
        }]),
    }
}

fn play_name(state: State) -> &'static str {
    match state {
        State::Present => "Deploy compose services",
        State::Absent => "Destroy compose services",
    }
}
