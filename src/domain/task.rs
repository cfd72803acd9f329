//! Ansible task descriptors
//!
//! A task is one module invocation: a display name, the fully-qualified
//! module name and its ordered parameters. Tasks serialize to the exact
//! mapping Ansible expects.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use super::context::State;

/// Ansible modules emitted by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Container,
    Network,
    Secret,
    Volume,
    Command,
}

impl Module {
    /// Fully-qualified collection name
    pub fn fqcn(&self) -> &'static str {
        match self {
            Module::Container => "containers.podman.podman_container",
            Module::Network => "containers.podman.podman_network",
            Module::Secret => "containers.podman.podman_secret",
            Module::Volume => "containers.podman.podman_volume",
            Module::Command => "ansible.builtin.command",
        }
    }

    /// Object kind used in task names
    pub fn kind(&self) -> &'static str {
        match self {
            Module::Container => "container",
            Module::Network => "network",
            Module::Secret => "secret",
            Module::Volume => "volume",
            Module::Command => "command",
        }
    }
}

/// The parameters identifying the object a task manages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub module: Module,
    pub name: String,
}

/// A single Ansible task
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub module: Module,
    pub params: Mapping,
    /// Variable receiving the task result
    pub register: Option<String>,
}

impl Task {
    /// Creates a task ensuring a podman object is in the given state
    ///
    /// `present` is the module default and is left implicit.
    pub fn ensure(module: Module, entity: &str, state: State) -> Self {
        let mut task = Self {
            name: format!("{} {} {}", state.action(), module.kind(), entity),
            module,
            params: Mapping::new(),
            register: None,
        };
        task.set("name", entity);
        if state != State::Present {
            task.set("state", state.as_str());
        }
        task
    }

    /// Creates an `ansible.builtin.command` task
    pub fn command(name: impl Into<String>, cmd: impl Into<String>, register: Option<String>) -> Self {
        let mut task = Self {
            name: name.into(),
            module: Module::Command,
            params: Mapping::new(),
            register,
        };
        let cmd: String = cmd.into();
        task.set("cmd", cmd);
        task
    }

    /// Sets a module parameter, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.params.insert(Value::from(key), value.into());
    }

    /// Returns a module parameter
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Name of the managed podman object
    pub fn entity(&self) -> Option<&str> {
        self.param("name").and_then(Value::as_str)
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        let name = match self.module {
            Module::Command => self.register.clone().unwrap_or_else(|| self.name.clone()),
            _ => self.entity().unwrap_or_default().to_string(),
        };
        IdempotencyKey {
            module: self.module,
            name,
        }
    }
}

impl Serialize for Task {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.register.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry(self.module.fqcn(), &self.params)?;
        if let Some(register) = &self.register {
            map.serialize_entry("register", register)?;
        }
        map.end()
    }
}

/// A play wrapping the generated tasks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Play {
    pub name: String,
    pub hosts: String,
    #[serde(rename = "become")]
    pub become_root: bool,
    pub tasks: Vec<Task>,
}

/// The generated automation document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Tasks(Vec<Task>),
    Playbook(Vec<Play>),
}

impl Document {
    /// All tasks in emission order
    pub fn tasks(&self) -> Vec<&Task> {
        match self {
            Document::Tasks(tasks) => tasks.iter().collect(),
            Document::Playbook(plays) => plays.iter().flat_map(|p| p.tasks.iter()).collect(),
        }
    }
}
