//! # Conversion Pipeline
//!
//! Turns a loaded [`ComposeDocument`] into an Ansible [`Document`].
//!
//! ## Stages
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Entity mapping | `secret`, `resource`, `service` | task groups per entity |
//! | Ordering | [`DependencyGraph`] | service creation order, network groups |
//! | Mode | `mode` | teardown reversal, env lookups |
//! | Assembly | `assemble` | task list or playbook |
//!
//! Mappers never fail. Attributes they cannot translate are reported as
//! [`Warning`]s, which are returned to the caller and never written into
//! the generated document.

mod assemble;
mod mode;
mod resource;
mod secret;
mod service;

use std::fmt;

use serde::Serialize;

use crate::domain::{
    ComposeDocument, ConversionContext, DependencyGraph, Document, GraphError, DEFAULT_NETWORK,
};

pub use assemble::{assemble, TaskSections};
pub use mode::{substitute_env, ModeController};
pub use resource::{dependency_networks, map_dependency_network, map_network, map_volume, DependencyNetwork};
pub use secret::{map_config, map_secret};
pub use service::{map_service, qualify_image, Placement};

/// A non-fatal conversion problem, reported to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Entity the warning is about, e.g. `service web`
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Warnings collected during one conversion
#[derive(Debug, Default)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn push(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.0.push(Warning {
            subject: subject.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Document,
    pub warnings: Vec<Warning>,
    /// Service creation order chosen by the dependency graph
    pub service_order: Vec<String>,
}

/// Converts a compose document
///
/// Fails only when the services form a dependency cycle.
pub fn convert(doc: &ComposeDocument, ctx: &ConversionContext) -> Result<Conversion, GraphError> {
    let mut warnings = Warnings::default();
    let mode = ModeController::new(ctx, &mut warnings);

    let graph = DependencyGraph::from_document(doc)?;
    let service_order = graph.creation_order()?;
    let networks = dependency_networks(&graph.network_groups(ctx.depends_network));

    let mut sections = TaskSections::default();
    for secret in doc.secrets.values() {
        sections.secrets.push(map_secret(secret, ctx, &mut warnings));
    }
    for config in doc.configs.values() {
        sections.secrets.push(map_config(config, ctx, &mut warnings));
    }
    for network in doc.networks.values() {
        sections.resources.push(map_network(network, ctx, &mut warnings));
    }
    for volume in doc.volumes.values() {
        sections.resources.push(map_volume(volume, ctx, &mut warnings));
    }
    for network in &networks {
        sections.dependency_networks.push(map_dependency_network(network, ctx));
    }

    let providers = doc.volume_providers();
    for name in &service_order {
        let service = doc
            .service(name)
            .ok_or_else(|| GraphError::ServiceNotFound(name.clone()))?;
        let placement = Placement {
            dependency_network: networks
                .iter()
                .find(|n| n.members.contains(name))
                .map(|n| n.name.clone()),
            shares_volumes: providers.contains(&name.as_str()),
            default_network_declared: doc.networks.contains_key(DEFAULT_NETWORK),
        };
        sections.services.extend(map_service(service, &placement, ctx, &mut warnings));
    }

    let document = assemble(sections, &mode, ctx, &mut warnings);

    Ok(Conversion {
        document,
        warnings: warnings.into_vec(),
        service_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileResource, Module, Resource, SecretExists, Service, State};

    fn nextcloud() -> ComposeDocument {
        let mut doc = ComposeDocument::default();
        let db = Service::new("db", "mariadb:10.6");
        let mut app = Service::new("app", "nextcloud:fpm");
        app.links = vec!["db".into()];
        let mut web = Service::new("web", "nginx");
        web.links = vec!["app".into()];
        web.volumes_from = vec!["app".into()];
        // declared out of dependency order on purpose
        doc.services.insert("web".into(), web);
        doc.services.insert("app".into(), app);
        doc.services.insert("db".into(), db);
        doc.volumes.insert("db".into(), Resource::new("db"));
        doc
    }

    fn names(conversion: &Conversion) -> Vec<String> {
        conversion.document.tasks().iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn creation_and_teardown_orders() {
        let doc = nextcloud();
        let present = convert(&doc, &ConversionContext::default()).unwrap();
        assert_eq!(present.service_order, vec!["db", "app", "web"]);
        assert_eq!(
            names(&present),
            vec![
                "deploy volume db",
                "deploy network nw-web-app-db",
                "deploy container db",
                "deploy container app",
                "deploy container web",
            ]
        );

        let ctx = ConversionContext {
            state: State::Absent,
            ..Default::default()
        };
        let absent = convert(&doc, &ctx).unwrap();
        let mut reversed = names(&absent);
        reversed.reverse();
        let expected: Vec<String> = names(&present).iter().map(|n| n.replace("deploy", "destroy")).collect();
        assert_eq!(reversed, expected);
    }

    #[test]
    fn depends_on_network_only_on_request() {
        let mut doc = ComposeDocument::default();
        let mut app = Service::new("app", "nextcloud:fpm");
        app.depends_on = crate::domain::DependsOn::List(vec!["db".into()]);
        doc.services.insert("db".into(), Service::new("db", "mariadb:10.6"));
        doc.services.insert("app".into(), app);

        let plain = convert(&doc, &ConversionContext::default()).unwrap();
        assert_eq!(names(&plain), vec!["deploy container db", "deploy container app"]);

        let ctx = ConversionContext {
            depends_network: true,
            ..Default::default()
        };
        let present = convert(&doc, &ctx).unwrap();
        assert_eq!(
            names(&present),
            vec!["deploy network nw-db-app", "deploy container db", "deploy container app"]
        );
        for task in present.document.tasks().iter().filter(|t| t.module == Module::Container) {
            assert_eq!(task.param("network"), Some(&serde_yaml::Value::from("nw-db-app")));
        }

        let ctx = ConversionContext {
            depends_network: true,
            state: State::Absent,
            ..Default::default()
        };
        let absent = convert(&doc, &ctx).unwrap();
        assert_eq!(
            names(&absent),
            vec!["destroy container app", "destroy container db", "destroy network nw-db-app"]
        );
    }

    #[test]
    fn cycle_aborts() {
        let mut doc = ComposeDocument::default();
        let mut a = Service::new("a", "busybox");
        a.depends_on = crate::domain::DependsOn::List(vec!["b".into()]);
        let mut b = Service::new("b", "busybox");
        b.depends_on = crate::domain::DependsOn::List(vec!["a".into()]);
        doc.services.insert("a".into(), a);
        doc.services.insert("b".into(), b);

        let err = convert(&doc, &ConversionContext::default()).unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn secrets_come_first() {
        let mut doc = nextcloud();
        doc.secrets.insert("token".into(), FileResource::new("token", "./token.txt"));
        let conversion = convert(&doc, &ConversionContext::default()).unwrap();
        let first = conversion.document.tasks()[0];
        assert_eq!(first.module, Module::Secret);
    }

    #[test]
    fn secret_policy_only_matters_when_present() {
        let mut doc = ComposeDocument::default();
        doc.secrets.insert("token".into(), FileResource::new("token", "./token.txt"));

        let run = |state, secret_exists| {
            let ctx = ConversionContext {
                state,
                secret_exists,
                ..Default::default()
            };
            convert(&doc, &ctx).unwrap().document.tasks()[0].params.clone()
        };

        assert_ne!(
            run(State::Present, SecretExists::SkipExisting),
            run(State::Present, SecretExists::Force)
        );
        assert_eq!(
            run(State::Absent, SecretExists::SkipExisting),
            run(State::Absent, SecretExists::Force)
        );
    }

    #[test]
    fn warnings_are_collected() {
        let mut doc = ComposeDocument::default();
        let mut svc = Service::new("web", "nginx");
        svc.unsupported.insert("privileged".into(), serde_yaml::Value::Bool(true));
        doc.services.insert("web".into(), svc);

        let conversion = convert(&doc, &ConversionContext::default()).unwrap();
        assert_eq!(conversion.warnings.len(), 1);
        assert_eq!(conversion.warnings[0].subject, "service web");
        assert_eq!(
            conversion.warnings[0].to_string(),
            "service web: unsupported attribute 'privileged' skipped"
        );
    }
}
