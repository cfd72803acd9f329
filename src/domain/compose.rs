//! Compose document model
//!
//! Entities are keyed by name and kept in declaration order, so every
//! pass over the document is deterministic.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// A parsed and validated compose document
#[derive(Debug, Clone, Default)]
pub struct ComposeDocument {
    pub services: IndexMap<String, Service>,
    pub volumes: IndexMap<String, Resource>,
    pub networks: IndexMap<String, Resource>,
    pub secrets: IndexMap<String, FileResource>,
    pub configs: IndexMap<String, FileResource>,
}

impl ComposeDocument {
    /// Returns a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Returns the names of services whose volumes are mounted elsewhere via `volumes_from`
    pub fn volume_providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = Vec::new();
        for service in self.services.values() {
            for provider in service.volumes_from_services() {
                if !providers.contains(&provider) {
                    providers.push(provider);
                }
            }
        }
        providers
    }
}

/// A named volume or network
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub name: String,
    /// Declared attributes (driver, driver_opts, ...)
    pub attributes: IndexMap<String, Value>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }
}

/// A file-backed secret or config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileResource {
    pub name: String,
    pub file: String,
    /// Attributes other than `file`
    pub attributes: IndexMap<String, Value>,
}

impl FileResource {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            attributes: IndexMap::new(),
        }
    }
}

/// A compose service
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Map key in the `services` section
    #[serde(skip)]
    pub name: String,
    pub image: Option<String>,
    pub build: Option<BuildSpec>,
    pub command: Option<Value>,
    pub hostname: Option<String>,
    pub environment: Option<KeyValues>,
    pub labels: Option<KeyValues>,
    pub restart: Option<String>,
    pub ports: Vec<Port>,
    pub volumes: Vec<VolumeMount>,
    pub volumes_from: Vec<String>,
    pub links: Vec<String>,
    pub depends_on: DependsOn,
    pub networks: ServiceNetworks,
    pub secrets: Vec<EntityRef>,
    pub configs: Vec<EntityRef>,
    pub shm_size: Option<Value>,
    /// Attributes without a podman_container equivalent
    #[serde(flatten)]
    pub unsupported: IndexMap<String, Value>,
}

impl Service {
    /// Creates an image-based service with no other attributes
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: Some(image.into()),
            ..Default::default()
        }
    }

    /// Services named in `depends_on`
    pub fn depends_on_names(&self) -> Vec<&str> {
        self.depends_on.names()
    }

    /// Services named in `links` (`service` or `service:alias`)
    pub fn link_targets(&self) -> Vec<&str> {
        self.links
            .iter()
            .map(|link| link.split(':').next().unwrap_or(link))
            .collect()
    }

    /// `(service, alias)` pairs of `links` entries carrying an alias
    pub fn link_aliases(&self) -> Vec<(&str, &str)> {
        self.links.iter().filter_map(|link| link.split_once(':')).collect()
    }

    /// Services named in `volumes_from`
    ///
    /// `container:<name>` entries point at containers outside the document
    /// and are left out.
    pub fn volumes_from_services(&self) -> Vec<&str> {
        self.volumes_from
            .iter()
            .filter(|entry| !entry.starts_with("container:"))
            .map(|entry| entry.split(':').next().unwrap_or(entry))
            .collect()
    }

    /// Named volumes mounted by this service
    pub fn named_volumes(&self) -> Vec<String> {
        self.volumes.iter().filter_map(VolumeMount::named_source).collect()
    }
}

/// `build` as a context path or a mapping
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BuildSpec {
    Context(String),
    Full(BuildLong),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BuildLong {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub args: Option<KeyValues>,
    #[serde(default)]
    pub target: Option<String>,
    /// Options `podman build` is not given (cache_from, labels, ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl BuildSpec {
    /// Arguments appended to the build command
    pub fn build_args(&self) -> String {
        match self {
            BuildSpec::Context(context) => context.clone(),
            BuildSpec::Full(build) => {
                let mut parts = Vec::new();
                if let Some(file) = &build.dockerfile {
                    parts.push(format!("-f {}", shell_word(file)));
                }
                for entry in build.args.iter().flat_map(KeyValues::entries) {
                    parts.push(format!("--build-arg {}", shell_word(&entry)));
                }
                if let Some(target) = &build.target {
                    parts.push(format!("--target {}", shell_word(target)));
                }
                parts.push(shell_word(build.context.as_deref().unwrap_or(".")));
                parts.join(" ")
            }
        }
    }

    pub fn extra_keys(&self) -> Vec<&str> {
        match self {
            BuildSpec::Context(_) => Vec::new(),
            BuildSpec::Full(build) => build.extra.keys().map(String::as_str).collect(),
        }
    }
}

/// Quotes a word for the command module, which splits on whitespace
fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "=_-./:,@%+{}$".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// `environment`/`labels` as `KEY=value` list or mapping
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KeyValues {
    List(Vec<String>),
    Map(IndexMap<String, Value>),
}

impl KeyValues {
    /// Converts to a mapping, keeping declaration order
    ///
    /// A list entry without `=` maps its key to an empty string.
    pub fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        match self {
            KeyValues::List(entries) => {
                for entry in entries {
                    let (key, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
                    mapping.insert(Value::from(key), Value::from(value));
                }
            }
            KeyValues::Map(map) => {
                for (key, value) in map {
                    mapping.insert(Value::from(key.as_str()), value.clone());
                }
            }
        }
        mapping
    }

    /// `KEY=value` entries, or a bare `KEY` for a list entry or null value
    pub fn entries(&self) -> Vec<String> {
        match self {
            KeyValues::List(entries) => entries.clone(),
            KeyValues::Map(map) => map
                .iter()
                .map(|(key, value)| match scalar_text(value) {
                    Some(value) => format!("{}={}", key, value),
                    None => key.clone(),
                })
                .collect(),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => serde_yaml::to_string(other).ok().map(|s| s.trim_end().to_string()),
    }
}

/// A `ports` entry
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Port {
    Number(u64),
    Short(String),
    Long(PortLong),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PortLong {
    pub target: u64,
    #[serde(default)]
    pub published: Option<Value>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    /// Options without a short form (mode, name, app_protocol)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Port {
    /// Short `[host_ip:][published:]target[/protocol]` form
    pub fn to_short(&self) -> String {
        match self {
            Port::Number(port) => port.to_string(),
            Port::Short(spec) => spec.clone(),
            Port::Long(long) => {
                let mut spec = String::new();
                if let Some(ip) = &long.host_ip {
                    spec.push_str(ip);
                    spec.push(':');
                }
                match &long.published {
                    Some(Value::String(published)) => {
                        spec.push_str(published);
                        spec.push(':');
                    }
                    Some(Value::Number(published)) => {
                        spec.push_str(&published.to_string());
                        spec.push(':');
                    }
                    _ => {}
                }
                spec.push_str(&long.target.to_string());
                if let Some(protocol) = &long.protocol {
                    spec.push('/');
                    spec.push_str(protocol);
                }
                spec
            }
        }
    }

    pub fn extra_keys(&self) -> Vec<&str> {
        match self {
            Port::Long(long) => long.extra.keys().map(String::as_str).collect(),
            Port::Number(_) | Port::Short(_) => Vec::new(),
        }
    }
}

/// A `volumes` entry of a service
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VolumeMount {
    Short(String),
    Long(VolumeMountLong),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VolumeMountLong {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub target: String,
    #[serde(default)]
    pub read_only: Option<bool>,
    /// Per-type options (bind, volume, tmpfs) and consistency
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl VolumeMountLong {
    /// `bind.propagation`, the one per-type option with a short form
    pub fn propagation(&self) -> Option<&str> {
        self.extra.get("bind")?.get("propagation")?.as_str()
    }

    /// Options the short form cannot carry, as dotted keys
    pub fn unsupported_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        for (key, value) in &self.extra {
            match (key.as_str(), value) {
                ("bind", Value::Mapping(bind)) => {
                    for option in bind.keys().filter_map(Value::as_str) {
                        if option != "propagation" {
                            options.push(format!("bind.{}", option));
                        }
                    }
                }
                (_, Value::Mapping(nested)) => {
                    for option in nested.keys().filter_map(Value::as_str) {
                        options.push(format!("{}.{}", key, option));
                    }
                }
                _ => options.push(key.clone()),
            }
        }
        options
    }
}

impl VolumeMount {
    /// Short `source:target[:options]` form
    pub fn to_short(&self) -> String {
        match self {
            VolumeMount::Short(spec) => spec.clone(),
            VolumeMount::Long(long) => {
                let mut parts: Vec<&str> = Vec::new();
                if let Some(source) = &long.source {
                    parts.push(source);
                }
                parts.push(&long.target);
                let mut options = Vec::new();
                if long.read_only == Some(true) {
                    options.push("ro");
                }
                if let Some(propagation) = long.propagation() {
                    options.push(propagation);
                }
                let options = options.join(",");
                if !options.is_empty() {
                    parts.push(&options);
                }
                parts.join(":")
            }
        }
    }

    /// Returns the source when it names a compose volume rather than a host path
    pub fn named_source(&self) -> Option<String> {
        match self {
            VolumeMount::Short(spec) => {
                let (source, _) = spec.split_once(':')?;
                is_named_volume(source).then(|| source.to_string())
            }
            VolumeMount::Long(long) => {
                if long.kind.as_deref().is_some_and(|kind| kind != "volume") {
                    return None;
                }
                long.source
                    .as_deref()
                    .filter(|source| is_named_volume(source))
                    .map(str::to_string)
            }
        }
    }
}

/// Host paths start with `/`, `.`, `~` or a variable reference
fn is_named_volume(source: &str) -> bool {
    !source.is_empty()
        && !source.starts_with(['/', '.', '~', '$'])
        && !source.contains('/')
}

/// `depends_on` as list or condition mapping
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Conditions(IndexMap<String, Value>),
}

impl Default for DependsOn {
    fn default() -> Self {
        DependsOn::List(Vec::new())
    }
}

impl DependsOn {
    pub fn names(&self) -> Vec<&str> {
        match self {
            DependsOn::List(names) => names.iter().map(String::as_str).collect(),
            DependsOn::Conditions(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// Compose's implicit project network, usable without a declaration
pub const DEFAULT_NETWORK: &str = "default";

/// Service-level `networks` as list or mapping
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServiceNetworks {
    List(Vec<String>),
    Map(IndexMap<String, Option<Value>>),
}

impl Default for ServiceNetworks {
    fn default() -> Self {
        ServiceNetworks::List(Vec::new())
    }
}

impl ServiceNetworks {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ServiceNetworks::List(names) => names.iter().map(String::as_str).collect(),
            ServiceNetworks::Map(map) => map.keys().map(String::as_str).collect(),
        }
    }

    /// True when any attachment carries options (aliases, addresses, ...)
    pub fn has_options(&self) -> bool {
        match self {
            ServiceNetworks::List(_) => false,
            ServiceNetworks::Map(map) => map.values().any(|v| !matches!(v, None | Some(Value::Null))),
        }
    }
}

/// A service's reference to a secret or config
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EntityRef {
    Name(String),
    Long(LongRef),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LongRef {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl EntityRef {
    pub fn source(&self) -> &str {
        match self {
            EntityRef::Name(name) => name,
            EntityRef::Long(long) => &long.source,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            EntityRef::Name(_) => None,
            EntityRef::Long(long) => long.target.as_deref(),
        }
    }

    /// Attributes other than `source` and `target` (uid, gid, mode)
    pub fn extra_keys(&self) -> Vec<&str> {
        match self {
            EntityRef::Name(_) => Vec::new(),
            EntityRef::Long(long) => long.extra.keys().map(String::as_str).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(yaml: &str) -> Service {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn service_collects_unsupported_attributes() {
        let svc = service("image: nginx\nprivileged: true\ncap_add: [NET_ADMIN]\n");
        assert_eq!(svc.image.as_deref(), Some("nginx"));
        let keys: Vec<_> = svc.unsupported.keys().cloned().collect();
        assert_eq!(keys, vec!["privileged", "cap_add"]);
    }

    #[test]
    fn environment_list_and_map() {
        let list = KeyValues::List(vec!["A=1".into(), "B=x=y".into(), "C".into()]);
        let mapping = list.to_mapping();
        assert_eq!(mapping.get("A"), Some(&Value::from("1")));
        assert_eq!(mapping.get("B"), Some(&Value::from("x=y")));
        assert_eq!(mapping.get("C"), Some(&Value::from("")));

        let svc = service("environment:\n  Z: last\n  A: first\n");
        let keys: Vec<_> = svc
            .environment
            .unwrap()
            .to_mapping()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["Z", "A"]);
    }

    #[test]
    fn depends_on_conditions() {
        let svc = service("depends_on:\n  db:\n    condition: service_healthy\n  cache:\n    condition: service_started\n");
        assert_eq!(svc.depends_on_names(), vec!["db", "cache"]);
    }

    #[test]
    fn link_and_volumes_from_targets() {
        let svc = service("links: [db, 'cache:redis']\nvolumes_from: [app, 'data:ro', 'container:other']\n");
        assert_eq!(svc.link_targets(), vec!["db", "cache"]);
        assert_eq!(svc.link_aliases(), vec![("cache", "redis")]);
        assert_eq!(svc.volumes_from_services(), vec!["app", "data"]);
    }

    #[test]
    fn named_volume_detection() {
        let svc = service(
            "volumes:\n  - db:/var/lib/mysql\n  - ./conf:/etc/conf\n  - /srv:/srv\n  - $HOME/x:/x\n  - /anon\n  - type: volume\n    source: cache\n    target: /cache\n  - type: bind\n    source: data\n    target: /data\n",
        );
        assert_eq!(svc.named_volumes(), vec!["db".to_string(), "cache".to_string()]);
    }

    #[test]
    fn long_syntax_short_forms() {
        let svc = service(
            "ports:\n  - 80\n  - '8080:80'\n  - target: 443\n    published: 8443\n    protocol: tcp\nvolumes:\n  - type: bind\n    source: /etc/hosts\n    target: /etc/hosts\n    read_only: true\n",
        );
        let ports: Vec<_> = svc.ports.iter().map(Port::to_short).collect();
        assert_eq!(ports, vec!["80", "8080:80", "8443:443/tcp"]);
        assert_eq!(svc.volumes[0].to_short(), "/etc/hosts:/etc/hosts:ro");
    }

    #[test]
    fn build_args() {
        assert_eq!(BuildSpec::Context("./app".into()).build_args(), "./app");
        let full = BuildSpec::Full(BuildLong {
            context: Some("./app".into()),
            dockerfile: Some("Containerfile".into()),
            ..Default::default()
        });
        assert_eq!(full.build_args(), "-f Containerfile ./app");
    }

    #[test]
    fn build_args_and_target() {
        let svc = service(
            "build:\n  context: .\n  args:\n    VERSION: 2\n    GREETING: hello world\n    TOKEN:\n  target: prod\n  cache_from: [app:latest]\n",
        );
        let build = svc.build.unwrap();
        assert_eq!(
            build.build_args(),
            "--build-arg VERSION=2 --build-arg 'GREETING=hello world' --build-arg TOKEN --target prod ."
        );
        assert_eq!(build.extra_keys(), vec!["cache_from"]);

        let svc = service("build:\n  args: [A=1, B]\n");
        assert_eq!(svc.build.unwrap().build_args(), "--build-arg A=1 --build-arg B .");
    }

    #[test]
    fn long_syntax_extras() {
        let svc = service(
            "ports:\n  - target: 80\n    published: 8080\n    mode: host\nvolumes:\n  - type: bind\n    source: /srv\n    target: /srv\n    bind:\n      propagation: rshared\n      create_host_path: true\n  - type: tmpfs\n    target: /run\n    tmpfs:\n      size: 1000\n    consistency: cached\n",
        );
        assert_eq!(svc.ports[0].to_short(), "8080:80");
        assert_eq!(svc.ports[0].extra_keys(), vec!["mode"]);

        let VolumeMount::Long(bind) = &svc.volumes[0] else {
            panic!("expected long syntax");
        };
        assert_eq!(svc.volumes[0].to_short(), "/srv:/srv:rshared");
        assert_eq!(bind.unsupported_options(), vec!["bind.create_host_path"]);

        let VolumeMount::Long(tmpfs) = &svc.volumes[1] else {
            panic!("expected long syntax");
        };
        assert_eq!(tmpfs.kind.as_deref(), Some("tmpfs"));
        assert_eq!(tmpfs.unsupported_options(), vec!["tmpfs.size", "consistency"]);
    }

    #[test]
    fn entity_refs() {
        let svc = service("secrets:\n  - token\n  - source: cert\n    target: /etc/cert.pem\n    mode: 0400\n");
        assert_eq!(svc.secrets[0].source(), "token");
        assert_eq!(svc.secrets[1].target(), Some("/etc/cert.pem"));
        assert_eq!(svc.secrets[1].extra_keys(), vec!["mode"]);
    }

    #[test]
    fn volume_providers_in_order() {
        let mut doc = ComposeDocument::default();
        let mut web = Service::new("web", "nginx");
        web.volumes_from = vec!["app".into()];
        let mut worker = Service::new("worker", "busybox");
        worker.volumes_from = vec!["app:ro".into()];
        doc.services.insert("app".into(), Service::new("app", "nextcloud"));
        doc.services.insert("web".into(), web);
        doc.services.insert("worker".into(), worker);
        assert_eq!(doc.volume_providers(), vec!["app"]);
    }
}
