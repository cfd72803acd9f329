//! Compose file loading
//!
//! Parses a compose document into a [`ComposeDocument`] and checks every
//! cross-reference before anything is mapped.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::domain::{ComposeDocument, FileResource, Resource, Service, DEFAULT_NETWORK};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read compose file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Compose document must be a mapping")]
    NotAMapping,

    #[error("Unsupported top-level key: {0}")]
    UnsupportedKey(String),

    #[error("Unsupported compose version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid '{section}' section: {message}")]
    InvalidSection { section: String, message: String },

    #[error("Service '{service}' references unknown {kind} '{name}'")]
    UnknownReference {
        service: String,
        kind: &'static str,
        name: String,
    },

    #[error("{kind} '{name}' has no 'file' attribute")]
    MissingFile { kind: &'static str, name: String },

    #[error("Secret and config share the name '{0}'")]
    NameClash(String),
}

/// Compose file format majors the converter understands
const SUPPORTED_VERSIONS: &[&str] = &["2", "3"];

/// Loads a compose document from a file
pub fn load_path(path: &Path) -> Result<ComposeDocument, SchemaError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content)
}

/// Loads a compose document from a reader, e.g. standard input
pub fn load_reader(mut reader: impl Read) -> Result<ComposeDocument, SchemaError> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|source| SchemaError::Read {
            path: PathBuf::from("-"),
            source,
        })?;
    parse_str(&content)
}

/// Parses and validates a compose document
pub fn parse_str(content: &str) -> Result<ComposeDocument, SchemaError> {
    let mapping = match serde_yaml::from_str::<Value>(content)? {
        Value::Mapping(mapping) => mapping,
        _ => return Err(SchemaError::NotAMapping),
    };

    let doc = from_mapping(mapping)?;
    validate(&doc)?;
    Ok(doc)
}

fn from_mapping(mapping: Mapping) -> Result<ComposeDocument, SchemaError> {
    let mut doc = ComposeDocument::default();

    for (key, value) in mapping {
        let key = match key {
            Value::String(key) => key,
            other => return Err(SchemaError::UnsupportedKey(scalar_text(&other))),
        };

        match key.as_str() {
            "version" => check_version(&value)?,
            "name" => {}
            k if k.starts_with("x-") => {}
            "services" => {
                doc.services = section::<Service>("services", value)?
                    .into_iter()
                    .map(|(name, service)| {
                        let mut service = service.unwrap_or_default();
                        service.name = name.clone();
                        (name, service)
                    })
                    .collect();
            }
            "volumes" => doc.volumes = resources("volumes", value)?,
            "networks" => doc.networks = resources("networks", value)?,
            "secrets" => doc.secrets = file_resources("secret", "secrets", value)?,
            "configs" => doc.configs = file_resources("config", "configs", value)?,
            _ => return Err(SchemaError::UnsupportedKey(key.clone())),
        }
    }

    Ok(doc)
}

fn check_version(value: &Value) -> Result<(), SchemaError> {
    let version = scalar_text(value);
    let major = version.split('.').next().unwrap_or_default();
    if SUPPORTED_VERSIONS.contains(&major) {
        Ok(())
    } else {
        Err(SchemaError::UnsupportedVersion(version))
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => format!("{:?}", other),
    }
}

/// Deserializes a top-level section whose entries may be empty (`db:`)
fn section<T: DeserializeOwned>(name: &str, value: Value) -> Result<IndexMap<String, Option<T>>, SchemaError> {
    if value.is_null() {
        return Ok(IndexMap::new());
    }
    serde_yaml::from_value(value).map_err(|e| SchemaError::InvalidSection {
        section: name.to_string(),
        message: e.to_string(),
    })
}

fn resources(name: &str, value: Value) -> Result<IndexMap<String, Resource>, SchemaError> {
    Ok(section::<IndexMap<String, Value>>(name, value)?
        .into_iter()
        .map(|(key, attributes)| {
            let resource = Resource {
                name: key.clone(),
                attributes: attributes.unwrap_or_default(),
            };
            (key, resource)
        })
        .collect())
}

fn file_resources(
    kind: &'static str,
    name: &str,
    value: Value,
) -> Result<IndexMap<String, FileResource>, SchemaError> {
    let mut result = IndexMap::new();
    for (key, attributes) in section::<IndexMap<String, Value>>(name, value)? {
        let mut attributes = attributes.unwrap_or_default();
        let file = match attributes.shift_remove("file") {
            Some(Value::String(file)) => file,
            _ => return Err(SchemaError::MissingFile { kind, name: key }),
        };
        let resource = FileResource {
            name: key.clone(),
            file,
            attributes,
        };
        result.insert(key, resource);
    }
    Ok(result)
}

/// Checks that every reference names a declared entity
pub fn validate(doc: &ComposeDocument) -> Result<(), SchemaError> {
    if let Some(name) = doc.secrets.keys().find(|name| doc.configs.contains_key(*name)) {
        return Err(SchemaError::NameClash(name.clone()));
    }

    for (service_name, service) in &doc.services {
        let unknown = |kind: &'static str, name: &str| SchemaError::UnknownReference {
            service: service_name.clone(),
            kind,
            name: name.to_string(),
        };

        let referenced_services = service
            .depends_on_names()
            .into_iter()
            .chain(service.link_targets())
            .chain(service.volumes_from_services());
        for name in referenced_services {
            if !doc.services.contains_key(name) {
                return Err(unknown("service", name));
            }
        }

        for secret in &service.secrets {
            if !doc.secrets.contains_key(secret.source()) {
                return Err(unknown("secret", secret.source()));
            }
        }
        for config in &service.configs {
            if !doc.configs.contains_key(config.source()) {
                return Err(unknown("config", config.source()));
            }
        }
        for network in service.networks.names() {
            if network != DEFAULT_NETWORK && !doc.networks.contains_key(network) {
                return Err(unknown("network", network));
            }
        }
        for volume in service.named_volumes() {
            if !doc.volumes.contains_key(&volume) {
                return Err(unknown("volume", &volume));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const NEXTCLOUD: &str = r#"
version: '2'

volumes:
  nextcloud:
  db:

services:
  db:
    image: mariadb:10.6
    volumes:
      - db:/var/lib/mysql
  app:
    image: nextcloud:fpm
    links:
      - db
    depends_on:
      - db
    volumes:
      - nextcloud:/var/www/html
  web:
    image: nginx
    links:
      - app
    volumes_from:
      - app
"#;

    #[test]
    fn parses_entities_in_declaration_order() {
        let doc = parse_str(NEXTCLOUD).unwrap();
        let services: Vec<_> = doc.services.keys().cloned().collect();
        assert_eq!(services, vec!["db", "app", "web"]);
        let volumes: Vec<_> = doc.volumes.keys().cloned().collect();
        assert_eq!(volumes, vec!["nextcloud", "db"]);
        assert_eq!(doc.services["app"].name, "app");
        assert!(doc.volumes["db"].attributes.is_empty());
    }

    #[test]
    fn load_from_file_and_reader() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docker-compose.yml");
        fs::write(&path, NEXTCLOUD).unwrap();

        assert_eq!(load_path(&path).unwrap().services.len(), 3);
        assert_eq!(load_reader(Cursor::new(NEXTCLOUD)).unwrap().services.len(), 3);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let result = load_path(&dir.path().join("missing.yml"));
        assert!(matches!(result, Err(SchemaError::Read { .. })));
    }

    #[test]
    fn invalid_yaml() {
        assert!(matches!(parse_str("services: [unclosed"), Err(SchemaError::Yaml(_))));
        assert!(matches!(parse_str("- a\n- b\n"), Err(SchemaError::NotAMapping)));
    }

    #[test]
    fn version_markers() {
        assert!(parse_str("version: '3.8'\nservices: {}\n").is_ok());
        assert!(parse_str("version: 2\n").is_ok());
        assert!(matches!(
            parse_str("version: '1'\n"),
            Err(SchemaError::UnsupportedVersion(v)) if v == "1"
        ));
    }

    #[test]
    fn ignorable_and_unknown_keys() {
        assert!(parse_str("name: demo\nx-common:\n  image: nginx\nservices: {}\n").is_ok());
        assert!(matches!(
            parse_str("services: {}\nextensions: {}\n"),
            Err(SchemaError::UnsupportedKey(k)) if k == "extensions"
        ));
    }

    #[test]
    fn unknown_service_reference() {
        let err = parse_str("services:\n  app:\n    image: x\n    depends_on: [db]\n").unwrap_err();
        assert_eq!(err.to_string(), "Service 'app' references unknown service 'db'");
    }

    #[test]
    fn unknown_volume_reference() {
        let err = parse_str("services:\n  db:\n    image: mariadb\n    volumes: ['data:/var/lib/mysql']\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownReference { kind: "volume", .. }));
    }

    #[test]
    fn unknown_secret_and_network() {
        let err = parse_str("services:\n  app:\n    image: x\n    secrets: [token]\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownReference { kind: "secret", .. }));

        let err = parse_str("services:\n  app:\n    image: x\n    networks: [front]\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownReference { kind: "network", .. }));
    }

    #[test]
    fn implicit_default_network() {
        let doc = parse_str("services:\n  app:\n    image: x\n    networks: [default, front]\nnetworks:\n  front:\n").unwrap();
        assert_eq!(doc.services["app"].networks.names(), vec!["default", "front"]);
    }

    #[test]
    fn secrets_need_a_file() {
        let doc = parse_str("secrets:\n  token:\n    file: ./token.txt\n").unwrap();
        assert_eq!(doc.secrets["token"].file, "./token.txt");

        let err = parse_str("secrets:\n  token:\n    external: true\n").unwrap_err();
        assert!(matches!(err, SchemaError::MissingFile { kind: "secret", .. }));
    }

    #[test]
    fn secret_and_config_names_clash() {
        let err = parse_str("secrets:\n  site:\n    file: a\nconfigs:\n  site:\n    file: b\n").unwrap_err();
        assert!(matches!(err, SchemaError::NameClash(n) if n == "site"));
    }

    #[test]
    fn invalid_section_shape() {
        let err = parse_str("services:\n  app:\n    ports: 80\n").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSection { .. }));
    }
}
