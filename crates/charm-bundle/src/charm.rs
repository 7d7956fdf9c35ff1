// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! What the verifier needs to know about a charm: the relations it
//! declares and the configuration options it accepts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::placement::APPLICATION_NAME;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./charm_test.rs"]
mod charm_test;

/// Relation every charm provides without declaring it.
pub const JUJU_INFO: &str = "juju-info";

pub const METADATA_FILENAME: &str = "metadata.yaml";
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Charm data used to verify a bundle.
pub trait Charm {
    fn meta(&self) -> &Meta;
    fn config(&self) -> &Config;
}

/// Charms by the charm reference used in the bundle.
pub type CharmMap = BTreeMap<String, Box<dyn Charm>>;

/// Which side of a relation an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationRole {
    Provider,
    Requirer,
    Peer,
}

impl std::fmt::Display for RelationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RelationRole::Provider => "provider",
            RelationRole::Requirer => "requirer",
            RelationRole::Peer => "peer",
        })
    }
}

impl RelationRole {
    /// Whether an endpoint with this role can relate to one with `other`.
    pub fn is_counterpart(self, other: RelationRole) -> bool {
        matches!(
            (self, other),
            (RelationRole::Provider, RelationRole::Requirer)
                | (RelationRole::Requirer, RelationRole::Provider)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationScope {
    #[default]
    Global,
    Container,
}

/// A relation declared by a charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub name: String,
    pub role: RelationRole,
    pub interface: String,
    pub optional: bool,
    pub limit: i64,
    pub scope: RelationScope,
}

impl Relation {
    /// The relation every charm provides implicitly.
    pub fn juju_info() -> Self {
        Self {
            name: JUJU_INFO.to_string(),
            role: RelationRole::Provider,
            interface: JUJU_INFO.to_string(),
            optional: false,
            limit: 0,
            scope: RelationScope::Global,
        }
    }

    /// Whether this relation is the implicit `juju-info` one.
    pub fn is_implicit(&self) -> bool {
        self.name == JUJU_INFO && self.interface == JUJU_INFO && self.role == RelationRole::Provider
    }
}

/// A relation as written in metadata.yaml: either just the interface name
/// or a mapping with details.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelationDecl {
    Interface(String),
    Detailed {
        interface: String,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        limit: i64,
        #[serde(default)]
        scope: RelationScope,
    },
}

impl RelationDecl {
    fn into_relation(self, name: String, role: RelationRole) -> Relation {
        match self {
            RelationDecl::Interface(interface) => Relation {
                name,
                role,
                interface,
                optional: false,
                limit: 0,
                scope: RelationScope::Global,
            },
            RelationDecl::Detailed {
                interface,
                optional,
                limit,
                scope,
            } => Relation {
                name,
                role,
                interface,
                optional,
                limit,
                scope,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MetaDecl {
    #[serde(default)]
    name: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    subordinate: bool,
    #[serde(default)]
    provides: IndexMap<String, RelationDecl>,
    #[serde(default)]
    requires: IndexMap<String, RelationDecl>,
    #[serde(default)]
    peers: IndexMap<String, RelationDecl>,
    #[serde(default, rename = "extra-bindings")]
    extra_bindings: IndexMap<String, Value>,
    #[serde(default)]
    storage: IndexMap<String, Value>,
    #[serde(default)]
    devices: IndexMap<String, Value>,
    #[serde(default)]
    resources: IndexMap<String, Value>,
    #[serde(default)]
    series: Vec<String>,
}

fn relations(decls: IndexMap<String, RelationDecl>, role: RelationRole) -> IndexMap<String, Relation> {
    decls
        .into_iter()
        .map(|(name, decl)| {
            let relation = decl.into_relation(name.clone(), role);
            (name, relation)
        })
        .collect()
}

/// Charm metadata, as read from metadata.yaml.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "MetaDecl")]
pub struct Meta {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub subordinate: bool,
    pub provides: IndexMap<String, Relation>,
    pub requires: IndexMap<String, Relation>,
    pub peers: IndexMap<String, Relation>,
    /// Endpoints that can be bound to a space without being relations.
    pub extra_bindings: Vec<String>,
    pub storage: Vec<String>,
    pub devices: Vec<String>,
    pub resources: Vec<String>,
    pub series: Vec<String>,
}

impl From<MetaDecl> for Meta {
    fn from(decl: MetaDecl) -> Self {
        Self {
            name: decl.name,
            summary: decl.summary,
            description: decl.description,
            subordinate: decl.subordinate,
            provides: relations(decl.provides, RelationRole::Provider),
            requires: relations(decl.requires, RelationRole::Requirer),
            peers: relations(decl.peers, RelationRole::Peer),
            extra_bindings: decl.extra_bindings.into_keys().collect(),
            storage: decl.storage.into_keys().collect(),
            devices: decl.devices.into_keys().collect(),
            resources: decl.resources.into_keys().collect(),
            series: decl.series,
        }
    }
}

impl Meta {
    pub fn from_yaml<S: AsRef<str>>(yaml: S) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml.as_ref())
    }

    /// Find a declared relation by name, falling back to the implicit
    /// `juju-info` provider.
    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.provides
            .get(name)
            .or_else(|| self.requires.get(name))
            .or_else(|| self.peers.get(name))
            .cloned()
            .or_else(|| (name == JUJU_INFO).then(Relation::juju_info))
    }

    /// Relations that may take part in a relation with another application:
    /// everything provided or required, plus the implicit `juju-info`.
    pub fn relation_candidates(&self) -> Vec<Relation> {
        let mut candidates: Vec<Relation> = self
            .provides
            .values()
            .chain(self.requires.values())
            .cloned()
            .collect();
        if !self.provides.contains_key(JUJU_INFO) && !self.requires.contains_key(JUJU_INFO) {
            candidates.push(Relation::juju_info());
        }
        candidates
    }

    /// Whether `name` can be bound to a space: any declared relation or
    /// extra binding.
    pub fn has_endpoint(&self, name: &str) -> bool {
        self.provides.contains_key(name)
            || self.requires.contains_key(name)
            || self.peers.contains_key(name)
            || self.extra_bindings.iter().any(|b| b == name)
    }
}

/// Type of a configuration option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    String,
    Int,
    Float,
    Boolean,
    Secret,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OptionType::String => "string",
            OptionType::Int => "int",
            OptionType::Float => "float",
            OptionType::Boolean => "boolean",
            OptionType::Secret => "secret",
        })
    }
}

/// One option in config.yaml.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigOption {
    #[serde(rename = "type")]
    pub option_type: OptionType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<Value>,
}

impl ConfigOption {
    pub fn new(option_type: OptionType) -> Self {
        Self {
            option_type,
            description: String::new(),
            default: None,
        }
    }

    /// Coerce `value` to this option's type. Null is always accepted.
    pub fn validate(&self, name: &str, value: &Value) -> std::result::Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let coerced = match self.option_type {
            OptionType::String | OptionType::Secret => value.as_str().map(|_| value.clone()),
            OptionType::Int => coerce_int(value).map(Value::from),
            OptionType::Float => coerce_float(value).map(Value::from),
            OptionType::Boolean => coerce_bool(value).map(Value::Bool),
        };
        coerced.ok_or_else(|| {
            format!(
                "option {name:?} expected {}, got {}",
                self.option_type,
                describe_value(value)
            )
        })
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{s:?}"),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| crate::yaml::kind_name(other).to_string()),
    }
}

/// Charm configuration schema, as read from config.yaml.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub options: IndexMap<String, ConfigOption>,
}

impl Config {
    pub fn from_yaml<S: AsRef<str>>(yaml: S) -> std::result::Result<Self, serde_yaml::Error> {
        let config: Option<Self> = serde_yaml::from_str(yaml.as_ref())?;
        Ok(config.unwrap_or_default())
    }
}

/// Charm data held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharmData {
    pub meta: Meta,
    pub config: Config,
}

impl CharmData {
    pub fn new(meta: Meta, config: Config) -> Self {
        Self { meta, config }
    }

    /// Parse metadata.yaml and config.yaml content.
    pub fn from_yaml(metadata: &str, config: &str) -> std::result::Result<Self, serde_yaml::Error> {
        Ok(Self {
            meta: Meta::from_yaml(metadata)?,
            config: Config::from_yaml(config)?,
        })
    }

    /// Read an unpacked charm directory. config.yaml is optional.
    pub fn read_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let metadata_path = dir.join(METADATA_FILENAME);
        let metadata = read_file(&metadata_path)?;
        let meta = Meta::from_yaml(&metadata).map_err(|error| Error::InvalidCharm {
            path: metadata_path,
            error,
        })?;

        let config_path = dir.join(CONFIG_FILENAME);
        let config = if config_path.is_file() {
            let text = read_file(&config_path)?;
            Config::from_yaml(&text).map_err(|error| Error::InvalidCharm {
                path: config_path,
                error,
            })?
        } else {
            Config::default()
        };
        tracing::debug!(charm = %meta.name, path = %dir.display(), "loaded charm");
        Ok(Self { meta, config })
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|error| match error.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(PathBuf::from(path)),
        _ => Error::ReadFailed {
            path: path.to_path_buf(),
            error,
        },
    })
}

impl Charm for CharmData {
    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn config(&self) -> &Config {
        &self.config
    }
}

static CHARM_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:([a-z]+):)?(?:~([a-z0-9][a-zA-Z0-9+.-]*)/)?(?:([a-z]+(?:[a-z0-9]+)?)/)?({APPLICATION_NAME})(?:-(\d+))?$"
    ))
    .expect("static regex must compile")
});

const CHARM_SCHEMAS: &[&str] = &["cs", "ch", "local"];

/// Structural view of a charm reference, `[schema:][~user/][series/]name[-revision]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharmUrl {
    pub schema: String,
    pub user: String,
    pub series: String,
    pub name: String,
    pub revision: Option<u64>,
}

impl CharmUrl {
    pub fn parse(url: &str) -> std::result::Result<Self, String> {
        let captures = CHARM_URL_RE
            .captures(url)
            .ok_or_else(|| format!("cannot parse URL {url:?}"))?;
        let text = |i: usize| captures.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
        let schema = text(1);
        if !schema.is_empty() && !CHARM_SCHEMAS.contains(&schema.as_str()) {
            return Err(format!("cannot parse URL {url:?}: schema {schema:?} not valid"));
        }
        let revision = match captures.get(5) {
            Some(rev) => Some(
                rev.as_str()
                    .parse()
                    .map_err(|_| format!("cannot parse URL {url:?}: invalid revision"))?,
            ),
            None => None,
        };
        Ok(Self {
            schema,
            user: text(2),
            series: text(3),
            name: text(4),
            revision,
        })
    }
}

/// Whether a charm reference names a local charm directory.
pub fn is_local_charm_path(charm: &str) -> bool {
    charm.starts_with('.') || Path::new(charm).is_absolute()
}
