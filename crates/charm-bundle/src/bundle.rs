// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Typed model of a bundle document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::schema::{
    APPLICATION_FIELDS,
    BUNDLE_FIELDS,
    EXPOSED_ENDPOINT_FIELDS,
    MACHINE_FIELDS,
    OFFER_FIELDS,
    SAAS_FIELDS,
};
use crate::tree::{Node, Record, ToNode};

#[cfg(test)]
#[path = "./bundle_test.rs"]
mod bundle_test;

/// Bundle type for bundles deployed onto a Kubernetes model.
pub const KUBERNETES: &str = "kubernetes";

/// A deployment topology: applications, the machines they are placed on and
/// the relations between them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BundleData {
    /// Bundle type, empty for machine based bundles.
    #[serde(rename = "bundle", default, skip_serializing_if = "String::is_empty")]
    pub bundle_type: String,

    /// Applications by name. `services` is accepted as the legacy name.
    #[serde(
        default,
        alias = "services",
        deserialize_with = "lenient::records",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub applications: IndexMap<String, ApplicationSpec>,

    /// Machines by id. A machine without details is declared as `id: null`.
    #[serde(
        default,
        deserialize_with = "lenient::records",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub machines: IndexMap<String, MachineSpec>,

    /// Remote offers consumed by this bundle.
    #[serde(
        default,
        deserialize_with = "lenient::records",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub saas: IndexMap<String, SaasSpec>,

    /// Default series for applications and machines.
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "String::is_empty"
    )]
    pub series: String,

    /// Relation endpoint pairs, each side written as `application[:relation]`.
    #[serde(
        default,
        deserialize_with = "lenient::relations",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relations: Vec<Vec<String>>,

    #[serde(
        default,
        deserialize_with = "lenient::strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,

    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
}

impl BundleData {
    /// Parse a single YAML document into the model.
    pub fn from_yaml<S: AsRef<str>>(yaml: S) -> crate::Result<Self> {
        serde_yaml::from_str(yaml.as_ref()).map_err(crate::Error::Decode)
    }

    /// Render the model back to YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(crate::Error::Encode)
    }

    pub fn is_kubernetes(&self) -> bool {
        self.bundle_type == KUBERNETES
    }

    /// Distinct charm references in application order.
    pub fn required_charms(&self) -> Vec<&str> {
        let mut charms: Vec<&str> = Vec::new();
        for app in self.applications.values() {
            if !app.charm.is_empty() && !charms.contains(&app.charm.as_str()) {
                charms.push(app.charm.as_str());
            }
        }
        charms
    }
}

/// One deployable application and its units.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ApplicationSpec {
    /// Charm URL or local charm path.
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub charm: String,

    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub channel: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,

    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub series: String,

    /// Resource revisions (integers) or local resource paths (strings).
    #[serde(default, deserialize_with = "lenient::values", skip_serializing_if = "IndexMap::is_empty")]
    pub resources: IndexMap<String, Value>,

    /// Number of units; `scale` is accepted for Kubernetes bundles.
    #[serde(default, alias = "scale", skip_serializing_if = "is_zero_i64")]
    pub num_units: i64,

    /// Placement directives, one per unit.
    #[serde(default, deserialize_with = "lenient::strings", skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub expose: bool,

    /// Per-endpoint exposure settings. Overlay only.
    #[serde(
        rename = "exposed-endpoints",
        default,
        deserialize_with = "lenient::records",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub exposed_endpoints: IndexMap<String, ExposedEndpointSpec>,

    /// Charm configuration values.
    #[serde(default, deserialize_with = "lenient::values", skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, Value>,

    #[serde(default, deserialize_with = "lenient::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,

    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub constraints: String,

    /// Storage constraints by storage name.
    #[serde(default, deserialize_with = "lenient::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub storage: IndexMap<String, String>,

    /// Device constraints by device name.
    #[serde(default, deserialize_with = "lenient::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub devices: IndexMap<String, String>,

    /// Endpoint to space bindings. The empty key sets the default space.
    #[serde(
        rename = "bindings",
        default,
        deserialize_with = "lenient::string_map",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub endpoint_bindings: IndexMap<String, String>,

    /// Offers of this application's endpoints. Overlay only.
    #[serde(default, deserialize_with = "lenient::records", skip_serializing_if = "IndexMap::is_empty")]
    pub offers: IndexMap<String, OfferSpec>,

    /// Kubernetes placement.
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub placement: String,

    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub plan: String,

    #[serde(rename = "trust", default, skip_serializing_if = "is_false")]
    pub requires_trust: bool,
}

/// A machine that applications can be placed on.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MachineSpec {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub constraints: String,

    #[serde(default, deserialize_with = "lenient::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub annotations: IndexMap<String, String>,

    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub series: String,
}

/// An offer of one or more application endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OfferSpec {
    #[serde(default, deserialize_with = "lenient::strings", skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,

    /// Access levels by user name.
    #[serde(default, deserialize_with = "lenient::string_map", skip_serializing_if = "IndexMap::is_empty")]
    pub acl: IndexMap<String, String>,
}

/// Who an endpoint is exposed to.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExposedEndpointSpec {
    #[serde(
        rename = "expose-to-spaces",
        default,
        deserialize_with = "lenient::strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub expose_to_spaces: Vec<String>,

    #[serde(
        rename = "expose-to-cidrs",
        default,
        deserialize_with = "lenient::strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub expose_to_cidrs: Vec<String>,
}

/// A remote offer consumed by the bundle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SaasSpec {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub url: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

impl ToNode for BundleData {
    fn to_node(&self) -> Node {
        Record::new(BUNDLE_FIELDS)
            .field("bundle", &self.bundle_type)
            .field("applications", &self.applications)
            .field("machines", &self.machines)
            .field("saas", &self.saas)
            .field("series", &self.series)
            .field("relations", &self.relations)
            .field("tags", &self.tags)
            .field("description", &self.description)
            .build()
    }
}

impl ToNode for ApplicationSpec {
    fn to_node(&self) -> Node {
        Record::new(APPLICATION_FIELDS)
            .field("charm", &self.charm)
            .field("channel", &self.channel)
            .field("revision", &self.revision)
            .field("series", &self.series)
            .field("resources", &self.resources)
            .field("num_units", &self.num_units)
            .field("to", &self.to)
            .field("expose", &self.expose)
            .field("exposed-endpoints", &self.exposed_endpoints)
            .field("options", &self.options)
            .field("annotations", &self.annotations)
            .field("constraints", &self.constraints)
            .field("storage", &self.storage)
            .field("devices", &self.devices)
            .field("bindings", &self.endpoint_bindings)
            .field("offers", &self.offers)
            .field("placement", &self.placement)
            .field("plan", &self.plan)
            .field("trust", &self.requires_trust)
            .build()
    }
}

impl ToNode for MachineSpec {
    fn to_node(&self) -> Node {
        Record::new(MACHINE_FIELDS)
            .field("constraints", &self.constraints)
            .field("annotations", &self.annotations)
            .field("series", &self.series)
            .build()
    }
}

impl ToNode for OfferSpec {
    fn to_node(&self) -> Node {
        Record::new(OFFER_FIELDS)
            .field("endpoints", &self.endpoints)
            .field("acl", &self.acl)
            .build()
    }
}

impl ToNode for ExposedEndpointSpec {
    fn to_node(&self) -> Node {
        Record::new(EXPOSED_ENDPOINT_FIELDS)
            .field("expose-to-spaces", &self.expose_to_spaces)
            .field("expose-to-cidrs", &self.expose_to_cidrs)
            .build()
    }
}

impl ToNode for SaasSpec {
    fn to_node(&self) -> Node {
        Record::new(SAAS_FIELDS).field("url", &self.url).build()
    }
}

/// Deserializers that accept the loose scalar typing found in hand written
/// bundles: machine ids and placements written as integers, annotation
/// values written as numbers, and `null` standing in for an empty entry.
mod lenient {
    use indexmap::IndexMap;
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_yaml::Value;

    use crate::yaml::kind_name as kind;

    fn scalar_to_string(value: Value) -> Result<String, String> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s),
            Value::Tagged(tagged) => scalar_to_string(tagged.value),
            other => Err(format!("expected a string, found {}", kind(&other))),
        }
    }

    fn key_to_string(key: Value) -> Result<String, String> {
        scalar_to_string(key).map_err(|err| format!("invalid key: {err}"))
    }

    fn sequence(value: Value) -> Result<Vec<Value>, String> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => Ok(items),
            Value::Tagged(tagged) => sequence(tagged.value),
            other => Err(format!("expected a list, found {}", kind(&other))),
        }
    }

    fn mapping(value: Value) -> Result<Vec<(Value, Value)>, String> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Mapping(map) => Ok(map.into_iter().collect()),
            Value::Tagged(tagged) => mapping(tagged.value),
            other => Err(format!("expected a mapping, found {}", kind(&other))),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        scalar_to_string(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }

    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        sequence(Value::deserialize(deserializer)?)
            .and_then(|items| items.into_iter().map(scalar_to_string).collect())
            .map_err(D::Error::custom)
    }

    pub fn relations<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<String>>, D::Error> {
        let items = sequence(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        items
            .into_iter()
            .map(|pair| {
                sequence(pair).and_then(|eps| eps.into_iter().map(scalar_to_string).collect())
            })
            .collect::<Result<_, _>>()
            .map_err(D::Error::custom)
    }

    pub fn string_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, String>, D::Error> {
        mapping(Value::deserialize(deserializer)?)
            .and_then(|entries| {
                entries
                    .into_iter()
                    .map(|(k, v)| -> Result<(String, String), String> {
                        Ok((key_to_string(k)?, scalar_to_string(v)?))
                    })
                    .collect()
            })
            .map_err(D::Error::custom)
    }

    pub fn values<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, Value>, D::Error> {
        mapping(Value::deserialize(deserializer)?)
            .and_then(|entries| {
                entries
                    .into_iter()
                    .map(|(k, v)| -> Result<(String, Value), String> { Ok((key_to_string(k)?, v)) })
                    .collect()
            })
            .map_err(D::Error::custom)
    }

    pub fn records<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let entries = mapping(Value::deserialize(deserializer)?).map_err(D::Error::custom)?;
        let mut records = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            let name = key_to_string(key).map_err(D::Error::custom)?;
            let record = match value {
                Value::Null => T::default(),
                value => serde_yaml::from_value(value)
                    .map_err(|err| D::Error::custom(format!("{name}: {err}")))?,
            };
            records.insert(name, record);
        }
        Ok(records)
    }
}
