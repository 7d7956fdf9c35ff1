// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Merging a base bundle document with its overlays.
//!
//! Merging happens on raw YAML values rather than on the typed model, so
//! that an explicit `null` (remove) can be told apart from an omitted field
//! (keep) and so that anchors may be shared between every document involved.
//! How each field merges is decided by the tables in [`crate::schema`].

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use crate::bundle::BundleData;
use crate::schema::{self, BUNDLE_FIELDS, FieldDef, MergeRule};
use crate::source::BundleDataSource;
use crate::yaml::{PresenceMap, into_mapping, parse_documents};
use crate::{Error, INCLUDE_BASE64_PREFIX, INCLUDE_FILE_PREFIX, Result};

#[cfg(test)]
#[path = "./compose_test.rs"]
mod compose_test;

const APPLICATIONS: &str = "applications";
const SERVICES: &str = "services";
const NUM_UNITS: &str = "num_units";
const SCALE: &str = "scale";
const RELATIONS: &str = "relations";

/// The outcome of merging every part of a set of sources.
#[derive(Debug, Clone)]
pub struct ComposedBundle {
    /// All parts merged, includes resolved.
    pub bundle: BundleData,
    /// The first part on its own, includes resolved.
    pub base: BundleData,
    /// Base path of every source, in the order given.
    pub base_paths: Vec<PathBuf>,
    /// Total number of documents merged.
    pub part_count: usize,
}

/// Merge every part of `sources`, in order, into a single bundle.
///
/// The first part of the first source is the base document and is taken as
/// it is. Every later part is an overlay applied on top of what came before.
/// All parts are parsed together, so an alias may refer to an anchor defined
/// in any earlier part of any source.
pub fn compose_bundle(sources: &[&dyn BundleDataSource]) -> Result<ComposedBundle> {
    let mut texts = Vec::new();
    let mut owners = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        tracing::debug!(source = %source.describe(), parts = source.parts().len(), "reading bundle source");
        for part in source.parts() {
            texts.push(part.text.as_str());
            owners.push(index);
        }
    }
    if texts.is_empty() {
        return Err(Error::EmptyBundle);
    }

    let values = parse_documents(&texts)?;
    let mut merged = Mapping::new();
    let mut base = Mapping::new();
    for (part, (value, owner)) in values.into_iter().zip(owners).enumerate() {
        let source = sources[owner];
        let mut document = normalise_part(part, value)?;
        resolve_includes(&mut document, source)?;

        if part == 0 {
            strip_null_fields(&mut document, BUNDLE_FIELDS);
            base = document.clone();
            merged = document;
        } else {
            tracing::debug!(part, source = %source.describe(), "applying overlay");
            let presence = PresenceMap::from_value(&Value::Mapping(document.clone()));
            apply_overlay(&mut merged, &document, &presence);
        }
    }

    Ok(ComposedBundle {
        bundle: decode(merged)?,
        base: decode(base)?,
        base_paths: sources.iter().map(|s| s.base_path().to_path_buf()).collect(),
        part_count: texts.len(),
    })
}

/// Merge already decoded documents onto `base`, in order.
///
/// Fields holding their zero value are not serialized and therefore count
/// as absent, so typed overlays can add and override but never remove.
pub fn merge_bundle_data(base: &BundleData, overlays: &[BundleData]) -> Result<BundleData> {
    let mut merged = into_mapping(0, serde_yaml::to_value(base).map_err(Error::Encode)?)?;
    for (index, overlay) in overlays.iter().enumerate() {
        let value = serde_yaml::to_value(overlay).map_err(Error::Encode)?;
        let presence = PresenceMap::from_value(&value);
        let document = into_mapping(index + 1, value)?;
        apply_overlay(&mut merged, &document, &presence);
    }
    decode(merged)
}

fn decode(document: Mapping) -> Result<BundleData> {
    serde_yaml::from_value(Value::Mapping(document)).map_err(Error::Decode)
}

/// Check the part is a mapping and rewrite legacy key names.
fn normalise_part(part: usize, value: Value) -> Result<Mapping> {
    let mut document = into_mapping(part, value)?;
    rename_key(&mut document, SERVICES, APPLICATIONS, || format!("bundle part {part}"))?;
    if let Some(Value::Mapping(apps)) = document.get_mut(APPLICATIONS) {
        for (name, app) in apps.iter_mut() {
            if let Value::Mapping(app) = app {
                let name = schema_key(name);
                rename_key(app, SCALE, NUM_UNITS, || {
                    format!("application {name:?} in bundle part {part}")
                })?;
            }
        }
    }
    Ok(document)
}

/// Move `legacy` to `current`, keeping its position. Both present is an error.
fn rename_key(
    map: &mut Mapping,
    legacy: &'static str,
    current: &'static str,
    location: impl FnOnce() -> String,
) -> Result<()> {
    if !map.contains_key(legacy) {
        return Ok(());
    }
    if map.contains_key(current) {
        return Err(Error::ConflictingKeys {
            location: location(),
            current,
            legacy,
        });
    }
    let entries = std::mem::take(map);
    for (key, value) in entries {
        let key = match key {
            Value::String(s) if s == legacy => Value::String(current.to_string()),
            key => key,
        };
        map.insert(key, value);
    }
    Ok(())
}

fn schema_key(key: &Value) -> String {
    crate::tree::key_string(key)
}

/// Drop record fields explicitly set to null, leaving null entries of named
/// collections (a machine declared as `"0":`) alone.
fn strip_null_fields(record: &mut Mapping, fields: &'static [FieldDef]) {
    let keys: Vec<Value> = record.keys().cloned().collect();
    for key in keys {
        if record.get(&key).is_some_and(Value::is_null) {
            record.shift_remove(&key);
            continue;
        }
        let MergeRule::Keyed { fields, .. } = schema::lookup(fields, &schema_key(&key)).merge else {
            continue;
        };
        if let Some(Value::Mapping(entries)) = record.get_mut(&key) {
            for entry in entries.values_mut() {
                if let Value::Mapping(entry) = entry {
                    strip_null_fields(entry, fields);
                }
            }
        }
    }
}

/// Apply one overlay document to the merged result.
fn apply_overlay(merged: &mut Mapping, overlay: &Mapping, presence: &PresenceMap) {
    let mut removed = Vec::new();
    merge_record(merged, overlay, presence, BUNDLE_FIELDS, &mut removed);

    if !removed.is_empty() {
        tracing::debug!(?removed, "removing relations of deleted entries");
        remove_relations(merged, &removed);
    }

    // Appended after removals, so relations added here are never cascaded away.
    for def in BUNDLE_FIELDS.iter().filter(|f| f.merge == MergeRule::Append) {
        if !presence.is_present(def.name) {
            continue;
        }
        match overlay.get(def.name) {
            None | Some(Value::Null) => {
                merged.shift_remove(def.name);
            }
            Some(Value::Sequence(items)) => {
                let mut combined = match merged.get_mut(def.name).map(std::mem::take) {
                    Some(Value::Sequence(existing)) => existing,
                    _ => Vec::new(),
                };
                combined.extend(items.iter().cloned());
                merged.insert(Value::String(def.name.to_string()), Value::Sequence(combined));
            }
            Some(other) => {
                merged.insert(Value::String(def.name.to_string()), other.clone());
            }
        }
    }
}

/// Merge the fields `presence` says the overlay record sets. Append fields
/// are left to the caller. Names of removed entries whose removal cascades to
/// relations are collected into `removed`.
fn merge_record(
    target: &mut Mapping,
    overlay: &Mapping,
    presence: &PresenceMap,
    fields: &'static [FieldDef],
    removed: &mut Vec<String>,
) {
    for name in presence.fields() {
        let def = schema::lookup(fields, name);
        if def.merge == MergeRule::Append {
            continue;
        }
        let value = overlay.get(name).unwrap_or(&Value::Null);
        if value.is_null() {
            if let MergeRule::Keyed {
                cascade_relations: true,
                ..
            } = def.merge
            {
                if let Some(Value::Mapping(entries)) = target.get(name) {
                    removed.extend(entries.keys().map(schema_key));
                }
            }
            target.shift_remove(name);
            continue;
        }

        match (def.merge, value) {
            (MergeRule::MergeKeys, Value::Mapping(entries)) => {
                with_child_mapping(target, name, |existing| {
                    for (key, value) in entries {
                        if value.is_null() {
                            existing.shift_remove(key);
                        } else {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                });
            }
            (
                MergeRule::Keyed {
                    fields,
                    cascade_relations,
                },
                Value::Mapping(entries),
            ) => {
                let entry_presence = presence.for_field(name);
                with_child_mapping(target, name, |existing| {
                    for (key, value) in entries {
                        let key_name = schema_key(key);
                        match value {
                            Value::Null => {
                                if existing.shift_remove(key).is_some() && cascade_relations {
                                    removed.push(key_name);
                                }
                            }
                            Value::Mapping(entry) => {
                                let nested = entry_presence.for_field(&key_name);
                                with_child_mapping(existing, &key_name, |record| {
                                    merge_record(record, entry, &nested, fields, removed);
                                });
                            }
                            other => {
                                existing.insert(key.clone(), other.clone());
                            }
                        }
                    }
                });
            }
            (_, value) => {
                target.insert(Value::String(name.to_string()), value.clone());
            }
        }
    }
}

/// Run `f` on the mapping stored under `key`, creating it when missing or
/// not a mapping. An existing key keeps its position.
fn with_child_mapping<F>(map: &mut Mapping, key: &str, f: F)
where
    F: FnOnce(&mut Mapping),
{
    let mut child = match map.get_mut(key).map(std::mem::take) {
        Some(Value::Mapping(child)) => child,
        _ => Mapping::new(),
    };
    f(&mut child);
    map.insert(Value::String(key.to_string()), Value::Mapping(child));
}

/// Remove every relation with an endpoint on one of `names`.
fn remove_relations(merged: &mut Mapping, names: &[String]) {
    let Some(Value::Sequence(relations)) = merged.get_mut(RELATIONS) else {
        return;
    };
    relations.retain(|pair| {
        let Value::Sequence(endpoints) = pair else {
            return true;
        };
        !endpoints.iter().any(|endpoint| {
            endpoint
                .as_str()
                .map(|ep| ep.split(':').next().unwrap_or(ep))
                .is_some_and(|app| names.iter().any(|n| n == app))
        })
    });
}

/// Replace include directives in application options and annotations and in
/// machine annotations with the content they refer to.
fn resolve_includes(document: &mut Mapping, source: &dyn BundleDataSource) -> Result<()> {
    if let Some(Value::Mapping(apps)) = document.get_mut(APPLICATIONS) {
        for (name, app) in apps.iter_mut() {
            let Value::Mapping(app) = app else {
                continue;
            };
            let name = schema_key(name);
            for field in ["options", "annotations"] {
                resolve_map_includes(app, field, source, |key| {
                    format!("{} {key:?} for application {name:?}", singular(field))
                })?;
            }
        }
    }
    if let Some(Value::Mapping(machines)) = document.get_mut("machines") {
        for (id, machine) in machines.iter_mut() {
            let Value::Mapping(machine) = machine else {
                continue;
            };
            let id = schema_key(id);
            resolve_map_includes(machine, "annotations", source, |key| {
                format!("annotation {key:?} for machine {id:?}")
            })?;
        }
    }
    Ok(())
}

fn singular(field: &str) -> &str {
    field.strip_suffix('s').unwrap_or(field)
}

fn resolve_map_includes<C>(
    record: &mut Mapping,
    field: &str,
    source: &dyn BundleDataSource,
    context: C,
) -> Result<()>
where
    C: Fn(&str) -> String,
{
    let Some(Value::Mapping(values)) = record.get_mut(field) else {
        return Ok(());
    };
    for (key, value) in values.iter_mut() {
        let Value::String(text) = value else {
            continue;
        };
        let resolved = resolve_include(text, source).map_err(|error| Error::Include {
            context: context(&schema_key(key)),
            error: Box::new(error),
        })?;
        if let Some(resolved) = resolved {
            *value = Value::String(resolved);
        }
    }
    Ok(())
}

/// The content an include directive refers to, or None for plain values.
fn resolve_include(value: &str, source: &dyn BundleDataSource) -> Result<Option<String>> {
    if let Some(path) = value.strip_prefix(INCLUDE_FILE_PREFIX) {
        let data = source.resolve_include(path)?;
        return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
    }
    if let Some(path) = value.strip_prefix(INCLUDE_BASE64_PREFIX) {
        let data = source.resolve_include(path)?;
        return Ok(Some(data_encoding::BASE64.encode(&data)));
    }
    Ok(None)
}
