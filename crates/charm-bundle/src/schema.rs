// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Per-field classification of the bundle document model.
//!
//! Every serialized field of every record in the model is listed here once,
//! together with where it may appear (base document or overlay only) and how
//! an overlay value combines with an existing one. Extraction, the
//! no-overlay validator and the merge engine all consult these tables, so
//! marking a new field overlay-only needs no change anywhere else.

/// Where a field is allowed to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Allowed in base documents and overlays.
    Base,
    /// Only meaningful as a deployment-time override.
    OverlayOnly,
}

/// How an overlay value for a field combines with the value already merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Scalars and lists: the overlay value replaces the existing one.
    Replace,
    /// Maps: overlay keys add or override, keys set to null are deleted.
    MergeKeys,
    /// Named records: entries merge field by field using `fields`, entries
    /// set to null are removed. When `cascade_relations` is set, removing an
    /// entry also removes every relation that references it.
    Keyed {
        fields: &'static [FieldDef],
        cascade_relations: bool,
    },
    /// Overlay entries are appended after the existing ones.
    Append,
}

/// Classification of a single serialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub source: FieldSource,
    pub merge: MergeRule,
}

impl FieldDef {
    pub const fn base(name: &'static str) -> Self {
        Self {
            name,
            source: FieldSource::Base,
            merge: MergeRule::Replace,
        }
    }

    pub const fn map(name: &'static str) -> Self {
        Self {
            name,
            source: FieldSource::Base,
            merge: MergeRule::MergeKeys,
        }
    }

    pub const fn keyed(name: &'static str, fields: &'static [FieldDef]) -> Self {
        Self {
            name,
            source: FieldSource::Base,
            merge: MergeRule::Keyed {
                fields,
                cascade_relations: false,
            },
        }
    }

    pub const fn named(name: &'static str, fields: &'static [FieldDef]) -> Self {
        Self {
            name,
            source: FieldSource::Base,
            merge: MergeRule::Keyed {
                fields,
                cascade_relations: true,
            },
        }
    }

    pub const fn appended(name: &'static str) -> Self {
        Self {
            name,
            source: FieldSource::Base,
            merge: MergeRule::Append,
        }
    }

    pub const fn overlay_only(self) -> Self {
        Self {
            source: FieldSource::OverlayOnly,
            ..self
        }
    }

    pub fn is_overlay_only(&self) -> bool {
        self.source == FieldSource::OverlayOnly
    }
}

/// Find the definition for `name`, treating unknown fields as plain base
/// fields that are replaced wholesale.
pub fn lookup(fields: &'static [FieldDef], name: &str) -> FieldDef {
    fields
        .iter()
        .find(|f| f.name == name)
        .copied()
        .unwrap_or(FieldDef {
            name: "",
            source: FieldSource::Base,
            merge: MergeRule::Replace,
        })
}

pub const BUNDLE_FIELDS: &[FieldDef] = &[
    FieldDef::base("bundle"),
    FieldDef::named("applications", APPLICATION_FIELDS),
    FieldDef::keyed("machines", MACHINE_FIELDS),
    FieldDef::named("saas", SAAS_FIELDS),
    FieldDef::base("series"),
    FieldDef::appended("relations"),
    FieldDef::base("tags"),
    FieldDef::base("description"),
];

pub const APPLICATION_FIELDS: &[FieldDef] = &[
    FieldDef::base("charm"),
    FieldDef::base("channel"),
    FieldDef::base("revision"),
    FieldDef::base("series"),
    FieldDef::map("resources"),
    FieldDef::base("num_units"),
    FieldDef::base("to"),
    FieldDef::base("expose"),
    FieldDef::map("exposed-endpoints").overlay_only(),
    FieldDef::map("options"),
    FieldDef::map("annotations"),
    FieldDef::base("constraints"),
    FieldDef::map("storage"),
    FieldDef::map("devices"),
    FieldDef::map("bindings"),
    FieldDef::map("offers").overlay_only(),
    FieldDef::base("placement"),
    FieldDef::base("plan"),
    FieldDef::base("trust"),
];

pub const MACHINE_FIELDS: &[FieldDef] = &[
    FieldDef::base("constraints"),
    FieldDef::map("annotations"),
    FieldDef::base("series"),
];

pub const SAAS_FIELDS: &[FieldDef] = &[FieldDef::base("url")];

pub const OFFER_FIELDS: &[FieldDef] = &[FieldDef::base("endpoints"), FieldDef::map("acl")];

pub const EXPOSED_ENDPOINT_FIELDS: &[FieldDef] = &[
    FieldDef::base("expose-to-spaces"),
    FieldDef::base("expose-to-cidrs"),
];
