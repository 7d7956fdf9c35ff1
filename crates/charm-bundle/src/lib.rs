// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! charm-bundle - Bundle composition and verification
//!
//! This crate reads deployment bundles, merges them with overlay documents
//! and verifies the resulting topology of applications, machines and
//! relations.
//!
//! # Overview
//!
//! A bundle stream holds a base document followed by any number of overlay
//! documents, separated by `---`. Overlays add, override or remove (with an
//! explicit `null`) applications, machines and fields of the base. Some
//! fields, such as `offers`, only make sense in an overlay and are rejected
//! in a base document.
//!
//! # Example
//!
//! ```yaml
//! # bundle.yaml
//! series: jammy
//! applications:
//!   wordpress:
//!     charm: wordpress
//!     num_units: 1
//!     to: ["0"]
//!     options:
//!       motd: include-file://motd.txt
//!   mysql:
//!     charm: mysql
//!     num_units: 1
//! machines:
//!   "0": {}
//! relations:
//!   - ["wordpress:db", "mysql:server"]
//! ---
//! # overlay: drop mysql and offer wordpress
//! applications:
//!   mysql: null
//!   wordpress:
//!     offers:
//!       blog:
//!         endpoints: [website]
//! ```

pub mod bundle;
pub mod charm;
pub mod compose;
pub mod error;
pub mod placement;
pub mod schema;
pub mod source;
pub mod tree;
pub mod verify;
pub mod visit;
pub mod yaml;

pub use bundle::{ApplicationSpec, BundleData, ExposedEndpointSpec, MachineSpec, OfferSpec, SaasSpec};
pub use charm::{Charm, CharmData, CharmMap, Config, ConfigOption, Meta, OptionType, Relation, RelationRole};
pub use compose::{ComposedBundle, compose_bundle, merge_bundle_data};
pub use error::{Error, Problem, Result, VerificationError};
pub use placement::{Endpoint, UnitPlacement};
pub use source::{BundleDataPart, BundleDataSource, BundleSource};
pub use verify::BundleVerifier;
pub use visit::{extract_base_and_overlay_parts, verify_no_overlay_fields_present};

/// Well-known filename of the bundle inside a bundle directory.
pub const BUNDLE_FILENAME: &str = "bundle.yaml";

/// Prefix of option and annotation values replaced by a file's content.
pub const INCLUDE_FILE_PREFIX: &str = "include-file://";

/// Prefix of option and annotation values replaced by a file's content,
/// base64 encoded.
pub const INCLUDE_BASE64_PREFIX: &str = "include-base64://";
