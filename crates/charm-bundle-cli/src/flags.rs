// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Flags shared by the bundle commands.

use std::path::PathBuf;

use charm_bundle::{BundleData, BundleDataSource, BundleSource, CharmData, CharmMap, ComposedBundle};
use clap::Args;
use miette::Result;

#[cfg(test)]
#[path = "./flags_test.rs"]
mod flags_test;

/// The bundle to load and the overlays applied on top of it
#[derive(Args, Clone, Debug)]
pub struct BundleFlags {
    /// Bundle file, or a directory containing bundle.yaml
    #[clap(default_value = ".")]
    pub bundle: PathBuf,

    /// Overlay applied on top of the bundle, in the order given
    #[clap(
        short = 'o',
        long = "overlay",
        env = "CHARM_BUNDLE_OVERLAYS",
        value_delimiter = ':'
    )]
    pub overlays: Vec<PathBuf>,
}

impl BundleFlags {
    /// Open the bundle followed by every overlay.
    pub fn open(&self) -> Result<Vec<BundleSource>> {
        std::iter::once(&self.bundle)
            .chain(&self.overlays)
            .map(|path| {
                tracing::debug!(path = %path.display(), "opening bundle source");
                BundleSource::open(path).map_err(miette::Report::from)
            })
            .collect()
    }

    /// Open and merge the bundle and its overlays.
    pub fn compose(&self) -> Result<ComposedBundle> {
        let sources = self.open()?;
        let sources: Vec<&dyn BundleDataSource> =
            sources.iter().map(|s| s as &dyn BundleDataSource).collect();
        let composed = charm_bundle::compose_bundle(&sources)?;
        tracing::info!(
            parts = composed.part_count,
            applications = composed.bundle.applications.len(),
            "bundle composed"
        );
        Ok(composed)
    }
}

/// Unpacked charm directories to check applications against
#[derive(Args, Clone, Debug, Default)]
pub struct CharmFlags {
    /// Charm directory for an application (APPLICATION=DIR). When any are
    /// given, every application in the bundle needs one.
    #[clap(
        long = "charm",
        env = "CHARM_BUNDLE_CHARMS",
        value_delimiter = ':',
        value_parser = parse_charm_arg
    )]
    pub charms: Vec<(String, PathBuf)>,
}

impl CharmFlags {
    pub fn is_empty(&self) -> bool {
        self.charms.is_empty()
    }

    /// Read every charm directory, keyed by the charm reference its
    /// application uses in `bundle`.
    pub fn load(&self, bundle: &BundleData) -> Result<CharmMap> {
        let mut charms = CharmMap::new();
        for (application, dir) in &self.charms {
            let Some(app) = bundle.applications.get(application) else {
                return Err(miette::miette!(
                    help = "the name before '=' must be an application of the bundle",
                    "charm given for unknown application {application:?}"
                ));
            };
            let charm = CharmData::read_dir(dir)?;
            tracing::debug!(%application, charm = %app.charm, dir = %dir.display(), "loaded charm");
            charms.insert(app.charm.clone(), Box::new(charm));
        }
        Ok(charms)
    }
}

/// Parse `APPLICATION=DIR`.
pub fn parse_charm_arg(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((application, dir)) if !application.is_empty() && !dir.is_empty() => {
            Ok((application.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected APPLICATION=DIR, got {arg:?}")),
    }
}

/// Write `yaml` to stdout, or to `path` when given.
pub fn write_output(path: Option<&PathBuf>, yaml: &str) -> Result<()> {
    match path {
        None => {
            print!("{yaml}");
            Ok(())
        }
        Some(path) => std::fs::write(path, yaml)
            .map_err(|e| miette::miette!("Failed to write {}: {e}", path.display())),
    }
}
