// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `charm-bundle split` command.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::flags::{BundleFlags, write_output};

/// Split a merged bundle into a base bundle and an overlay
///
/// The base holds everything a deployable bundle may contain. The overlay
/// holds the overlay-only fields (offers, exposed endpoints) and the
/// applications they belong to.
#[derive(Debug, Args)]
pub struct CmdSplit {
    #[clap(flatten)]
    bundle: BundleFlags,

    /// Write the base bundle to FILE
    #[clap(long, value_name = "FILE", requires = "overlay_output")]
    base_output: Option<PathBuf>,

    /// Write the overlay to FILE
    #[clap(long, value_name = "FILE", requires = "base_output")]
    overlay_output: Option<PathBuf>,
}

impl CmdSplit {
    pub fn run(&mut self) -> Result<i32> {
        let composed = self.bundle.compose()?;
        let (base, overlay) = charm_bundle::extract_base_and_overlay_parts(&composed.bundle)?;
        let base_yaml = base.to_yaml()?;
        let overlay_yaml = overlay.to_yaml()?;

        match (&self.base_output, &self.overlay_output) {
            (Some(base_path), Some(overlay_path)) => {
                write_output(Some(base_path), &base_yaml)?;
                write_output(Some(overlay_path), &overlay_yaml)?;
                println!("Wrote base bundle to {}", base_path.display().to_string().cyan());
                println!("Wrote overlay to {}", overlay_path.display().to_string().cyan());
            }
            _ => {
                print!("{base_yaml}---\n{overlay_yaml}");
            }
        }
        Ok(0)
    }
}
