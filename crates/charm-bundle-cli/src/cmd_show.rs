// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `charm-bundle show` command.

use std::path::PathBuf;

use clap::Args;
use miette::Result;

use crate::flags::{BundleFlags, write_output};

/// Print the bundle with every overlay merged in
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    bundle: BundleFlags,

    /// Show only the first document, before any overlay is applied
    #[clap(long)]
    base: bool,

    /// Write the bundle to FILE instead of stdout
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl CmdShow {
    pub fn run(&mut self) -> Result<i32> {
        let composed = self.bundle.compose()?;
        let bundle = if self.base {
            &composed.base
        } else {
            &composed.bundle
        };

        let mut yaml = String::new();
        if self.output.is_none() {
            yaml.push_str("# Sources:\n");
            for path in std::iter::once(&self.bundle.bundle).chain(&self.bundle.overlays) {
                yaml.push_str(&format!("# - {}\n", path.display()));
            }
        }
        yaml.push_str(&bundle.to_yaml()?);

        write_output(self.output.as_ref(), &yaml)?;
        Ok(0)
    }
}
