// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `charm-bundle verify` command.

use charm_bundle::{BundleVerifier, verify_no_overlay_fields_present};
use clap::Args;
use colored::Colorize;
use miette::Result;

use crate::flags::{BundleFlags, CharmFlags};

/// Merge a bundle with its overlays and check the result
#[derive(Debug, Args)]
pub struct CmdVerify {
    #[clap(flatten)]
    bundle: BundleFlags,

    #[clap(flatten)]
    charms: CharmFlags,
}

impl CmdVerify {
    pub fn run(&mut self) -> Result<i32> {
        let composed = self.bundle.compose()?;

        let mut problems: Vec<String> = Vec::new();
        if let Err(err) = verify_no_overlay_fields_present(&composed.base) {
            problems.extend(err.messages().map(String::from));
        }

        let charms = self.charms.load(&composed.bundle)?;
        let mut verifier = BundleVerifier::new(&composed.bundle);
        if !self.charms.is_empty() {
            verifier = verifier.charms(&charms);
        }
        if let Some(dir) = composed.base_paths.first() {
            verifier = verifier.bundle_dir(dir);
        }
        if let Err(err) = verifier.verify() {
            problems.extend(err.messages().map(String::from));
        }

        if problems.is_empty() {
            println!(
                "{} Bundle is valid ({} part(s), {} application(s))",
                "✓".green(),
                composed.part_count,
                composed.bundle.applications.len()
            );
            return Ok(0);
        }

        eprintln!("{}", format!("{} problem(s) found:", problems.len()).red().bold());
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        Ok(1)
    }
}
