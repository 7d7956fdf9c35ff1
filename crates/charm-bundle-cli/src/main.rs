// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! charm-bundle - merge and verify charm bundles and their overlays

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_show;
mod cmd_split;
mod cmd_verify;
mod flags;

use cmd_show::CmdShow;
use cmd_split::CmdSplit;
use cmd_verify::CmdVerify;

#[derive(Parser)]
#[clap(
    name = "charm-bundle",
    about = "Merge and verify charm bundles",
    version,
    long_about = "Apply overlays to a charm bundle and check the resulting deployment topology"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a bundle with its overlays and check the result
    Verify(CmdVerify),

    /// Print the bundle with every overlay merged in
    Show(CmdShow),

    /// Split a merged bundle into a base bundle and an overlay
    Split(CmdSplit),
}

impl Opt {
    fn run(self) -> Result<i32> {
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        match self.cmd {
            Command::Verify(mut cmd) => cmd.run(),
            Command::Show(mut cmd) => cmd.run(),
            Command::Split(mut cmd) => cmd.run(),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
