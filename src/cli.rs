// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

use crate::{input::Input, report::Report};
use anyhow::Result;
use clap::{Parser, Subcommand};
use pretty_env_logger::env_logger::DEFAULT_FILTER_ENV;
use std::path::{Path, PathBuf};

#[derive(Debug, Subcommand)]
enum Commands {
    /// Map crosslinks onto a structure and report their distances
    #[clap(arg_required_else_help = true)]
    Run {
        /// Input file in YAML format
        #[clap(long, short = 'i')]
        input: PathBuf,
        /// Skip background distance sampling
        #[clap(long, action)]
        no_sampling: bool,
    },
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    pub command: Commands,

    /// Verbose output. See more with e.g. RUST_LOG=Trace
    #[clap(long, short = 'v', action)]
    pub verbose: bool,
    /// Report file in YAML format; gzip compressed if ending with .gz
    #[clap(long, short = 'o', default_value = "report.yaml")]
    pub output: PathBuf,
}

pub fn do_main() -> Result<()> {
    let args = Args::parse();
    if std::env::var(DEFAULT_FILTER_ENV).is_err() {
        std::env::set_var(
            DEFAULT_FILTER_ENV,
            if args.verbose { "Debug" } else { "Info" },
        );
    }
    pretty_env_logger::init();

    match args.command {
        Commands::Run { input, no_sampling } => {
            run(&input, &args.output, !no_sampling)?;
        }
    }
    Ok(())
}

/// Load the data set in `input`, resolve its crosslinks and write the report to `output`.
pub fn run(input: &Path, output: &Path, sampling: bool) -> Result<()> {
    let input = Input::from_file(input)?;
    let crosslinkers = input.crosslinker_store()?;
    let model = input.build_model()?;
    let sampling = input.sampling.as_ref().filter(|_| sampling);
    let report = Report::new(&model, &crosslinkers, sampling)?;
    report.write(output)
}
