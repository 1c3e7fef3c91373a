// Copyright 2024
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command line tool for SimH tape images.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use log::{debug, error, info};

use simhtape::dumper::{dump_image, DumpConfig};
use simhtape::error::{ErrorPolicy, Result, TapeError};
use simhtape::scanner::{scan_image, ScanConfig};
use simhtape::writer::{create_image_from_definition, TapeWriterConfig};

/// Create, scan or dump SimH tape images of AOS/VS tapes.
#[derive(Parser, Debug)]
#[command(name = "simhtape", version)]
#[command(group(ArgGroup::new("action").required(true).args(["create", "scan", "dump"])))]
struct Args {
    /// Create a new SimH tape image file
    #[arg(long, value_name = "IMAGE", requires = "from_definition")]
    create: Option<PathBuf>,

    /// Scan a SimH tape image file for correctness
    #[arg(long, value_name = "IMAGE")]
    scan: Option<PathBuf>,

    /// Dump all files in the image as blobs
    #[arg(long, value_name = "IMAGE")]
    dump: Option<PathBuf>,

    /// CSV definition file of (path, block size) rows used with --create
    #[arg(long, value_name = "CSV")]
    from_definition: Option<PathBuf>,

    /// Generate CSV-format data from scan
    #[arg(long, requires = "scan")]
    csv: bool,

    /// Directory for files extracted by --dump
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Keep dumping past damaged records instead of stopping
    #[arg(long, requires = "dump")]
    keep_going: bool,

    /// Treat three consecutive tape marks as end of tape (older images)
    #[arg(long)]
    legacy_eot: bool,

    /// Be more verbose
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> Result<ExitCode> {
    if let Some(image) = &args.create {
        // clap guarantees --from-definition is present with --create
        let definition = args.from_definition.clone().unwrap_or_default();
        let config = TapeWriterConfig {
            verbose: args.verbose,
        };
        let summary = create_image_from_definition(image, &definition, &config)?;
        info!(
            "Done: {} files, {} bytes",
            summary.files.len(),
            summary.image_bytes
        );
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(image) = &args.scan {
        let config = ScanConfig {
            csv: args.csv,
            legacy_triple_mark_eot: args.legacy_eot,
            ..Default::default()
        };
        let report = scan_image(image, &config)?;
        if config.csv {
            report.write_csv(io::stdout().lock())?;
        } else {
            println!("Scanning tape file : {}", image.display());
            println!("{}", report);
        }
        return Ok(if report.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(2)
        });
    }

    if let Some(image) = &args.dump {
        let config = DumpConfig {
            output_dir: args.output_dir.clone(),
            policy: if args.keep_going {
                ErrorPolicy::Collect
            } else {
                ErrorPolicy::FailFast
            },
            legacy_triple_mark_eot: args.legacy_eot,
            ..Default::default()
        };
        println!("Dumping files...");
        let summary = dump_image(image, &config)?;
        for diagnostic in &summary.diagnostics {
            error!("Skipped: {}", diagnostic);
        }
        println!("...finished, {} files.", summary.files.len());
        return Ok(ExitCode::SUCCESS);
    }

    Ok(ExitCode::FAILURE)
}

/// Line printed on stderr when a run stops with an error.
fn failure_message(e: &TapeError) -> String {
    format!("ERROR: {}", e)
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::builder()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            // Printed directly so the failure shows even with logging off.
            eprintln!("{}", failure_message(&e));
            debug!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}
