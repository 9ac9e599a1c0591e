//! Batch entry point for the SIDER / DrugBank linkage pipeline.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;

use druglink::logging::init_logging;
use druglink::matcher::DEFAULT_THRESHOLD;
use druglink::pipeline::{run, SourcePaths};

#[derive(Parser, Debug)]
#[command(name = "druglink", about = "Link SIDER compound tables to the DrugBank catalog")]
struct Args {
    /// Headerless TSV of (stitch_id, drug_name)
    names: PathBuf,

    /// Headerless TSV of (stitch_id, atc_code)
    atc: PathBuf,

    /// MedDRA indications TSV (disease term in the last column)
    indications: PathBuf,

    /// MedDRA side-effects TSV (side-effect term in the last column)
    side_effects: PathBuf,

    /// DrugBank XML catalog
    catalog: PathBuf,

    /// Output CSV path
    #[arg(short, long, default_value = "merged.csv")]
    output: PathBuf,

    /// Minimum similarity score (0-100) for a name match
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,
}

fn main() {
    init_logging();

    let args = Args::parse();
    let paths = SourcePaths {
        names: args.names,
        atc: args.atc,
        indications: args.indications,
        side_effects: args.side_effects,
        catalog: args.catalog,
    };

    if let Err(e) = run(&paths, &args.output, args.threshold) {
        error!("linkage run failed: {}", e);
        process::exit(1);
    }
}
