/// benchmark - Agreement of a nailscan table with InterProScan or another run
///
/// Compares hits at the (protein, database, accession) level and prints
/// per-database precision, recall and F1.
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use nailscan::benchmark::{
    compare, load_interproscan, load_prediction, restrict_to_databases, restrict_to_predicted,
    write_detail, write_report, KeySet,
};
use nailscan::io::open_input;
use nailscan::Database;

#[derive(Parser)]
#[clap(
    name = "benchmark",
    about = "Compare nailscan output against InterProScan or another nailscan run"
)]
struct Args {
    /// Filtered nailscan table to evaluate
    #[clap(long = "pred")]
    prediction: String,

    /// InterProScan TSV used as the reference
    #[clap(long = "ipr", conflicts_with = "reference_run")]
    interproscan: Option<String>,

    /// Second nailscan table used as the reference
    #[clap(long = "pred2")]
    reference_run: Option<String>,

    /// Database of tables without an Analysis column
    #[clap(long = "db")]
    database: Option<String>,

    /// Comma-separated databases to include (default: all)
    #[clap(long = "dbs")]
    databases: Option<String>,

    /// Keep reference hits of proteins absent from the prediction
    #[clap(long = "no-filter")]
    no_filter: bool,

    /// Write per-key TP/FP/FN rows to this TSV
    #[clap(long = "detail")]
    detail: Option<String>,
}

fn load_run(path: &str, database: Option<&Database>) -> Result<KeySet> {
    load_prediction(open_input(path)?, database).with_context(|| format!("Failed to load {path}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let database: Option<Database> = args
        .database
        .as_deref()
        .map(|name| name.parse().unwrap_or_else(|e| match e {}));

    info!("Loading prediction: {}", args.prediction);
    let prediction = load_run(&args.prediction, database.as_ref())?;

    let mut reference = match (&args.interproscan, &args.reference_run) {
        (Some(path), _) => {
            info!("Loading reference (InterProScan): {path}");
            load_interproscan(open_input(path)?).with_context(|| format!("Failed to load {path}"))?
        }
        (None, Some(path)) => {
            info!("Loading reference (nailscan): {path}");
            load_run(path, database.as_ref())?
        }
        (None, None) => bail!("Provide --ipr or --pred2 as the reference"),
    };

    if !args.no_filter {
        reference = restrict_to_predicted(reference, &prediction);
    }

    let (prediction, reference) = match &args.databases {
        Some(list) => {
            let keep: Vec<Database> = list
                .split(',')
                .map(|name| name.parse().unwrap_or_else(|e| match e {}))
                .collect();
            (
                restrict_to_databases(prediction, &keep),
                restrict_to_databases(reference, &keep),
            )
        }
        None => (prediction, reference),
    };

    let stats = compare(&prediction, &reference);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out)?;
    write_report(&mut out, &stats)?;

    if let Some(path) = &args.detail {
        let mut writer = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {path}"))?,
        );
        write_detail(&mut writer, &prediction, &reference)?;
        writer.flush()?;
        info!("Detail written to {path}");
    }

    Ok(())
}
