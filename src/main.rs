use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};

use nailscan::annotation::AnnotationMaps;
use nailscan::clan::ClanMap;
use nailscan::hierarchy::HierarchyMap;
use nailscan::io::open_input_or_stdin;
use nailscan::models::{load_panther_names, ModelMap};
use nailscan::thresholds::ThresholdTable;
use nailscan::tsv::{read_hits, write_hits, OutputColumns};
use nailscan::{Database, DatabasePolicy, Grouping, Pipeline, Scope, Strategy, Tables};

/// NailScan - InterPro-style filtering of profile-HMM hit tables
///
/// Applies per-database thresholds, overlap resolution and best-hit selection
/// to a search engine's hit table, then joins InterPro and GO annotation
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input hit table (stdin if not specified; .gz accepted)
    #[clap(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Output TSV file (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Member database the hits were searched against (pfam, ncbifam, panther, cath, ...)
    #[clap(long = "db")]
    db: String,

    /// Directory holding the lookup tables
    #[clap(long = "data-dir", default_value = "data")]
    data_dir: PathBuf,

    /// Threshold table (NAME, sequence, domain); default pfam/pfam_a.ga or ncbifam/ncbifam.tc
    #[clap(long = "thresholds")]
    thresholds: Option<PathBuf>,

    /// NAME -> ACC/DESC map (.map TSV or HMMER3 .hmm file)
    #[clap(long = "model-map")]
    model_map: Option<PathBuf>,

    /// Clan membership table (ACC, CLAN); default pfam/Pfam-A.clans.tsv
    #[clap(long = "clans")]
    clans: Option<PathBuf>,

    /// Family hierarchy (PARENT, CHILD...); default <db>/hierarchy.tsv
    #[clap(long = "hierarchy")]
    hierarchy: Option<PathBuf>,

    /// Member signature -> InterPro table; default signature2interpro.tsv
    #[clap(long = "signature2interpro")]
    signature2interpro: Option<PathBuf>,

    /// InterPro -> GO mapping; default interpro2go
    #[clap(long = "interpro2go")]
    interpro2go: Option<PathBuf>,

    /// InterPro short names; default interpro.names
    #[clap(long = "interpro-names")]
    interpro_names: Option<PathBuf>,

    /// Append InterPro and IPR_desc columns
    #[clap(long = "iprlookup")]
    iprlookup: bool,

    /// Append GO column
    #[clap(long = "goterms")]
    goterms: bool,

    /// Drop parent families when a descendant family also hit the protein
    #[clap(long = "hierarchy-suppress")]
    hierarchy_suppress: bool,

    /// Selection strategy: gate_only, overlap_resolve or best_hit
    #[clap(long = "strategy")]
    strategy: Option<Strategy>,

    /// Maximum overlap fraction between accepted hits of one group
    #[clap(long = "overlap")]
    overlap: Option<f64>,

    /// Overlap scope: within_group or global
    #[clap(long = "scope")]
    scope: Option<Scope>,

    /// Comparison groups for within_group scope: none, clan or family_map
    #[clap(long = "grouping")]
    grouping: Option<Grouping>,

    /// Drop hits with an e-value above this
    #[clap(long = "evalue")]
    evalue: Option<f64>,

    /// Drop hits with a bit score below this
    #[clap(long = "bitscore")]
    bitscore: Option<f64>,

    /// Quiet mode (warnings and errors only)
    #[clap(long = "quiet")]
    quiet: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,
}

impl Args {
    /// Built-in policy row for the database with command-line overrides applied
    fn policy(&self, database: &Database) -> DatabasePolicy {
        let mut policy = DatabasePolicy::for_database(database);
        if let Some(strategy) = self.strategy {
            policy.strategy = strategy;
        }
        if let Some(overlap) = self.overlap {
            policy.overlap.overlap_fraction = overlap;
        }
        if let Some(scope) = self.scope {
            policy.overlap.scope = scope;
            // Global scope has no groups unless one is asked for explicitly
            if scope == Scope::Global && self.grouping.is_none() {
                policy.overlap.grouping = Grouping::None;
            }
        }
        if let Some(grouping) = self.grouping {
            policy.overlap.grouping = grouping;
        }
        if self.evalue.is_some() {
            policy.overlap.evalue_cutoff = self.evalue;
        }
        if self.bitscore.is_some() {
            policy.overlap.bitscore_cutoff = self.bitscore;
        }
        if self.hierarchy_suppress {
            policy.hierarchy_suppress = true;
        }
        policy
    }

    /// Explicit path if given, otherwise the default under the data directory
    /// when that file exists
    fn table_path(&self, explicit: &Option<PathBuf>, default: Option<PathBuf>) -> Option<PathBuf> {
        explicit
            .clone()
            .or_else(|| default.map(|rel| self.data_dir.join(rel)).filter(|p| p.exists()))
    }
}

fn default_thresholds(database: &Database) -> Option<PathBuf> {
    match database {
        Database::Pfam => Some(PathBuf::from("pfam/pfam_a.ga")),
        Database::NcbiFam => Some(PathBuf::from("ncbifam/ncbifam.tc")),
        _ => None,
    }
}

/// First `*.map` file in the database's data directory
fn find_model_map(dir: &Path) -> Option<PathBuf> {
    let mut maps: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("map"))
        .collect();
    maps.sort();
    maps.into_iter().next()
}

fn load_tables(args: &Args, database: &Database, policy: &DatabasePolicy) -> Result<Tables> {
    let db_dir = args.data_dir.join(database.key());
    let mut tables = Tables::default();

    if args.thresholds.is_some() && !database.is_known() {
        warn!("{database} is not a known member database; ignoring --thresholds");
    } else if let Some(path) = args.table_path(&args.thresholds, default_thresholds(database)) {
        let table = ThresholdTable::load(&path)?;
        info!("Loaded {} thresholds from {}", table.len(), path.display());
        tables.thresholds = Some(table);
    }

    let model_map = args.model_map.clone().or_else(|| find_model_map(&db_dir));
    if let Some(path) = model_map {
        let models = ModelMap::load(&path)?;
        info!("Loaded {} model entries from {}", models.len(), path.display());
        tables.models = Some(models);
    }

    let wants_clans = args.clans.is_some() || policy.overlap.grouping == Grouping::Clan;
    if wants_clans {
        if let Some(path) = args.table_path(&args.clans, Some(PathBuf::from("pfam/Pfam-A.clans.tsv"))) {
            tables.clans = Some(ClanMap::load(&path)?);
        }
    }

    let wants_hierarchy = args.hierarchy.is_some()
        || policy.hierarchy_suppress
        || policy.overlap.grouping == Grouping::FamilyMap;
    if wants_hierarchy {
        let default = PathBuf::from(database.key()).join("hierarchy.tsv");
        if let Some(path) = args.table_path(&args.hierarchy, Some(default)) {
            tables.hierarchy = Some(HierarchyMap::load(&path)?);
        }
    }

    if *database == Database::Panther {
        tables.family_names = load_panther_names(&db_dir)?;
    }

    if args.iprlookup || args.goterms {
        tables.annotations = load_annotations(args, database)?;
    }

    Ok(tables)
}

fn load_annotations(args: &Args, database: &Database) -> Result<AnnotationMaps> {
    let mut maps = AnnotationMaps::new();

    match args.table_path(&args.signature2interpro, Some(PathBuf::from("signature2interpro.tsv"))) {
        Some(path) => maps.load_signatures(&path, database)?,
        None => warn!(
            "No signature2interpro table under {}; annotation columns will be empty",
            args.data_dir.display()
        ),
    }

    if args.iprlookup {
        match args.table_path(&args.interpro_names, Some(PathBuf::from("interpro.names"))) {
            Some(path) => maps.load_interpro_names(&path)?,
            None => warn!("No InterPro names table; IPR_desc will be empty"),
        }
    }

    if args.goterms {
        match args.table_path(&args.interpro2go, Some(PathBuf::from("interpro2go"))) {
            Some(path) => maps.load_interpro2go(&path)?,
            None => warn!("No interpro2go table; GO column will be empty"),
        }
    }

    Ok(maps)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    // Nothing to read: print help instead of blocking on a terminal
    if args.input.is_none() && io::stdin().is_terminal() {
        use clap::CommandFactory;
        Args::command().print_help()?;
        std::process::exit(0);
    }

    // Set up rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let database: Database = args.db.parse().unwrap_or_else(|e| match e {});
    if !database.is_known() {
        warn!("Unknown database '{}': hits pass through the gate only", args.db);
    }
    let policy = args.policy(&database);

    let tables = load_tables(&args, &database, &policy)?;
    let pipeline = Pipeline::new(database.clone(), policy, &tables)
        .context("Cannot build filtering pipeline")?;

    let reader = open_input_or_stdin(args.input.as_deref())?;
    let batch = read_hits(reader, &database).context("Failed to read hit table")?;
    if !batch.rejected.is_empty() {
        warn!("{} malformed rows rejected", batch.rejected.len());
    }
    info!("Read {} hits", batch.records.len());

    let hits = pipeline.run(batch.records);

    let columns = OutputColumns {
        interpro: args.iprlookup,
        go: args.goterms,
    };
    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    write_hits(&mut output, &hits, columns)?;

    info!("Wrote {} hits", hits.len());
    Ok(())
}
