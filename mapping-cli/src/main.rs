//! Binary entry point: assembles the backend/operator registries, wires
//! logging and configuration, and offers a handful of ad-hoc subcommands
//! for importing and querying datasets directly (spec §4.7, §6). Registries
//! are populated here at startup rather than via constructor-registration
//! side effects. The HTTP/OGC service layer itself is out of scope (spec §1).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mapping_backends::{FeatureBackendRegistry, InMemoryFeatureBackend, NullImageLibrary, RasterBackendRegistry, SqliteRasterBackend};
use mapping_core::{operators, Configuration, ExternalRasterCatalog, OperatorRegistry, Query, QueryProcessor, ResultType, RasterDB};
use mapping_datatypes::primitives::{CrsId, QueryRect, QueryResolution, SpatialRect, TemporalRef, TimeInterval};
use mapping_datatypes::raster::TypedGrid;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tiled raster / feature-collection query engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a raw pixel buffer into a raster dataset channel, building its tile pyramid.
    Import(ImportArgs),
    /// Evaluate a `raster_source` operator graph and report the result's shape and I/O cost.
    Query(QueryArgs),
    /// List the external raster collection descriptors under `gdalsource.datasets.path`.
    ListExternal,
}

#[derive(clap::Args, Debug)]
struct ImportArgs {
    /// Path to the sqlite file backing the dataset (created if it does not already exist).
    #[arg(long)]
    dataset: PathBuf,
    /// JSON descriptor (spec §6.1), only consulted when `dataset` does not already exist.
    #[arg(long)]
    descriptor: Option<PathBuf>,
    #[arg(long)]
    channel: usize,
    /// Raw row-major pixel buffer matching the channel's declared element type.
    #[arg(long)]
    pixels: PathBuf,
    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long)]
    t_start: i64,
    #[arg(long)]
    t_end: i64,
    /// Tile compression tag: 0 = raw, 1 = gzip.
    #[arg(long, default_value_t = 1)]
    compression: u8,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Dataset name; resolved to a connection string via `rasterdb.<name>.location`.
    #[arg(long)]
    dataset: String,
    #[arg(long)]
    channel: usize,
    #[arg(long)]
    epsg: u32,
    #[arg(long)]
    x1: f64,
    #[arg(long)]
    y1: f64,
    #[arg(long)]
    x2: f64,
    #[arg(long)]
    y2: f64,
    #[arg(long)]
    t: i64,
    #[arg(long, default_value_t = false)]
    transform: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Configuration::from_default_paths().ok();
    init_logging(config.as_ref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?
        .block_on(run(cli, config))
}

/// File logging per `log.logfilelevel` / `log.logfilelocation` (spec §3.5).
/// Falls back to stderr at `info` when configuration is absent, e.g. in an
/// unconfigured dev checkout.
fn init_logging(config: Option<&Configuration>) -> Result<()> {
    let level = config
        .and_then(|c| c.get::<String>("log.logfilelevel").ok())
        .unwrap_or_else(|| "info".to_string());
    let mut logger = flexi_logger::Logger::try_with_str(&level).context("parsing log.logfilelevel")?;
    if let Some(location) = config.and_then(|c| c.get::<String>("log.logfilelocation").ok()) {
        logger = logger.log_to_file(flexi_logger::FileSpec::try_from(std::path::PathBuf::from(location))?);
    }
    logger.start().context("starting the logger")?;
    Ok(())
}

async fn run(cli: Cli, config: Option<Configuration>) -> Result<()> {
    match cli.command {
        Commands::Import(args) => run_import(args).await,
        Commands::Query(args) => run_query(args, config).await,
        Commands::ListExternal => run_list_external(config),
    }
}

fn sqlite_backend_factory(connection_string: &str, writable: bool) -> Result<Box<dyn mapping_backends::RasterBackend>, mapping_backends::Error> {
    SqliteRasterBackend::open(connection_string, None, writable).map(|backend| Box::new(backend) as Box<dyn mapping_backends::RasterBackend>)
}

fn in_memory_feature_backend_factory(_connection_string: &str) -> Result<Box<dyn mapping_backends::FeatureBackend>, mapping_backends::Error> {
    Ok(Box::new(InMemoryFeatureBackend::new()))
}

fn default_raster_backends() -> RasterBackendRegistry {
    let mut registry = RasterBackendRegistry::new();
    registry.register("local", sqlite_backend_factory);
    registry
}

fn default_feature_backends() -> FeatureBackendRegistry {
    let mut registry = FeatureBackendRegistry::new();
    registry.register("local", in_memory_feature_backend_factory);
    registry
}

fn default_operators() -> OperatorRegistry {
    let mut registry = OperatorRegistry::new();
    operators::register_builtin(&mut registry);
    registry
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let descriptor_json = match &args.descriptor {
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?),
        None => None,
    };
    let path = args.dataset.to_str().context("dataset path is not valid UTF-8")?;
    let backend = SqliteRasterBackend::open(path, descriptor_json.as_deref(), true)?;
    let db = RasterDB::open(Box::new(backend)).await?;

    let bytes = std::fs::read(&args.pixels).with_context(|| format!("reading {}", args.pixels.display()))?;
    let element_type = db.channel(args.channel)?.dd.element_type;
    let grid = TypedGrid::from_bytes(element_type, args.width, args.height, &bytes, None);

    let rasterid = db
        .import(
            args.channel,
            grid,
            false,
            false,
            args.t_start,
            args.t_end,
            HashMap::new(),
            HashMap::new(),
            args.compression,
        )
        .await?;
    println!("imported rasterid {rasterid}");
    Ok(())
}

async fn run_query(args: QueryArgs, config: Option<Configuration>) -> Result<()> {
    let config = config.context("no configuration found; set MAPPING_RASTERDB_BACKEND and friends or a mapping.conf")?;
    let processor = QueryProcessor::new(
        config,
        default_raster_backends(),
        default_feature_backends(),
        default_operators(),
        Arc::new(NullImageLibrary),
    );

    let qrect = QueryRect::new(
        SpatialRect::new(args.x1, args.y1, args.x2, args.y2, CrsId::new("EPSG", args.epsg))?,
        TimeInterval::instant(args.t),
        TemporalRef::Unix,
        QueryResolution::None,
    );
    let graph = serde_json::json!({
        "type": "raster_source",
        "params": {"dataset": args.dataset, "channel": args.channel, "transform": args.transform},
    })
    .to_string();
    let query = Query::new(&graph, ResultType::Raster, qrect)?;

    let result = processor.process(&query, false).await;
    match result {
        mapping_core::QueryResult::Raster(raster) => {
            println!("raster {}x{}, channel {}", raster.width(), raster.height(), raster.channel_index);
        }
        mapping_core::QueryResult::Error { message, classification } => {
            anyhow::bail!("query failed ({classification:?}): {message}");
        }
        other => anyhow::bail!("unexpected result kind: {:?}", other.result_type()),
    }
    Ok(())
}

fn run_list_external(config: Option<Configuration>) -> Result<()> {
    let config = config.context("no configuration found; set MAPPING_GDALSOURCE_DATASETS_PATH or a mapping.conf")?;
    let catalog = ExternalRasterCatalog::from_configuration(&config)?;
    for name in catalog.list_dataset_names()? {
        println!("{name}");
    }
    Ok(())
}
