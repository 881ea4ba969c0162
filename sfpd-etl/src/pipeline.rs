//! Pipeline driver
//!
//! Each CLI command maps to one `run_*` function. The functions take their
//! collaborators as arguments so they can be driven with stand-ins; only
//! [`dispatch`] builds the real clients from configuration.
//!
//! Records are processed one at a time, in feed order. The first failure
//! aborts the command.

use crate::cli::Command;
use crate::db;
use crate::error::{EtlError, EtlResult};
use crate::models::{Incident, LocationLookup};
use crate::services::coordinate_cache::CoordinateCache;
use crate::services::csv_importer::{self, ImportStats};
use crate::services::feed_fetcher::{self, FeedFetcher, FetchError, IncidentFeed};
use crate::services::geocode_client::{DstkClient, Geocoder};
use crate::services::warehouse::{self, SqlxWarehouse, Warehouse, WarehouseLoader};
use chrono::Utc;
use serde::Serialize;
use sfpd_common::config::EtlConfig;
use sfpd_common::TemplateRenderer;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Counts from a geocode-and-load run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub incidents: usize,
    pub locations_inserted: usize,
    pub incidents_inserted: usize,
}

/// Where the bulk pipeline keeps its files
#[derive(Debug, Clone)]
pub struct BulkPaths {
    pub archive: PathBuf,
    pub extract_dir: PathBuf,
}

impl BulkPaths {
    pub fn from_config(config: &EtlConfig) -> Self {
        Self {
            archive: config.archive_path(),
            extract_dir: config.extract_dir(),
        }
    }
}

/// Run one CLI command against real services built from `config`
pub async fn dispatch<O: Write>(
    command: Option<Command>,
    skip_download: bool,
    config: &EtlConfig,
    out: &mut O,
) -> EtlResult<()> {
    let started = Utc::now();

    match command {
        None => {
            // Fail on credentials before any download
            let loader = warehouse_loader(config).await?;
            config.ensure_data_dir()?;
            let fetcher = FeedFetcher::new(&config.feed)?;
            let pool = db::init_cache_database(&config.cache_db_path()).await?;
            let cache = CoordinateCache::new(pool, DstkClient::new(&config.geocoder)?);
            let paths = BulkPaths::from_config(config);

            let stats = run_all(&fetcher, &paths, skip_download, &cache, &loader, out).await?;
            info!(
                incidents = stats.incidents,
                locations = stats.locations_inserted,
                "Bulk pipeline complete"
            );
        }
        Some(Command::Import) => {
            config.ensure_data_dir()?;
            let pool = db::init_cache_database(&config.cache_db_path()).await?;
            run_import(&pool, &config.import_csv_path(), out).await?;
        }
        Some(Command::Latest) => {
            let fetcher = FeedFetcher::new(&config.feed)?;
            run_latest(&fetcher, out).await?;
        }
        Some(Command::Lookup { lng, lat }) => {
            let geocoder = DstkClient::new(&config.geocoder)?;
            run_lookup(&geocoder, lng, lat, out).await?;
        }
        Some(Command::Sfpd) => {
            let loader = warehouse_loader(config).await?;
            let fetcher = FeedFetcher::new(&config.feed)?;
            let geocoder = DstkClient::new(&config.geocoder)?;

            let stats = run_sfpd(&fetcher, &geocoder, &loader, out).await?;
            info!(
                incidents = stats.incidents,
                locations = stats.locations_inserted,
                "Incremental load complete"
            );
        }
        Some(Command::External(args)) => {
            let name = args.first().cloned().unwrap_or_default();
            return Err(EtlError::UnknownCommand(name));
        }
    }

    info!(
        elapsed_ms = (Utc::now() - started).num_milliseconds(),
        "Command finished"
    );
    Ok(())
}

/// Connect to the warehouse and build a loader with the configured templates
pub async fn warehouse_loader(config: &EtlConfig) -> EtlResult<WarehouseLoader<SqlxWarehouse>> {
    let warehouse = SqlxWarehouse::connect(&config.warehouse).await?;
    let sql_dir = config
        .templates
        .sql_dir
        .clone()
        .unwrap_or_else(warehouse::default_sql_dir);

    Ok(WarehouseLoader::new(
        warehouse,
        TemplateRenderer::new(config.templates.missing_variable),
        sql_dir,
        &config.warehouse,
    ))
}

/// `lookup`: geocode one pair directly and print `lng,lat,neighborhood`
pub async fn run_lookup<G: Geocoder, O: Write>(
    geocoder: &G,
    lng: f64,
    lat: f64,
    out: &mut O,
) -> EtlResult<LocationLookup> {
    let result = geocoder.reverse_geocode(lng, lat).await?;
    let lookup = LocationLookup {
        lng,
        lat,
        neighborhood: result.neighborhood,
    };

    writeln!(out, "{}", lookup.csv_line())?;
    Ok(lookup)
}

/// `latest`: pretty-print the incremental feed, returning its feature count
pub async fn run_latest<F: IncidentFeed, O: Write>(feed: &F, out: &mut O) -> EtlResult<usize> {
    let document = feed.fetch_latest().await?;
    let pretty = serde_json::to_string_pretty(&document)
        .map_err(|e| FetchError::ParseError(e.to_string()))?;
    writeln!(out, "{}", pretty)?;

    let count = document
        .get("features")
        .and_then(|f| f.as_array())
        .map(|f| f.len())
        .unwrap_or(0);
    Ok(count)
}

/// `import`: load the coordinate mapping CSV into the cache
pub async fn run_import<O: Write>(
    pool: &sqlx::SqlitePool,
    csv_path: &Path,
    out: &mut O,
) -> EtlResult<ImportStats> {
    let stats = csv_importer::import_cache(pool, csv_path).await?;
    writeln!(
        out,
        "Imported {} of {} rows ({} already cached) in {} batches",
        stats.inserted, stats.rows_read, stats.skipped, stats.batches
    )?;
    Ok(stats)
}

/// `sfpd`: geocode every incident of the incremental feed and load it
pub async fn run_sfpd<F, G, W, O>(
    feed: &F,
    geocoder: &G,
    loader: &WarehouseLoader<W>,
    out: &mut O,
) -> EtlResult<LoadStats>
where
    F: IncidentFeed,
    G: Geocoder,
    W: Warehouse,
    O: Write,
{
    loader.create_schema().await?;

    info!("Getting latest incidents");
    let document = feed.latest_incidents().await?;
    info!(count = document.features.len(), "Processing incidents");

    let mut stats = LoadStats::default();
    for feature in &document.features {
        let incident = &feature.properties;
        let (lng, lat) = incident.coordinates()?;

        let result = geocoder.reverse_geocode(lng, lat).await?;
        let lookup = LocationLookup {
            lng,
            lat,
            neighborhood: result.neighborhood,
        };

        load_record(loader, incident, &lookup, &mut stats, out).await?;
    }

    Ok(stats)
}

/// No command: download, extract, geocode through the cache, and load
pub async fn run_all<G, W, O>(
    fetcher: &FeedFetcher,
    paths: &BulkPaths,
    skip_download: bool,
    cache: &CoordinateCache<G>,
    loader: &WarehouseLoader<W>,
    out: &mut O,
) -> EtlResult<LoadStats>
where
    G: Geocoder,
    W: Warehouse,
    O: Write,
{
    if skip_download {
        info!(dir = %paths.extract_dir.display(), "Skipping download, using extracted files");
    } else {
        fetcher.download_archive(&paths.archive).await?;
        feed_fetcher::extract_archive(&paths.archive, &paths.extract_dir).await?;
    }

    let files = feed_fetcher::find_csv_files(&paths.extract_dir)?;
    info!(files = files.len(), "Processing bulk CSV files");

    loader.create_schema().await?;

    let mut stats = LoadStats::default();
    for file in &files {
        process_file(file, cache, loader, &mut stats, out).await?;
    }

    Ok(stats)
}

async fn process_file<G, W, O>(
    path: &Path,
    cache: &CoordinateCache<G>,
    loader: &WarehouseLoader<W>,
    stats: &mut LoadStats,
    out: &mut O,
) -> EtlResult<()>
where
    G: Geocoder,
    W: Warehouse,
    O: Write,
{
    info!(file = %path.display(), "Processing file");

    let parse_error = |e: csv::Error| FetchError::ParseError(format!("{}: {}", path.display(), e));
    let mut reader = csv::Reader::from_path(path).map_err(parse_error)?;
    let headers = reader.headers().map_err(parse_error)?.clone();

    for record in reader.records() {
        let record = record.map_err(parse_error)?;
        let incident = Incident::from_csv_record(&headers, &record);
        let (lng, lat) = incident.coordinates()?;

        let lookup = cache.lookup(lng, lat).await?;
        load_record(loader, &incident, &lookup, stats, out).await?;
    }

    Ok(())
}

async fn load_record<W: Warehouse, O: Write>(
    loader: &WarehouseLoader<W>,
    incident: &Incident,
    lookup: &LocationLookup,
    stats: &mut LoadStats,
    out: &mut O,
) -> EtlResult<()> {
    stats.incidents += 1;
    writeln!(out, "{}", lookup.csv_line())?;
    tracing::debug!(?incident, "Loading incident");

    loader.insert_location(lookup).await?;
    stats.locations_inserted += 1;

    loader.insert_incident(incident).await?;
    stats.incidents_inserted += 1;

    Ok(())
}
