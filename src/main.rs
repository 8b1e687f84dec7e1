use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pbasemap::io::{read_aoi, write_csv_file};
use pbasemap::{
    ApiKey, AreaOfInterest, BasemapConfig, BasemapError, CancelFlag, DateWindow, PermissionGate,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit status used when the run is interrupted with Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "pbasemap")]
#[command(about = "Basemap mosaic quads discovery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bounding box of every AOI feature
    Rbox {
        /// AOI geometry file (GeoJSON; other OGR formats with the `gdal` feature)
        #[arg(long)]
        geometry: PathBuf,
    },
    /// List mosaics with quads over the AOI within a date window
    List {
        /// AOI geometry file (GeoJSON; other OGR formats with the `gdal` feature)
        #[arg(long)]
        geometry: PathBuf,
        /// Start date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        start: NaiveDate,
        /// End date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        end: NaiveDate,
        /// CSV file the mosaic list is exported to
        #[arg(long)]
        output: PathBuf,
        /// API key; falls back to the PL_API_KEY environment variable
        #[arg(long)]
        api_key: Option<String>,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Gate every mosaic on its own download permission
        #[arg(long)]
        per_entry_permission: bool,
        /// Number of AOI features walked at once
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}', expected YYYY-MM-DD: {}", raw, e))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Rbox { geometry } => rbox(&geometry),
        Commands::List {
            geometry,
            start,
            end,
            output,
            api_key,
            config,
            per_entry_permission,
            max_concurrency,
        } => list(ListArgs {
            geometry,
            window: DateWindow::new(start, end),
            output,
            api_key,
            config,
            per_entry_permission,
            max_concurrency,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<BasemapError>(), Some(BasemapError::Cancelled)) => {
            eprintln!("Program escaped by user");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn rbox(geometry: &Path) -> Result<()> {
    let features = read_aoi(geometry)
        .with_context(|| format!("Could not read AOI file {}", geometry.display()))?;

    for feature in features {
        match feature.and_then(AreaOfInterest::from_feature) {
            Ok(aoi) => println!("{}", aoi.bbox),
            Err(e) => log::warn!("Skipping feature: {}", e),
        }
    }
    Ok(())
}

struct ListArgs {
    geometry: PathBuf,
    window: DateWindow,
    output: PathBuf,
    api_key: Option<String>,
    config: Option<PathBuf>,
    per_entry_permission: bool,
    max_concurrency: Option<usize>,
}

fn list(args: ListArgs) -> Result<()> {
    if args.window.start > args.window.end {
        bail!("Start date {} is after end date {}", args.window.start, args.window.end);
    }

    let key = match args.api_key {
        Some(key) => ApiKey::new(key),
        None => ApiKey::from_env(),
    }
    .context("Failed to get API key")?;

    let mut config = match &args.config {
        Some(path) => BasemapConfig::from_file(path)?,
        None => BasemapConfig::default(),
    };
    if args.per_entry_permission {
        config.filter.permission_gate = PermissionGate::PerEntry;
    }
    if let Some(max_concurrency) = args.max_concurrency {
        config.batch.max_concurrency = max_concurrency;
    }
    config.validate()?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || handler_flag.cancel()).context("Failed to install Ctrl-C handler")?;

    log::info!("Listing mosaics for {} within {}", args.geometry.display(), args.window);
    let table =
        pbasemap::get_file_mosaic_metadata(&args.geometry, &args.window, &key, &config, cancel)?;

    write_csv_file(&table, &args.output)
        .with_context(|| format!("Could not write {}", args.output.display()))?;
    println!("{} mosaics saved to file {}", table.len(), args.output.display());
    Ok(())
}
