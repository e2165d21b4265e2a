use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use citygrid::{CityJob, Config, process_directory};

#[derive(Parser)]
#[command(author, version, about = "Build per-city KML grid overlays from point tables", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", default_value = "config/default.toml")]
    config: PathBuf,

    /// Directory of city point tables (*.csv)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Output directory for KML files
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Derived field table (Name,Formula)
    #[arg(short = 'd', long = "derived-fields")]
    derived_fields: Option<PathBuf>,

    /// Display name table (ID,Name)
    #[arg(short = 'n', long = "field-names")]
    field_names: Option<PathBuf>,

    /// Rewrite KML files that already exist
    #[arg(long = "overwrite")]
    overwrite: bool,
}

fn main() -> Result<()> {
    // Initialize logger - defaults to RUST_LOG if set, otherwise INFO
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let args = Args::parse();

    let mut config = if args.config.exists() {
        Config::load_from_file(&args.config)?
    } else {
        warn!(
            "Config file not found: {}, using default settings",
            args.config.display()
        );
        Config::default()
    };
    config.apply_env()?;

    // Command line wins over file and environment
    if let Some(input) = args.input {
        config.input.points_dir = input;
    }
    if let Some(output) = args.output {
        config.output.kml_dir = output;
    }
    if args.derived_fields.is_some() {
        config.input.derived_fields = args.derived_fields;
    }
    if args.field_names.is_some() {
        config.input.field_names = args.field_names;
    }
    if args.overwrite {
        config.output.overwrite = true;
    }
    config.validate()?;

    info!("Input directory: {}", config.input.points_dir.display());
    info!("Output directory: {}", config.output.kml_dir.display());

    let job = CityJob::from_config(&config).context("Failed to load lookup tables")?;
    let summary = process_directory(&config.input.points_dir, &job)
        .with_context(|| format!("Failed to process {}", config.input.points_dir.display()))?;

    info!(
        "Done: {} written, {} skipped, {} failed",
        summary.written.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    for (path, reason) in &summary.failed {
        error!("{}: {}", path.display(), reason);
    }

    if !summary.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
