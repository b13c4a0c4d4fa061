//! Command-line interface for the scan footprint pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders;
use crate::core::writers::{write_footprint_csv, write_polygons_csv};
use crate::processors::draw_model::{build_draw_model_seeded, ScanDrawModel};
use crate::visualization::{self, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "scan-footprint")]
#[command(about = "Scan footprint and per-point polygon pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the draw model of one scan and write polygon/footprint CSVs
    Build {
        /// Directory containing <stem>_entries/_beams/_coords.csv
        directory: PathBuf,
        /// Scan file stem
        stem: String,
        /// Output directory (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Override the spacing sampler seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build every scan found in a directory, in parallel
    Batch {
        /// Directory containing scan CSV triples
        directory: PathBuf,
        /// Output directory (defaults to the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Render one scan's draw model to PNG
    Plot {
        /// Directory containing <stem>_entries/_beams/_coords.csv
        directory: PathBuf,
        /// Scan file stem
        stem: String,
        /// Output PNG path (defaults to <directory>/<stem>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_WIDTH)]
        width: u32,
        #[arg(long, default_value_t = DEFAULT_HEIGHT)]
        height: u32,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination YAML file
        path: PathBuf,
    },
}

/// Outcome of processing one scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub stem: String,
    pub points: usize,
    pub drawable: usize,
    pub clusters: usize,
    pub angle_deg: f64,
    pub mm_per_pixel: f64,
    pub polygons_path: PathBuf,
    pub footprint_path: PathBuf,
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a bar for a known number of scans
fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Load a scan and run the pipeline on it.
pub fn build_model(directory: &Path, stem: &str, config: &PipelineConfig) -> Result<ScanDrawModel> {
    let input = loaders::load_scan(directory, stem)
        .with_context(|| format!("loading scan '{}' from {}", stem, directory.display()))?;
    build_draw_model_seeded(&input, config).with_context(|| format!("building draw model for '{}'", stem))
}

/// Build one scan and write `<stem>_polygons.csv` and `<stem>_footprint.csv` to `output_dir`.
pub fn process_scan(
    directory: &Path,
    stem: &str,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<ScanReport> {
    let model = build_model(directory, stem, config)?;

    let polygons_path = output_dir.join(format!("{}_polygons.csv", stem));
    let footprint_path = output_dir.join(format!("{}_footprint.csv", stem));

    write_polygons_csv(&polygons_path, &model.points, &model.polygons)?;
    write_footprint_csv(&footprint_path, model.footprints())?;

    info!("{}: polygons -> {}", stem, polygons_path.display());

    Ok(ScanReport {
        stem: stem.to_string(),
        points: model.points.len(),
        drawable: model.drawable_count(),
        clusters: model.clusters.len(),
        angle_deg: model.angle_rad.to_degrees(),
        mm_per_pixel: model.mm_per_pixel,
        polygons_path,
        footprint_path,
    })
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match cli.command {
        Commands::Build {
            directory,
            stem,
            output_dir,
            seed,
        } => {
            let mut config = config;
            if let Some(seed) = seed {
                config.spacing.seed = seed;
            }
            cmd_build(&directory, &stem, output_dir, &config)
        }
        Commands::Batch {
            directory,
            output_dir,
        } => cmd_batch(&directory, output_dir, &config),
        Commands::Plot {
            directory,
            stem,
            output,
            width,
            height,
        } => cmd_plot(&directory, &stem, output, width, height, &config),
        Commands::InitConfig { path } => cmd_init_config(&path, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn cmd_build(
    directory: &Path,
    stem: &str,
    output_dir: Option<PathBuf>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let output_dir = output_dir.unwrap_or_else(|| directory.to_path_buf());

    println!("Building draw model...");
    println!("Input: {} ({})", directory.display(), stem);
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Clustering and clipping scan points...");
    let result = process_scan(directory, stem, &output_dir, config);
    spinner.finish_and_clear();
    let report = result?;

    print_summary(
        "Draw Model Complete",
        &[
            ("Scan", report.stem.clone()),
            ("Points", report.points.to_string()),
            ("Drawable polygons", report.drawable.to_string()),
            ("Clusters", report.clusters.to_string()),
            ("Angle (deg)", format!("{:.3}", report.angle_deg)),
            ("mm per pixel", format!("{:.6}", report.mm_per_pixel)),
            ("Polygons CSV", report.polygons_path.display().to_string()),
            ("Footprint CSV", report.footprint_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_batch(directory: &Path, output_dir: Option<PathBuf>, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let output_dir = output_dir.unwrap_or_else(|| directory.to_path_buf());

    let stems = loaders::find_scan_stems(directory)
        .with_context(|| format!("listing scans in {}", directory.display()))?;
    if stems.is_empty() {
        warn!("No *_entries.csv files found in {}", directory.display());
    }

    println!("Processing {} scans from {}", stems.len(), directory.display());

    let pb = create_progress_bar(stems.len() as u64);

    // Each scan owns its inputs, so scans run independently
    let results: Vec<(String, Result<ScanReport>)> = stems
        .par_iter()
        .map(|stem| {
            let result = process_scan(directory, stem, &output_dir, config);
            pb.inc(1);
            (stem.clone(), result)
        })
        .collect();

    pb.finish_and_clear();

    let mut succeeded = 0usize;
    let mut total_points = 0usize;
    for (stem, result) in &results {
        match result {
            Ok(report) => {
                succeeded += 1;
                total_points += report.points;
            }
            Err(e) => error!("{}: {:#}", stem, e),
        }
    }

    print_summary(
        "Batch Complete",
        &[
            ("Directory", directory.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Scans found", stems.len().to_string()),
            ("Succeeded", succeeded.to_string()),
            ("Failed", (results.len() - succeeded).to_string()),
            ("Points processed", total_points.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_plot(
    directory: &Path,
    stem: &str,
    output: Option<PathBuf>,
    width: u32,
    height: u32,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| directory.join(format!("{}.png", stem)));

    let spinner = create_spinner("Building draw model...");
    let model = match build_model(directory, stem, config) {
        Ok(model) => model,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message("Generating plot...");
    let plotted = visualization::plot_draw_model(&output_path, &model, width, height);
    spinner.finish_and_clear();
    plotted.context("rendering PNG")?;

    print_summary(
        "Plot Complete",
        &[
            ("Scan", stem.to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Points", model.points.len().to_string()),
            ("Drawable polygons", model.drawable_count().to_string()),
            ("Size", format!("{}x{}", width, height)),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_init_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    config
        .to_yaml(path)
        .map_err(|e| anyhow::anyhow!("writing config to {}: {}", path.display(), e))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_scan(dir: &Path, stem: &str, n: usize) {
        let mut entries = fs::File::create(dir.join(format!("{}_entries.csv", stem))).unwrap();
        let mut beams = fs::File::create(dir.join(format!("{}_beams.csv", stem))).unwrap();
        let mut coords = fs::File::create(dir.join(format!("{}_coords.csv", stem))).unwrap();
        writeln!(entries, "id,has_location,has_normal_spectra,has_dwell_spectra,has_pseudo_intensities").unwrap();
        writeln!(beams, "x,y,z").unwrap();
        writeln!(coords, "i,j").unwrap();
        for k in 0..n {
            let i = (k % 5) as f64 * 10.0;
            let j = (k / 5) as f64 * 10.0;
            writeln!(entries, "{},true,true,false,false", 100 + k).unwrap();
            writeln!(beams, "{},{},5.0", i * 0.02, j * 0.02).unwrap();
            writeln!(coords, "{},{}", i, j).unwrap();
        }
    }

    #[test]
    fn test_process_scan_writes_outputs() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "scan", 15);
        let out = dir.path().join("out");

        let report = process_scan(dir.path(), "scan", &out, &PipelineConfig::default()).unwrap();

        assert_eq!(report.points, 15);
        assert_eq!(report.clusters, 1);
        assert!(report.drawable > 0);
        assert!((report.mm_per_pixel - 0.02).abs() < 1e-9);
        assert!(report.polygons_path.exists());
        assert!(report.footprint_path.exists());
    }

    #[test]
    fn test_process_scan_reports_misaligned_files() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "scan", 4);
        let mut beams = fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join("scan_beams.csv"))
            .unwrap();
        writeln!(beams, "9.0,9.0,5.0").unwrap();

        let err = process_scan(dir.path(), "scan", dir.path(), &PipelineConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("not aligned"));
    }
}
