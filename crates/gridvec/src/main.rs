//! gridvec: command-line front end for the gridvec engine.
//!
//! Subcommands:
//!
//! - `vectorize`: raster classes to polygons, with per-stage diagnostics
//! - `contour`: isolines of a raster surface
//! - `rasterize`: polygons to a region-id grid
//! - `clip`: cut a raster to a polygon mask
//! - `zonal`: per-polygon statistics of raster values
//!
//! Rasters are read from an image (PNG, JPEG, BMP, WebP; luminance is the
//! cell value) or from a JSON-serialized `Raster`. Polygons are read from
//! a GeoJSON `FeatureCollection` or a JSON list of shapes.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin gridvec -- vectorize [OPTIONS] <RASTER>
//! ```
//!
//! Set `RUST_LOG=debug` to see dropped rings and stage summaries.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use gridvec_core::diagnostics::{Clock, VectorizeDiagnostics};
use gridvec_core::{
    ClassSelection, ContourConfig, ContourLevels, LookupTable, OutputMode, Raster, Selection,
    Shape, Unbounded, VectorizeConfig, ZonalConfig,
};
use gridvec_export::SvgMetadata;

/// Raster to vector conversion and polygon driven raster tools.
#[derive(Parser)]
#[command(name = "gridvec", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Vectorize raster classes into polygons.
    Vectorize(VectorizeArgs),
    /// Trace contour lines of a raster surface.
    Contour(ContourArgs),
    /// Burn polygons into a grid of polygon indices.
    Rasterize(RasterizeArgs),
    /// Clip a raster to polygons.
    Clip(ClipArgs),
    /// Per-polygon statistics of raster values.
    Zonal(ZonalArgs),
}

/// How to read and place the input raster.
#[derive(Args)]
struct RasterInput {
    /// Input raster: an image file or a JSON raster.
    raster: PathBuf,

    /// Cell size for image inputs (map units).
    #[arg(long)]
    cellsize: Option<f64>,

    /// X of the lower-left cell centre for image inputs.
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    x_min: f64,

    /// Y of the lower-left cell centre for image inputs.
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    y_min: f64,

    /// Treat this value as NODATA.
    #[arg(long, allow_negative_numbers = true)]
    nodata: Option<f64>,
}

/// Where to write vector output.
#[derive(Args)]
struct VectorOutput {
    /// Write GeoJSON output to file.
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Write an SVG preview to file.
    #[arg(long)]
    svg: Option<PathBuf>,
}

#[derive(Args)]
struct VectorizeArgs {
    #[command(flatten)]
    input: RasterInput,

    /// Vectorize only cells holding this value.
    #[arg(long, allow_negative_numbers = true)]
    class: Option<f64>,

    /// One shape per island instead of one multipart shape per class.
    #[arg(long)]
    split_islands: bool,

    /// Keep vertices along straight boundary runs.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_KEEP_ALL_VERTICES)]
    keep_all_vertices: bool,

    /// Mark boundaries on the rayon thread pool.
    #[arg(long, default_value_t = VectorizeConfig::DEFAULT_PARALLEL)]
    parallel: bool,

    /// JSON lookup table naming value ranges.
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Full vectorize config as a JSON string.
    ///
    /// When provided, the other vectorize flags are ignored. The JSON
    /// must be a valid `VectorizeConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..),
    )]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    output: VectorOutput,
}

#[derive(Args)]
struct ContourArgs {
    #[command(flatten)]
    input: RasterInput,

    /// Contour value; repeat for several.
    #[arg(long = "level", allow_negative_numbers = true)]
    levels: Vec<f64>,

    /// Equidistance between levels (with --min and --max).
    #[arg(long)]
    step: Option<f64>,

    /// Lowest level for --step; defaults to the data minimum.
    #[arg(long, allow_negative_numbers = true)]
    min: Option<f64>,

    /// Highest level for --step; defaults to the data maximum.
    #[arg(long, allow_negative_numbers = true)]
    max: Option<f64>,

    /// Drop line parts not longer than this (map units).
    #[arg(long, default_value_t = ContourConfig::DEFAULT_MIN_LENGTH)]
    min_length: f64,

    /// Keep all parts of a level in one record.
    #[arg(long)]
    join_parts: bool,

    /// Trace levels on the rayon thread pool.
    #[arg(long, default_value_t = ContourConfig::DEFAULT_PARALLEL)]
    parallel: bool,

    /// Full contour config as a JSON string; other contour flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    #[command(flatten)]
    output: VectorOutput,
}

#[derive(Args)]
struct RasterizeArgs {
    /// Input polygons (GeoJSON or JSON shape list).
    polygons: PathBuf,

    /// Take the grid geometry from this raster.
    #[command(flatten)]
    like: RasterInput,

    /// Burn only selected polygons, when any are selected.
    #[arg(long)]
    only_selected: bool,

    /// Write the region grid as a JSON raster.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct ClipArgs {
    #[command(flatten)]
    input: RasterInput,

    /// Input polygons (GeoJSON or JSON shape list).
    #[arg(long)]
    polygons: PathBuf,

    /// Clip to selected polygons only, when any are selected.
    #[arg(long)]
    only_selected: bool,

    /// Write the clipped raster as JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct ZonalArgs {
    #[command(flatten)]
    input: RasterInput,

    /// Input polygons (GeoJSON or JSON shape list).
    #[arg(long)]
    polygons: PathBuf,

    /// Report quantiles every this many percent (0 disables).
    #[arg(long, default_value_t = ZonalConfig::DEFAULT_QUANTILE_STEP)]
    quantile_step: u32,

    /// Use selected polygons only, when any are selected.
    #[arg(long)]
    only_selected: bool,

    /// Full zonal config as a JSON string; other zonal flags are ignored.
    #[arg(long)]
    config_json: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let result = match &cli.command {
        Command::Vectorize(args) => vectorize(args),
        Command::Contour(args) => contour(args),
        Command::Rasterize(args) => rasterize(args),
        Command::Clip(args) => clip(args),
        Command::Zonal(args) => zonal(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Input and output helpers
// ---------------------------------------------------------------------------

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Error reading {}: {e}", path.display()))
}

fn write_text(path: &Path, text: &str, what: &str) -> Result<(), String> {
    std::fs::write(path, text)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    eprintln!("{what} written to {} ({} bytes)", path.display(), text.len());
    Ok(())
}

/// Load the raster named by `input`, applying placement and NODATA
/// overrides.
fn load_raster(input: &RasterInput) -> Result<Raster, String> {
    let path = &input.raster;
    let raster = if is_json(path) {
        serde_json::from_str::<Raster>(&read_text(path)?)
            .map_err(|e| format!("Error parsing raster {}: {e}", path.display()))?
    } else {
        let bytes =
            std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        let raster = Raster::from_image_bytes(&bytes)
            .map_err(|e| format!("Error decoding {}: {e}", path.display()))?;
        match input.cellsize {
            Some(cellsize) => raster
                .georeferenced(cellsize, input.x_min, input.y_min)
                .map_err(|e| format!("Invalid grid placement: {e}"))?,
            None => raster,
        }
    };

    let raster = match input.nodata {
        Some(nodata) => raster.with_nodata(nodata),
        None => raster,
    };
    let system = raster.system();
    eprintln!(
        "Raster: {} ({}x{}, cell size {}, {} data cells)",
        path.display(),
        system.nx,
        system.ny,
        system.cellsize,
        raster.data_count(),
    );
    Ok(raster)
}

/// Load polygons from GeoJSON, or from a JSON list of shapes.
fn load_polygons(path: &Path) -> Result<Vec<Shape>, String> {
    let text = read_text(path)?;
    let shapes = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing shapes {}: {e}", path.display()))?
    } else {
        gridvec_export::shapes_from_geojson(&text)
            .map_err(|e| format!("Error parsing GeoJSON {}: {e}", path.display()))?
    };
    eprintln!("Polygons: {} ({} shapes)", path.display(), shapes.len());
    Ok(shapes)
}

const fn selection(only_selected: bool) -> Selection {
    if only_selected {
        Selection::OnlySelected
    } else {
        Selection::All
    }
}

fn title_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("gridvec")
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Error serializing output: {e}"))
}

// ---------------------------------------------------------------------------
// vectorize
// ---------------------------------------------------------------------------

/// Build a [`VectorizeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn vectorize_config(args: &VectorizeArgs) -> Result<VectorizeConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(VectorizeConfig {
        class_selection: args.class.map_or(ClassSelection::All, ClassSelection::Single),
        output_mode: if args.split_islands {
            OutputMode::SplitIslands
        } else {
            OutputMode::Multipart
        },
        keep_all_vertices: args.keep_all_vertices,
        parallel: args.parallel,
    })
}

fn vectorize(args: &VectorizeArgs) -> Result<(), String> {
    let config = vectorize_config(args)?;
    let raster = load_raster(&args.input)?;
    let lookup: Option<LookupTable> = match &args.lookup {
        Some(path) => Some(
            serde_json::from_str(&read_text(path)?)
                .map_err(|e| format!("Error parsing lookup table {}: {e}", path.display()))?,
        ),
        None => None,
    };

    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);

    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let (shapes, diagnostics) = gridvec_core::classes_to_polygons_with_diagnostics(
            &raster,
            &config,
            lookup.as_ref(),
            &StdClock,
            &mut Unbounded,
        )
        .map_err(|e| format!("Vectorization error: {e}"))?;

        if args.json {
            println!("{}", to_json(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }

        // Write outputs on the first run only.
        if run == 0 {
            if let Some(ref path) = args.output.geojson {
                let doc = gridvec_export::shapes_to_geojson(&shapes).to_string();
                write_text(path, &doc, "GeoJSON")?;
            }
            if let Some(ref path) = args.output.svg {
                let desc = format!("{config:?}");
                let config_json = serde_json::to_string(&config).ok();
                let metadata = SvgMetadata {
                    title: Some(title_of(&args.input.raster)),
                    description: Some(&desc),
                    config_json: config_json.as_deref(),
                };
                let svg =
                    gridvec_export::shapes_to_svg(&shapes, &raster.system().extent(), &metadata);
                write_text(path, &svg, "SVG")?;
            }
        }

        all_diagnostics.push(diagnostics);

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&VectorizeDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[VectorizeDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Labeling", |d| d.labeling.duration),
        ("Edge Detection", |d| d.edge_detection.duration),
        ("Tracing", |d| d.tracing.duration),
        ("Split", |d| d.split.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

// ---------------------------------------------------------------------------
// contour
// ---------------------------------------------------------------------------

fn contour_config(args: &ContourArgs, raster: &Raster) -> Result<ContourConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let levels = match (args.levels.as_slice(), args.step) {
        ([], None) => ContourLevels::Auto,
        ([], Some(step)) => {
            let (lo, hi) = raster.min_max().unwrap_or((0.0, 0.0));
            ContourLevels::Equal {
                min: args.min.unwrap_or(lo),
                max: args.max.unwrap_or(hi),
                step,
            }
        }
        ([single], None) => ContourLevels::Single(*single),
        (list, None) => ContourLevels::List(list.to_vec()),
        (_, Some(_)) => return Err("--level and --step are mutually exclusive".to_string()),
    };

    Ok(ContourConfig {
        levels,
        min_length: args.min_length,
        split_parts: !args.join_parts,
        parallel: args.parallel,
    })
}

fn contour(args: &ContourArgs) -> Result<(), String> {
    let raster = load_raster(&args.input)?;
    let config = contour_config(args, &raster)?;
    eprintln!("Config: {config:#?}");

    let start = Instant::now();
    let lines = gridvec_core::grid_to_contours(&raster, &config, &mut Unbounded)
        .map_err(|e| format!("Contour error: {e}"))?;
    let points: usize = lines.iter().map(gridvec_core::ContourLine::point_count).sum();
    println!(
        "Contours: {} records, {} points in {:.3}ms",
        lines.len(),
        points,
        start.elapsed().as_secs_f64() * 1000.0,
    );

    if let Some(ref path) = args.output.geojson {
        let doc = gridvec_export::contours_to_geojson(&lines).to_string();
        write_text(path, &doc, "GeoJSON")?;
    }
    if let Some(ref path) = args.output.svg {
        let config_json = serde_json::to_string(&config).ok();
        let metadata = SvgMetadata {
            title: Some(title_of(&args.input.raster)),
            config_json: config_json.as_deref(),
            ..SvgMetadata::default()
        };
        let svg = gridvec_export::contours_to_svg(&lines, &raster.system().extent(), &metadata);
        write_text(path, &svg, "SVG")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// rasterize, clip, zonal
// ---------------------------------------------------------------------------

fn rasterize(args: &RasterizeArgs) -> Result<(), String> {
    let shapes = load_polygons(&args.polygons)?;
    let like = load_raster(&args.like)?;

    let selected = selection(args.only_selected);
    let grid = gridvec_core::rasterize_polygons(&shapes, like.system(), selected, &mut Unbounded)
        .map_err(|e| format!("Rasterization error: {e}"))?;
    println!("Rasterized: {} labelled cells", grid.labelled_count());

    write_text(&args.out, &to_json(&Raster::from(&grid))?, "Region grid")
}

fn clip(args: &ClipArgs) -> Result<(), String> {
    let raster = load_raster(&args.input)?;
    let shapes = load_polygons(&args.polygons)?;

    let selected = selection(args.only_selected);
    let clipped = gridvec_core::clip_to_polygons(&raster, &shapes, selected, &mut Unbounded)
        .map_err(|e| format!("Clip error: {e}"))?;
    let system = clipped.system();
    println!(
        "Clipped: {}x{} grid, {} data cells",
        system.nx,
        system.ny,
        clipped.data_count(),
    );

    write_text(&args.out, &to_json(&clipped)?, "Clipped raster")
}

fn zonal(args: &ZonalArgs) -> Result<(), String> {
    let config = match args.config_json {
        Some(ref json) => {
            serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
        }
        None => ZonalConfig {
            quantile_step: args.quantile_step,
            ..ZonalConfig::default()
        },
    };
    let raster = load_raster(&args.input)?;
    let shapes = load_polygons(&args.polygons)?;

    let selected = selection(args.only_selected);
    let stats = gridvec_core::zonal_statistics(&raster, &shapes, &config, selected, &mut Unbounded)
        .map_err(|e| format!("Zonal statistics error: {e}"))?;

    let rows: Vec<serde_json::Value> = shapes
        .iter()
        .zip(&stats)
        .map(|(shape, stats)| {
            serde_json::json!({
                "id": shape.id,
                "name": shape.name,
                "statistics": stats,
            })
        })
        .collect();
    println!("{}", to_json(&rows)?);
    Ok(())
}
