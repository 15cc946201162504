//! Vorticity and temperature reports from a JSON bundle of raw simulation
//! fields.
//!
//! Bundles hold one serialized field per simulation variable (`u`, `w`, `ph`,
//! `phb` plus `dx` for vorticity; `t`, `p`, `pb`, `ph`, `phb` for
//! temperature). Outputs land as JSON in the output directory:
//!
//!   vorticity:   vorticity.json, turbulence_mask.json, summary.json
//!                (cross_section_<T>.json with --time)
//!   temperature: temperature.json

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vortex_core::{
    derive_temperature,
    profile::{
        cross_section, display_range, level_profile, percentile_summary, time_series,
        valid_fraction, valid_time_steps, value_range, PercentilePoint, DEFAULT_PERCENTILES,
        VALID_STEP_FRACTION,
    },
    AtmosphereFields, GridAxis, GridField, PipelineConfig, TemperatureFields, VorticityPipeline,
    VorticitySummary,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vortex-report", about = "Derive vorticity and temperature from raw simulation fields")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Vorticity, turbulence mask and contour band statistics.
    Vorticity {
        /// JSON bundle with u, w, ph, phb and dx.
        #[arg(short, long)]
        input: PathBuf,

        /// Pipeline configuration JSON; Titan defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "out")]
        output: PathBuf,

        /// Also write the level × west-east cross-section at this time step.
        #[arg(short, long)]
        time: Option<usize>,
    },
    /// Actual temperature, total pressure and mass-level height.
    Temperature {
        /// JSON bundle with t, p, pb, ph and phb.
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },
}

// ── Output types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MaskOutput<'a> {
    axes: &'a [GridAxis],
    shape: &'a [usize],
    threshold: f64,
    mask: Vec<bool>,
}

/// NaN-aware diagnostics of one time step of the raw vorticity.
#[derive(Serialize)]
struct StepDiagnostics {
    time: usize,
    valid_fraction: f64,
    mean: Option<f64>,
    display_range: Option<(f64, f64)>,
}

#[derive(Serialize)]
struct ReportSummary {
    vorticity: VorticitySummary,
    /// `None` when the sanitized field has no finite values.
    percentiles: Option<Vec<PercentilePoint>>,
    /// Steps with more than half of their cells finite.
    valid_time_steps: Vec<usize>,
    steps: Vec<StepDiagnostics>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let file = fs::File::create(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            PipelineConfig::from_json(&text)
                .with_context(|| format!("invalid config {}", p.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Per-time-step diagnostics; display ranges take one rayon task per step.
fn step_diagnostics(field: &GridField) -> Result<Vec<StepDiagnostics>> {
    let fractions = valid_fraction(field)?;
    let means = time_series(field)?;
    let ranges: Vec<Option<(f64, f64)>> = field
        .split_along(GridAxis::Time)?
        .par_iter()
        .map(|step| display_range(step).ok())
        .collect();

    Ok(fractions
        .into_iter()
        .zip(means)
        .zip(ranges)
        .enumerate()
        .map(|(time, ((valid_fraction, mean), display_range))| StepDiagnostics {
            time,
            valid_fraction,
            mean: mean.is_finite().then_some(mean),
            display_range,
        })
        .collect())
}

fn print_profile(label: &str, profile: &[f64]) {
    println!("{label}");
    for (k, v) in profile.iter().enumerate() {
        println!("  level {k:>3}  {v:>14.6e}");
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_vorticity(
    input: &Path,
    config: Option<&Path>,
    output: &Path,
    time: Option<usize>,
) -> Result<()> {
    let config = load_config(config)?;
    let fields: AtmosphereFields = read_json(input)?;
    info!(
        u = ?fields.u.shape(),
        w = ?fields.w.shape(),
        dx = fields.dx,
        "loaded atmosphere bundle"
    );

    let report = VorticityPipeline::new(config)
        .run(&fields)
        .context("vorticity pipeline failed")?;

    let sanitized = report.sanitized.field();
    let steps = step_diagnostics(&report.vorticity)?;
    let valid_steps = valid_time_steps(&report.vorticity, VALID_STEP_FRACTION)?;
    let percentiles = match percentile_summary(sanitized, &DEFAULT_PERCENTILES) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(error = %e, "percentile summary skipped");
            None
        }
    };

    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;
    write_json(output, "vorticity.json", sanitized)?;
    write_json(
        output,
        "turbulence_mask.json",
        &MaskOutput {
            axes: report.mask.axes(),
            shape: report.mask.shape(),
            threshold: report.threshold,
            mask: report.mask.mask().iter().copied().collect(),
        },
    )?;

    if let Some(t) = time {
        let section = cross_section(sanitized, t)
            .with_context(|| format!("cross-section at time step {t}"))?;
        write_json(output, &format!("cross_section_{t}.json"), &section)?;
    }

    let summary = ReportSummary {
        vorticity: report.summary(),
        percentiles,
        valid_time_steps: valid_steps,
        steps,
    };
    write_json(output, "summary.json", &summary)?;

    let raw = value_range(&report.vorticity);
    println!("vorticity shape {:?}", report.vorticity.shape());
    println!(
        "raw range [{:?}, {:?}], {} NaN",
        raw.min, raw.max, raw.nan_count
    );
    if let Some(b) = summary.vorticity.clip_bounds {
        println!("clipped to [{:.6e}, {:.6e}]", b.low, b.high);
    }
    println!(
        "threshold {:.6e}: {} turbulent cells ({:.2}%)",
        report.threshold,
        summary.vorticity.turbulent_cells,
        summary.vorticity.turbulent_fraction * 100.0
    );
    for p in summary.percentiles.iter().flatten() {
        println!("  p{:<4} {:>14.6e}", p.percentile, p.value);
    }
    println!("mean vorticity per time step");
    for s in &summary.steps {
        let mean = s.mean.map_or_else(|| "no data".to_string(), |m| format!("{m:.6e}"));
        println!(
            "  time {:>4}  {:>14}  {:5.1}% valid",
            s.time,
            mean,
            s.valid_fraction * 100.0
        );
    }
    println!("time steps with sufficient valid data: {:?}", summary.valid_time_steps);
    print_profile("mean vorticity per level", &level_profile(sanitized)?);
    Ok(())
}

fn run_temperature(input: &Path, config: Option<&Path>, output: &Path) -> Result<()> {
    let config = load_config(config)?;
    let fields: TemperatureFields = read_json(input)?;
    info!(t = ?fields.t.shape(), ph = ?fields.ph.shape(), "loaded temperature bundle");

    let report = derive_temperature(&fields, &config.constants)
        .context("temperature derivation failed")?;

    let range = value_range(&report.temperature);
    let (Some(min), Some(max)) = (range.min, range.max) else {
        bail!("temperature field has no finite values");
    };

    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;
    write_json(output, "temperature.json", &report)?;

    println!("temperature {:.2} K to {:.2} K", min, max);
    print_profile("mean temperature per level (K)", &level_profile(&report.temperature)?);
    print_profile("mean height per level (m)", &level_profile(&report.height)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vortex_core=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Vorticity {
            input,
            config,
            output,
            time,
        } => run_vorticity(&input, config.as_deref(), &output, time),
        Command::Temperature {
            input,
            config,
            output,
        } => run_temperature(&input, config.as_deref(), &output),
    }
}
