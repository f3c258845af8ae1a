use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use dvv_io::{CorrelationDataset, CorrelationMatrixReader, ExperimentName, ResultWriter};
use dvv_stretch::{
    EstimationResult, MultiReferenceConfig, ShiftConfig, Sides, StretchConfig, TimeWindow,
    WindowWidth, interval_references, time_windows,
};

#[derive(Parser)]
#[command(name = "dvv")]
#[command(about = "Seismic velocity-change monitoring from repeated noise correlations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel file processing (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Shared search parameters.
#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// Maximum absolute trial factor (default 0.1 for stretch, 10 samples for shift)
    #[arg(long)]
    range: Option<f64>,

    /// Number of trial factors in [-range, range]
    #[arg(long, default_value_t = 100)]
    steps: usize,

    /// Lag sides to compare: "both", "left", "right", or "single"
    #[arg(long, default_value = "both")]
    sides: String,

    /// Window start sample indices (defaults to the first half of the lags)
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    window_start: Vec<isize>,

    /// Window width in samples; one value for all windows or one per start
    #[arg(long, num_args = 1..)]
    window_width: Vec<usize>,
}

/// Shared output parameters.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate relative stretch of every epoch against the mean reference
    Stretch {
        /// Correlation matrix CSV files (`epoch,lag_0,...`), processed in parallel
        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Estimate time shifts (in samples) of every epoch against the mean reference
    Shift {
        /// Correlation matrix CSV files (`epoch,lag_0,...`), processed in parallel
        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,

        /// Search the right side only instead of averaging both sides
        #[arg(long, default_value_t = false)]
        single_sided: bool,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        search: SearchArgs,
    },

    /// Estimate stretch against interval references and reconcile them
    MultiRef {
        /// Correlation matrix CSV file (`epoch,lag_0,...`)
        #[arg(long)]
        data: PathBuf,

        /// Reference interval length, in epochs
        #[arg(long)]
        interval: f64,

        /// Epoch index no reference interval may straddle
        #[arg(long)]
        break_point: Option<f64>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        search: SearchArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct EstimateOutput {
    experiment: String,
    kind: &'static str,
    files: Vec<FileOutput>,
}

#[derive(Serialize)]
struct FileOutput {
    data: PathBuf,
    artifact: PathBuf,
    n_epochs: usize,
    n_lag: usize,
    n_windows: usize,
    mean_corr: Option<f64>,
    mean_factor: Option<f64>,
}

#[derive(Serialize)]
struct MultiRefOutput {
    experiment: String,
    data: PathBuf,
    artifact: PathBuf,
    n_epochs: usize,
    n_references: usize,
    offsets: Vec<f64>,
    mean_corr: Option<f64>,
    mean_factor: Option<f64>,
}

/// Build the configured windows, or `None` to use the library default.
fn build_windows(search: &SearchArgs) -> Result<Option<Vec<TimeWindow>>> {
    if search.window_start.is_empty() {
        if !search.window_width.is_empty() {
            anyhow::bail!("--window-width given without --window-start");
        }
        return Ok(None);
    }
    let width = match search.window_width.as_slice() {
        [] => anyhow::bail!("--window-start requires --window-width"),
        [w] => WindowWidth::Uniform(*w),
        widths => WindowWidth::PerWindow(widths.to_vec()),
    };
    Ok(Some(time_windows(&search.window_start, &width)?))
}

fn stretch_config(search: &SearchArgs) -> Result<StretchConfig> {
    let mut config = StretchConfig::new(search.range.unwrap_or(0.1), search.steps)?
        .with_sides(Sides::from_name(&search.sides))
        .with_keep_similarity(false);
    if let Some(windows) = build_windows(search)? {
        config = config.with_windows(windows);
    }
    Ok(config)
}

fn shift_config(search: &SearchArgs, single_sided: bool) -> Result<ShiftConfig> {
    if search.sides != "both" {
        warn!(sides = %search.sides, "--sides is ignored by shift; use --single-sided");
    }
    let mut config = ShiftConfig::new(search.range.unwrap_or(10.0), search.steps)?
        .with_single_sided(single_sided)
        .with_keep_similarity(false);
    if let Some(windows) = build_windows(search)? {
        config = config.with_windows(windows);
    }
    Ok(config)
}

/// Turn a data file name into an artifact label matching `[a-zA-Z0-9_-]+`.
fn file_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if label.is_empty() { "data".to_string() } else { label }
}

/// Mean of the non-NaN values of the first window, if any.
fn first_window_means(result: &EstimationResult) -> (Option<f64>, Option<f64>) {
    if result.n_windows() == 0 {
        return (None, None);
    }
    let mean = |values: ndarray::ArrayView1<'_, f64>| {
        let (sum, n) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0_f64, 0usize), |(s, n), v| (s + *v, n + 1));
        (n > 0).then(|| sum / n as f64)
    };
    (mean(result.corr_in(0)), mean(result.factor_in(0)))
}

fn read_dataset(path: &Path) -> Result<CorrelationDataset> {
    CorrelationMatrixReader::new(path)
        .read()
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Read, estimate, and write every file in parallel.
fn run_per_file<F>(data: &[PathBuf], writer: &ResultWriter, estimate: F) -> Result<Vec<FileOutput>>
where
    F: Fn(&CorrelationDataset) -> Result<EstimationResult> + Sync,
{
    data.par_iter()
        .map(|path| {
            let dataset = read_dataset(path)?;
            let result = estimate(&dataset)
                .with_context(|| format!("estimation failed for {}", path.display()))?;
            let artifact = writer.write_estimate(&file_label(path), &dataset.epochs, &result)?;
            let (mean_corr, mean_factor) = first_window_means(&result);
            Ok(FileOutput {
                data: path.clone(),
                artifact,
                n_epochs: dataset.n_epochs(),
                n_lag: dataset.n_lag(),
                n_windows: result.n_windows(),
                mean_corr,
                mean_factor,
            })
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Stretch {
            data,
            output,
            search,
        } => {
            let config = stretch_config(&search)?;
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;

            let files = run_per_file(&data, &writer, |dataset| {
                Ok(config.estimate(dataset.view(), None)?)
            })?;
            info!(n_files = files.len(), "stretch estimates written");

            let summary = EstimateOutput {
                experiment: output.experiment,
                kind: "stretch",
                files,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Shift {
            data,
            single_sided,
            output,
            search,
        } => {
            let config = shift_config(&search, single_sided)?;
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;

            let files = run_per_file(&data, &writer, |dataset| {
                Ok(config.estimate(dataset.view(), None)?)
            })?;
            info!(n_files = files.len(), "shift estimates written");

            let summary = EstimateOutput {
                experiment: output.experiment,
                kind: "shift",
                files,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::MultiRef {
            data,
            interval,
            break_point,
            output,
            search,
        } => {
            let config = MultiReferenceConfig::from_stretch(stretch_config(&search)?);
            let experiment_name = ExperimentName::new(output.experiment.clone())?;

            let dataset = read_dataset(&data)?;
            let times: Vec<f64> = (0..dataset.n_epochs()).map(|e| e as f64).collect();
            let references = interval_references(dataset.view(), &times, interval, break_point)
                .context("failed to build interval references")?;
            info!(n_references = references.nrows(), "interval references built");

            let reconciled = config
                .estimate_and_align(dataset.view(), &references)
                .context("multi-reference estimation failed")?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            let artifact = writer.write_multiref(&file_label(&data), &dataset.epochs, &reconciled)?;

            let (mean_corr, mean_factor) = first_window_means(&reconciled.result);
            let summary = MultiRefOutput {
                experiment: output.experiment,
                data,
                artifact,
                n_epochs: dataset.n_epochs(),
                n_references: reconciled.offsets.len(),
                offsets: reconciled.offsets.to_vec(),
                mean_corr,
                mean_factor,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
