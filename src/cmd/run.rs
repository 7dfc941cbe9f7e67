//! The `run` subcommand.

use std::{sync::Arc, time::Duration};

use clap::Args;
use futures::StreamExt as _;

use super::StreamOpts;
use crate::{
    async_utils::io::write_json_pretty,
    bench::{Benchmark, BenchmarkReport, run_benchmark},
    config::BenchConfig,
    dataset::{DatasetEntry, find_samples, sample_stream},
    prelude::*,
    recognizers::RecognizerSet,
    report::CsvReportWriter,
    ui::{ProgressConfig, Ui},
};

/// Options for the `run` subcommand.
#[derive(Debug, Args)]
pub struct RunOpts {
    /// Directory containing images and their `.txt` reference transcripts.
    pub dataset: PathBuf,

    /// Benchmark configuration (TOML) listing the recognizers to compare.
    #[clap(short = 'c', long = "config")]
    pub config_path: PathBuf,

    /// Write the CSV report here. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Also write the full report as JSON.
    #[clap(long)]
    pub report_json: Option<PathBuf>,

    /// Recognition language, overriding the configuration's default.
    #[clap(long)]
    pub language: Option<String>,

    /// Give up on a recognizer call after this many seconds. Timeouts count as
    /// failures.
    #[clap(long)]
    pub timeout_secs: Option<f64>,

    /// Leave reference and recognized text out of the CSV report.
    #[clap(long)]
    pub without_texts: bool,

    #[clap(flatten)]
    pub stream_opts: StreamOpts,
}

/// The `run` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_run(ui: Ui, opts: &RunOpts) -> Result<()> {
    let config = BenchConfig::from_path(&opts.config_path).await?;
    let timeout = parse_timeout(opts.timeout_secs)?;

    // Find our samples.
    let entries = find_samples(&opts.dataset)?;
    let entries = opts.stream_opts.apply_take_first(entries);
    info!(count = entries.len(), "Benchmarking samples");

    // Set up our recognizers. They belong to this run, and are released at
    // the end of it.
    let recognizers = RecognizerSet::from_config(&config, opts.language.as_deref())?;
    let benchmark = Arc::new(Benchmark::new(recognizers, timeout));

    let result = score_to_csv(&ui, opts, &benchmark, entries).await;
    let report = benchmark.shutdown_after(result).await?;

    if let Some(path) = &opts.report_json {
        write_json_pretty(Some(path), &report).await?;
    }
    display_summary(&ui, &report);

    opts.stream_opts.check_failure_rate(report.failure_rate())
}

/// Score `entries`, writing rows as samples are scored and the summary last.
async fn score_to_csv(
    ui: &Ui,
    opts: &RunOpts,
    benchmark: &Arc<Benchmark>,
    entries: Vec<DatasetEntry>,
) -> Result<BenchmarkReport> {
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "🔎",
            msg: "Benchmarking images",
            done_msg: "Benchmarked images",
        },
        u64::try_from(entries.len()).context("too many samples")?,
    );
    let samples = pb.wrap_stream(sample_stream(entries)).boxed();

    let mut csv = CsvReportWriter::create(
        opts.output_path.as_deref(),
        &benchmark.recognizer_names(),
        !opts.without_texts,
    )
    .await?;
    let report =
        run_benchmark(benchmark, samples, opts.stream_opts.job_count, &mut csv).await?;
    csv.write_summary(&report.summaries, report.sample_count)
        .await?;
    csv.finish().await?;
    Ok(report)
}

/// Turn `--timeout-secs` into a [`Duration`]. Zero, negative and non-finite
/// values are rejected.
fn parse_timeout(secs: Option<f64>) -> Result<Option<Duration>> {
    secs.map(|secs| {
        let timeout = Some(secs)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        timeout.ok_or_else(|| anyhow!("--timeout-secs must be a positive number, got {}", secs))
    })
    .transpose()
}

/// Show the averages to the user.
fn display_summary(ui: &Ui, report: &BenchmarkReport) {
    for summary in &report.summaries {
        ui.display_message(
            "📊",
            &format!(
                "{}: average score {:.2}%, average time {:.2} ms over {} images ({} failed, {} unsupported)",
                summary.recognizer,
                summary.average_score,
                summary.average_time_ms,
                summary.sample_count,
                summary.failure_count,
                summary.unsupported_count,
            ),
        );
    }
    if !report.skipped.is_empty() {
        ui.display_message(
            "⚠️",
            &format!("{} images were skipped", report.skipped.len()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_must_be_positive() {
        assert_eq!(parse_timeout(None).unwrap(), None);
        assert_eq!(
            parse_timeout(Some(1.5)).unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert!(parse_timeout(Some(0.0)).is_err());
        assert!(parse_timeout(Some(-1.0)).is_err());
        assert!(parse_timeout(Some(f64::NAN)).is_err());
        assert!(parse_timeout(Some(f64::INFINITY)).is_err());
    }
}
