use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod async_utils;
mod bench;
mod cmd;
mod config;
mod dataset;
mod errors;
mod prelude;
mod recognizers;
mod report;
mod scoring;
mod toml_utils;
mod ui;

/// Benchmark OCR engines against ground-truth transcripts.
#[derive(Debug, Parser)]
#[clap(
    version,
    after_help = r#"
Dataset layout:
  Each image `name.png` (or .jpg, .tif, .pdf, ...) needs a reference
  transcript `name.txt` beside it. Images may sit in the dataset
  directory itself or in subdirectories one level down.

Environment Variables:
  - RUST_LOG (optional): Logging filter, for example `ocr_bench=debug`.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Run every configured recognizer over a dataset and report scores.
    Run(cmd::run::RunOpts),
    /// Compare a single text file against a reference transcript.
    Score(cmd::score::ScoreOpts),
    /// Print schemas for output formats.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Run(opts) => opts.output_path.is_none(),
            Cmd::Score(opts) => opts.output_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Run(opts) => cmd::run::cmd_run(ui, opts).await,
        Cmd::Score(opts) => cmd::score::cmd_score(opts).await,
        Cmd::Schema(opts) => cmd::schema::cmd_schema(opts).await,
    }
}
