//! The `score` subcommand.

use clap::Args;

use crate::{
    async_utils::io::{read_text, write_json_pretty},
    prelude::*,
    scoring::similarity,
};

/// Score one recognized text against its reference.
#[derive(Debug, Args)]
pub struct ScoreOpts {
    /// The ground-truth transcript.
    pub reference: PathBuf,

    /// The text to score.
    pub candidate: PathBuf,

    /// Where to write the JSON result. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `score` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_score(opts: &ScoreOpts) -> Result<()> {
    let reference = read_text(&opts.reference).await?;
    let candidate = read_text(&opts.candidate).await?;
    let result = similarity(&reference, &candidate)
        .with_context(|| format!("cannot score against {:?}", opts.reference))?;
    debug!(?result, "Scored text");
    write_json_pretty(opts.output_path.as_deref(), &result).await
}
