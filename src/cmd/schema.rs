//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;

use crate::{
    async_utils::io::write_json_pretty,
    bench::{BenchmarkReport, ComparisonSample},
    prelude::*,
    scoring::Similarity,
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// The JSON report written by `run --report-json`.
    BenchmarkReport,
    /// A single scored image.
    ComparisonSample,
    /// Output of the `score` subcommand.
    Similarity,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::BenchmarkReport => schema_for!(BenchmarkReport),
        SchemaType::ComparisonSample => schema_for!(ComparisonSample),
        SchemaType::Similarity => schema_for!(Similarity),
    };
    write_json_pretty(schema_opts.output_path.as_deref(), &schema)
        .await
        .context("failed to write schema")
}
