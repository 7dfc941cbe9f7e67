//! Error kinds for scoring and benchmark runs.
//!
//! Most of the application uses [`anyhow::Result`]. These typed errors exist
//! for the cases where callers need to decide what to do: skip a sample,
//! record a recognizer failure, or abort the run.

/// Errors produced by the benchmark core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BenchError {
    /// A similarity was requested against an empty reference transcript.
    #[error("reference text is empty after normalization")]
    InvalidInput,

    /// A recognizer failed or timed out on a single sample.
    #[error("recognizer {recognizer:?} failed: {message}")]
    RecognizerFailure { recognizer: String, message: String },

    /// A sample could not be scored at all.
    #[error("malformed sample {id:?}: {message}")]
    MalformedSample { id: String, message: String },

    /// There was nothing to score.
    #[error("no samples were scored")]
    EmptyDataset,
}
