//! Running recognizers over samples and scoring the results.
//!
//! [`Benchmark`] owns the recognizers for one run. It turns each [`Sample`]
//! into a [`ComparisonSample`] by calling every recognizer in order and
//! scoring what comes back. It does no file I/O of its own: samples are read
//! by [`crate::dataset`], and reports are written by [`crate::report`].

use std::{sync::Arc, time::Duration};

use futures::{FutureExt as _, StreamExt as _};
use schemars::JsonSchema;

use crate::{
    async_utils::BoxedStream,
    errors::BenchError,
    prelude::*,
    recognizers::{RecognizerInput, RecognizerSet, RecognizerSlot, UNSUPPORTED_SENTINEL},
    scoring::{normalize::normalize, similarity},
};

pub mod aggregate;

pub use self::aggregate::{BenchmarkReport, RecognizerSummary, ReportBuilder};

/// A single image and its reference transcript.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Identifies the sample in reports.
    pub id: String,

    /// The image to recognize.
    pub image_path: PathBuf,

    /// The ground-truth text.
    pub reference: String,
}

/// How a recognizer call turned out.
#[derive(Clone, Copy, Debug, JsonSchema, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStatus {
    /// The recognizer returned text.
    Ok,

    /// The recognizer doesn't support the requested language.
    Unsupported,

    /// The recognizer failed or timed out.
    Failed,
}

/// One recognizer's result for one sample.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct RecognizerResult {
    /// The recognizer's name.
    pub recognizer: String,

    /// What happened.
    pub status: RecognitionStatus,

    /// The recognized text. Empty if the recognizer failed.
    pub text: String,

    /// Why the recognizer failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Recognition time in milliseconds.
    pub elapsed_ms: f64,

    /// Levenshtein distance to the reference, after normalization.
    pub distance: usize,

    /// Similarity to the reference, as a percentage. May be negative.
    pub similarity: f64,
}

/// A scored sample.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct ComparisonSample {
    /// Identifies the sample.
    pub id: String,

    /// The ground-truth text.
    pub reference: String,

    /// One result per recognizer, in report order.
    pub results: Vec<RecognizerResult>,
}

/// A sample we could not score.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct SkippedSample {
    /// Identifies the sample.
    pub id: String,

    /// Why it was skipped.
    pub reason: String,
}

impl SkippedSample {
    /// Describe a skipped sample from the error that caused it.
    pub fn from_error(err: &BenchError) -> Self {
        match err {
            BenchError::MalformedSample { id, message } => Self {
                id: id.clone(),
                reason: message.clone(),
            },
            other => Self {
                id: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// The result of processing one sample.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleOutcome {
    /// Every recognizer ran and was scored.
    Scored(ComparisonSample),

    /// The sample was skipped.
    Skipped(SkippedSample),
}

/// A benchmark run: a set of recognizers and how to call them.
pub struct Benchmark {
    /// The recognizers, in report order.
    recognizers: RecognizerSet,

    /// Per-call time limit. A call which exceeds it counts as a failure.
    timeout: Option<Duration>,
}

impl Benchmark {
    /// Create a new benchmark.
    pub fn new(recognizers: RecognizerSet, timeout: Option<Duration>) -> Self {
        Self {
            recognizers,
            timeout,
        }
    }

    /// Recognizer names, in report order.
    pub fn recognizer_names(&self) -> Vec<String> {
        self.recognizers.names()
    }

    /// Run every recognizer on `sample` and score the results.
    ///
    /// Recognizer failures are recorded in the result and never abort the
    /// sample. A sample whose reference is empty after normalization is
    /// skipped, since no similarity can be computed for it.
    #[instrument(level = "debug", skip_all, fields(id = %sample.id))]
    pub async fn score_sample(&self, sample: Sample) -> SampleOutcome {
        if normalize(&sample.reference).is_empty() {
            let err = BenchError::MalformedSample {
                id: sample.id.clone(),
                message: BenchError::InvalidInput.to_string(),
            };
            warn!("Skipping sample: {err}");
            return SampleOutcome::Skipped(SkippedSample::from_error(&err));
        }

        info!(id = %sample.id, "Scoring sample");
        let mut results: Vec<RecognizerResult> =
            Vec::with_capacity(self.recognizers.slots().len());
        for slot in self.recognizers.slots() {
            // Base slots always come first, so their result is already here.
            let base = slot.base().and_then(|index| results.get(index));
            let input = RecognizerInput {
                id: sample.id.clone(),
                image_path: sample.image_path.clone(),
                language: slot.language().map(str::to_owned),
                base_text: base
                    .filter(|base| base.status == RecognitionStatus::Ok)
                    .map(|base| base.text.clone()),
            };
            let attempt = self.run_recognizer(slot, base, &input).await;
            match score_attempt(&sample.reference, slot.name(), attempt) {
                Ok(result) => results.push(result),
                Err(err) => {
                    let err = BenchError::MalformedSample {
                        id: sample.id.clone(),
                        message: err.to_string(),
                    };
                    warn!("Skipping sample: {err}");
                    return SampleOutcome::Skipped(SkippedSample::from_error(&err));
                }
            }
        }

        SampleOutcome::Scored(ComparisonSample {
            id: sample.id,
            reference: sample.reference,
            results,
        })
    }

    /// Call a single recognizer, turning unsupported languages, errors and
    /// timeouts into an [`Attempt`].
    ///
    /// A post-processor inherits an unsupported or failed `base` without
    /// being called.
    async fn run_recognizer(
        &self,
        slot: &RecognizerSlot,
        base: Option<&RecognizerResult>,
        input: &RecognizerInput,
    ) -> Attempt {
        let base_status = base.map(|base| base.status);
        if slot.is_unsupported() || base_status == Some(RecognitionStatus::Unsupported) {
            debug!(recognizer = slot.name(), language = ?slot.language(), "Language not supported");
            return Attempt {
                status: RecognitionStatus::Unsupported,
                text: UNSUPPORTED_SENTINEL.to_owned(),
                error: None,
                elapsed: Duration::ZERO,
            };
        }
        if let Some(base) = base.filter(|base| base.status == RecognitionStatus::Failed) {
            let failure = BenchError::RecognizerFailure {
                recognizer: slot.name().to_owned(),
                message: format!("base recognizer {} failed", base.recognizer),
            };
            warn!(id = %input.id, "{failure}");
            return Attempt {
                status: RecognitionStatus::Failed,
                text: String::new(),
                error: Some(failure.to_string()),
                elapsed: Duration::ZERO,
            };
        }

        let (elapsed, result) = slot.recognize(input, self.timeout).await;
        match result {
            Ok(recognition) => Attempt {
                status: RecognitionStatus::Ok,
                text: recognition.text,
                error: None,
                elapsed,
            },
            Err(err) => {
                let failure = BenchError::RecognizerFailure {
                    recognizer: slot.name().to_owned(),
                    message: format!("{err:#}"),
                };
                warn!(id = %input.id, "{failure}");
                Attempt {
                    status: RecognitionStatus::Failed,
                    text: String::new(),
                    error: Some(failure.to_string()),
                    elapsed,
                }
            }
        }
    }

    /// Score a stream of samples, keeping up to `jobs` samples in flight.
    ///
    /// Outcomes come out in the same order samples went in. Errors in the
    /// input stream become [`SampleOutcome::Skipped`].
    pub fn score_stream(
        self: &Arc<Self>,
        samples: BoxedStream<Result<Sample, BenchError>>,
        jobs: usize,
    ) -> BoxedStream<SampleOutcome> {
        let this = self.clone();
        samples
            .map(move |sample| {
                let this = this.clone();
                async move {
                    match sample {
                        Ok(sample) => this.score_sample(sample).await,
                        Err(err) => {
                            warn!("Skipping sample: {err}");
                            SampleOutcome::Skipped(SkippedSample::from_error(&err))
                        }
                    }
                }
                .boxed()
            })
            .buffered(jobs.max(1))
            .boxed()
    }

    /// Release the recognizers. Fails if the benchmark is still shared.
    pub async fn shutdown(self: Arc<Self>) -> Result<()> {
        match Arc::try_unwrap(self) {
            Ok(benchmark) => benchmark.recognizers.shutdown().await,
            Err(_) => Err(anyhow!("cannot shut down a benchmark that is still in use")),
        }
    }

    /// Release the recognizers whether or not `result` succeeded.
    ///
    /// An error in `result` takes priority over a shutdown error, which is
    /// only logged in that case.
    pub async fn shutdown_after<T>(self: Arc<Self>, result: Result<T>) -> Result<T> {
        let shutdown = self.shutdown().await;
        match (result, shutdown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(shutdown_err)) => {
                error!("Shutdown also failed: {shutdown_err:?}");
                Err(err)
            }
        }
    }
}

/// Raw outcome of a recognizer call, before scoring.
struct Attempt {
    status: RecognitionStatus,
    text: String,
    error: Option<String>,
    elapsed: Duration,
}

/// Score an attempt against the reference.
fn score_attempt(
    reference: &str,
    recognizer: &str,
    attempt: Attempt,
) -> Result<RecognizerResult, BenchError> {
    let score = similarity(reference, &attempt.text)?;
    Ok(RecognizerResult {
        recognizer: recognizer.to_owned(),
        status: attempt.status,
        text: attempt.text,
        error: attempt.error,
        elapsed_ms: attempt.elapsed.as_secs_f64() * 1000.0,
        distance: score.distance,
        similarity: score.similarity,
    })
}

/// Receives scored samples as soon as they are ready, in sample order.
#[async_trait]
pub trait ReportSink: Send {
    /// Record one scored sample.
    async fn write_sample(&mut self, sample: &ComparisonSample) -> Result<()>;
}

/// Score every sample, passing each scored sample to `sink`, and build a
/// report.
///
/// Fails with [`BenchError::EmptyDataset`] if no sample could be scored, or
/// if the sink fails.
#[instrument(level = "debug", skip_all, fields(jobs = jobs))]
pub async fn run_benchmark(
    benchmark: &Arc<Benchmark>,
    samples: BoxedStream<Result<Sample, BenchError>>,
    jobs: usize,
    sink: &mut dyn ReportSink,
) -> Result<BenchmarkReport> {
    let mut outcomes = benchmark.score_stream(samples, jobs);
    let mut builder = ReportBuilder::new(benchmark.recognizer_names());
    while let Some(outcome) = outcomes.next().await {
        if let SampleOutcome::Scored(sample) = &outcome {
            sink.write_sample(sample).await?;
        }
        builder.add(outcome);
    }
    Ok(builder.finish()?)
}
