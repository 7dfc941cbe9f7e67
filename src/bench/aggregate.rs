//! Per-recognizer running totals and the final report.

use schemars::JsonSchema;

use super::{ComparisonSample, RecognitionStatus, RecognizerResult, SampleOutcome, SkippedSample};
use crate::{errors::BenchError, prelude::*};

/// Running totals for one recognizer over one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunAggregate {
    /// Sum of elapsed times, in milliseconds.
    pub total_time_ms: f64,

    /// Sum of similarity scores.
    pub total_score: f64,

    /// How many samples were scored.
    pub sample_count: usize,

    /// How many of those the recognizer failed on.
    pub failure_count: usize,

    /// How many of those were in an unsupported language.
    pub unsupported_count: usize,
}

impl RunAggregate {
    /// Add one result to the totals.
    pub fn add(&mut self, result: &RecognizerResult) {
        self.total_time_ms += result.elapsed_ms;
        self.total_score += result.similarity;
        self.sample_count += 1;
        match result.status {
            RecognitionStatus::Ok => {}
            RecognitionStatus::Unsupported => self.unsupported_count += 1,
            RecognitionStatus::Failed => self.failure_count += 1,
        }
    }

    /// Compute averages.
    pub fn finish(&self, recognizer: &str) -> Result<RecognizerSummary, BenchError> {
        if self.sample_count == 0 {
            return Err(BenchError::EmptyDataset);
        }
        let count = self.sample_count as f64;
        Ok(RecognizerSummary {
            recognizer: recognizer.to_owned(),
            average_time_ms: self.total_time_ms / count,
            average_score: self.total_score / count,
            sample_count: self.sample_count,
            failure_count: self.failure_count,
            unsupported_count: self.unsupported_count,
        })
    }
}

/// Averages for one recognizer.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct RecognizerSummary {
    /// The recognizer's name.
    pub recognizer: String,

    /// Mean recognition time, in milliseconds.
    pub average_time_ms: f64,

    /// Mean similarity, as a percentage.
    pub average_score: f64,

    /// Samples scored. The same for every recognizer in a run.
    pub sample_count: usize,

    /// Samples the recognizer failed on.
    pub failure_count: usize,

    /// Samples in a language the recognizer doesn't support.
    pub unsupported_count: usize,
}

/// Everything we learned from a benchmark run.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct BenchmarkReport {
    /// Scored samples, in the order they were processed.
    pub samples: Vec<ComparisonSample>,

    /// One summary per recognizer, in report order.
    pub summaries: Vec<RecognizerSummary>,

    /// How many samples were scored.
    pub sample_count: usize,

    /// Samples which could not be scored.
    pub skipped: Vec<SkippedSample>,
}

impl BenchmarkReport {
    /// What share of recognizer calls failed? Unsupported languages don't
    /// count as failures.
    pub fn failure_rate(&self) -> f64 {
        let calls = self.sample_count * self.summaries.len();
        if calls == 0 {
            return 0.0;
        }
        let failures = self.summaries.iter().map(|s| s.failure_count).sum::<usize>();
        failures as f64 / calls as f64
    }
}

/// Accumulates sample outcomes into a [`BenchmarkReport`].
///
/// Outcomes should be added from a single task, in output order.
pub struct ReportBuilder {
    names: Vec<String>,
    aggregates: Vec<RunAggregate>,
    samples: Vec<ComparisonSample>,
    skipped: Vec<SkippedSample>,
}

impl ReportBuilder {
    /// Create a builder for the named recognizers.
    pub fn new(names: Vec<String>) -> Self {
        let aggregates = vec![RunAggregate::default(); names.len()];
        Self {
            names,
            aggregates,
            samples: vec![],
            skipped: vec![],
        }
    }

    /// Record the outcome of one sample.
    pub fn add(&mut self, outcome: SampleOutcome) {
        match outcome {
            SampleOutcome::Scored(sample) => self.add_scored(sample),
            SampleOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }

    /// Record a scored sample.
    fn add_scored(&mut self, sample: ComparisonSample) {
        debug_assert_eq!(sample.results.len(), self.aggregates.len());
        for (aggregate, result) in self.aggregates.iter_mut().zip(&sample.results) {
            aggregate.add(result);
        }
        self.samples.push(sample);
    }

    /// Compute the final averages and build the report.
    pub fn finish(self) -> Result<BenchmarkReport, BenchError> {
        let summaries = self
            .names
            .iter()
            .zip(&self.aggregates)
            .map(|(name, aggregate)| aggregate.finish(name))
            .collect::<Result<Vec<_>, _>>()?;
        if self.samples.is_empty() {
            return Err(BenchError::EmptyDataset);
        }
        Ok(BenchmarkReport {
            sample_count: self.samples.len(),
            samples: self.samples,
            summaries,
            skipped: self.skipped,
        })
    }
}
