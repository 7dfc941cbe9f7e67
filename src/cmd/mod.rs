//! Command-line entry points.

use clap::Args;

use crate::prelude::*;

pub mod run;
pub mod schema;
pub mod score;

/// Common options for subcommands that process a stream of samples.
#[derive(Debug, Clone, Args)]
pub struct StreamOpts {
    /// Limit processing to the first N samples.
    #[clap(long)]
    take_first: Option<usize>,

    /// Max number of samples to process at a time. Calls to a single
    /// recognizer are still serialized unless it supports concurrent calls.
    #[clap(short = 'j', long = "jobs", default_value = "1")]
    pub job_count: usize,

    /// What portion of recognizer calls should we allow to fail? Specified as
    /// a number between 0.0 and 1.0.
    #[clap(long, default_value = "1.0")]
    allowed_failure_rate: f64,
}

impl StreamOpts {
    /// Apply `--take-first` to our input.
    pub fn apply_take_first<T>(&self, mut input: Vec<T>) -> Vec<T> {
        if let Some(take_first) = self.take_first {
            input.truncate(take_first);
        }
        input
    }

    /// Fail if too many recognizer calls failed.
    pub fn check_failure_rate(&self, failure_rate: f64) -> Result<()> {
        if failure_rate > self.allowed_failure_rate {
            Err(anyhow!(
                "{:.2}% of recognizer calls failed, but only {:.2}% were allowed",
                failure_rate * 100.0,
                self.allowed_failure_rate * 100.0
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(take_first: Option<usize>, allowed_failure_rate: f64) -> StreamOpts {
        StreamOpts {
            take_first,
            job_count: 1,
            allowed_failure_rate,
        }
    }

    #[test]
    fn take_first_truncates() {
        assert_eq!(opts(Some(2), 1.0).apply_take_first(vec![1, 2, 3]), vec![1, 2]);
        assert_eq!(opts(None, 1.0).apply_take_first(vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn failure_rate_is_checked() {
        assert!(opts(None, 0.1).check_failure_rate(0.05).is_ok());
        assert!(opts(None, 0.1).check_failure_rate(0.5).is_err());
        assert!(opts(None, 1.0).check_failure_rate(1.0).is_ok());
    }
}
