//! Asynchronous utilities for use with Tokio.

use std::{pin::Pin, process::Output};

use futures::Stream;

use crate::prelude::*;

pub mod io;

/// A type alias for a boxed stream. This is used to make it easier to work
/// streams that return complex types.
pub type BoxedStream<Item> = Pin<Box<dyn Stream<Item = Item> + Send>>;

/// Report any command failures, and include any error output.
///
/// Standard output and standard error are logged at appropriate levels.
pub fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    trace!(
        command_name = command_name,
        output = %String::from_utf8_lossy(&output.stdout),
        "Standard output from command"
    );

    if output.status.success() {
        if !stderr.trim().is_empty() {
            debug!(
                command_name = command_name,
                output = %stderr,
                "Standard error from command",
            );
        }
        Ok(())
    } else {
        error!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
        if let Some(exit_code) = output.status.code() {
            Err(anyhow!(
                "{} failed with exit code {} and error output:\n{}",
                command_name,
                exit_code,
                stderr,
            ))
        } else {
            Err(anyhow!(
                "{} failed with error output:\n{}",
                command_name,
                stderr,
            ))
        }
    }
}
