//! A recognizer that post-processes another recognizer's output, for example
//! with a spell checker or a language model.
//!
//! The post-processor never looks at the image. It gets the text its base
//! recognizer produced for the same sample in [`RecognizerInput::base_text`],
//! so its time covers only the post-processing step.

use std::process::Stdio;

use tokio::{io::AsyncWriteExt as _, process::Command};

use super::{Recognition, Recognizer, RecognizerInput, expand_template};
use crate::{async_utils::check_for_command_failure, prelude::*};

/// Feeds a base recognizer's text to a command on standard input.
pub struct PostProcessRecognizer {
    /// The name shown in reports.
    name: String,

    /// Program followed by argument templates.
    template: Vec<String>,

    /// Is the post-processor safe to run several times at once?
    concurrent: bool,
}

impl PostProcessRecognizer {
    /// Create a new post-processing recognizer.
    pub fn new(name: String, template: Vec<String>, concurrent: bool) -> Result<Self> {
        if template.first().is_none_or(|program| program.is_empty()) {
            return Err(anyhow!("recognizer {:?} has an empty command", name));
        }
        Ok(Self {
            name,
            template,
            concurrent,
        })
    }

    /// Pipe `text` through the post-processing command.
    async fn post_process(&self, input: &RecognizerInput, text: &str) -> Result<String> {
        let program = &self.template[0];
        let args = self.template[1..]
            .iter()
            .map(|arg| expand_template(arg, input))
            .collect::<Vec<_>>();

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("cannot run {}", program))?;

        // Write and close stdin before waiting, or the child may never exit.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("cannot open stdin of {}", program))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .with_context(|| format!("cannot write to {}", program))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("cannot wait for {}", program))?;
        check_for_command_failure(program, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

#[async_trait]
impl Recognizer for PostProcessRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(recognizer = %self.name, id = %input.id))]
    async fn recognize(&self, input: &RecognizerInput) -> Result<Recognition> {
        let base_text = input
            .base_text
            .as_deref()
            .ok_or_else(|| anyhow!("no base recognizer output to post-process"))?;
        let text = self.post_process(input, base_text).await?;
        Ok(Recognition::from_text(text))
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}
