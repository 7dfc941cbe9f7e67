//! Recognizers that run an external OCR command.

use tokio::process::Command;

use super::{Recognition, Recognizer, RecognizerInput, expand_template};
use crate::{async_utils::check_for_command_failure, prelude::*};

/// OCR engine wrapping a command-line tool that prints recognized text to
/// standard output.
pub struct CommandRecognizer {
    /// The name shown in reports.
    name: String,

    /// Program followed by argument templates.
    template: Vec<String>,

    /// If set, `<flag> <language>` is appended whenever a language is known.
    language_flag: Option<&'static str>,

    /// Is the tool safe to run several times at once?
    concurrent: bool,
}

impl CommandRecognizer {
    /// Create a recognizer from a command template.
    pub fn new(name: String, template: Vec<String>, concurrent: bool) -> Result<Self> {
        if template.first().is_none_or(|program| program.is_empty()) {
            return Err(anyhow!("recognizer {:?} has an empty command", name));
        }
        Ok(Self {
            name,
            template,
            language_flag: None,
            concurrent,
        })
    }

    /// Create a recognizer running the `tesseract` CLI.
    pub fn tesseract(name: String, extra_args: &[String], concurrent: bool) -> Self {
        let mut template = vec![
            "tesseract".to_owned(),
            "{image}".to_owned(),
            "stdout".to_owned(),
        ];
        template.extend(extra_args.iter().cloned());
        Self {
            name,
            template,
            language_flag: Some("-l"),
            concurrent,
        }
    }

    /// Build the argument list for a single input.
    fn args_for(&self, input: &RecognizerInput) -> Vec<String> {
        let mut args = self.template[1..]
            .iter()
            .map(|arg| expand_template(arg, input))
            .collect::<Vec<_>>();
        if let (Some(flag), Some(language)) = (self.language_flag, &input.language) {
            args.push(flag.to_owned());
            args.push(language.clone());
        }
        args
    }
}

#[async_trait]
impl Recognizer for CommandRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(recognizer = %self.name, id = %input.id))]
    async fn recognize(&self, input: &RecognizerInput) -> Result<Recognition> {
        let program = &self.template[0];
        let args = self.args_for(input);
        trace!(program = %program, args = ?args, "Running OCR command");

        let output = Command::new(program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("cannot run {}", program))?;
        check_for_command_failure(program, &output)?;

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(Recognition::from_text(text.trim()))
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}
