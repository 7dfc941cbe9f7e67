//! Benchmark configuration files.
//!
//! A configuration file lists the recognizers to compare, in the order their
//! columns should appear in the report. See `demos/bench.toml` for an
//! example.

use std::collections::HashSet;

use toml_span::{DeserError, Spanned, de_helpers::TableHelper};

use crate::{
    async_utils::io::read_text,
    prelude::*,
    toml_utils::{custom_deser_error, parse_toml},
};

/// A complete benchmark configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchConfig {
    /// Default recognition language, passed to recognizers that don't set
    /// their own.
    pub language: Option<String>,

    /// The recognizers to compare.
    pub recognizers: Vec<RecognizerConfig>,
}

impl BenchConfig {
    /// Load and validate a configuration file.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn from_path(path: &Path) -> Result<Self> {
        let toml_str = read_text(path).await?;
        Self::from_toml(&toml_str, &path.display().to_string())
    }

    /// Parse and validate a configuration from a string.
    pub fn from_toml(toml_str: &str, description: &str) -> Result<Self> {
        let config = parse_toml::<Self>(toml_str, description)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", description))?;
        Ok(config)
    }

    /// Check constraints that the parser can't express.
    fn validate(&self) -> Result<()> {
        if self.recognizers.is_empty() {
            return Err(anyhow!("at least one recognizer must be configured"));
        }
        let mut seen = HashSet::new();
        for recognizer in &self.recognizers {
            // A post-processor's base must already have run for the sample.
            if let RecognizerKind::PostProcess { base, .. } = &recognizer.kind {
                if !seen.contains(base.as_str()) {
                    return Err(anyhow!(
                        "recognizer {:?} post-processes {:?}, which must be listed before it",
                        recognizer.name,
                        base
                    ));
                }
            }
            if !seen.insert(recognizer.name.as_str()) {
                return Err(anyhow!("duplicate recognizer name {:?}", recognizer.name));
            }
            recognizer.validate()?;
        }
        Ok(())
    }
}

impl<'de> toml_span::Deserialize<'de> for BenchConfig {
    fn deserialize(value: &mut toml_span::Value<'de>) -> Result<Self, DeserError> {
        let mut th = TableHelper::new(value)?;
        let language = th.optional("language");
        let recognizers = th.required("recognizers")?;
        th.finalize(None)?;
        Ok(Self {
            language,
            recognizers,
        })
    }
}

/// Configuration for a single recognizer.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizerConfig {
    /// The name used in reports. Defaults to the kind.
    pub name: String,

    /// Language to request from this recognizer, overriding the default.
    pub language: Option<String>,

    /// Languages this recognizer can't handle. Samples in these languages
    /// get the `not supported` sentinel instead of a recognizer call.
    pub unsupported_languages: Vec<String>,

    /// May this recognizer be called for several samples at once?
    pub concurrent: bool,

    /// What kind of recognizer this is.
    pub kind: RecognizerKind,
}

impl RecognizerConfig {
    fn validate(&self) -> Result<()> {
        match &self.kind {
            RecognizerKind::Command { command } => validate_command(&self.name, command),
            RecognizerKind::Tesseract { .. } => Ok(()),
            RecognizerKind::Sidecar { suffix } => {
                if suffix.is_empty() {
                    Err(anyhow!("recognizer {:?} has an empty suffix", self.name))
                } else {
                    Ok(())
                }
            }
            RecognizerKind::PostProcess { command, .. } => {
                validate_command(&self.name, command)
            }
        }
    }
}

fn validate_command(name: &str, command: &[String]) -> Result<()> {
    if command.is_empty() || command[0].is_empty() {
        Err(anyhow!("recognizer {:?} has an empty command", name))
    } else {
        Ok(())
    }
}

/// The supported recognizer kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum RecognizerKind {
    /// Run an arbitrary command and read the text from its standard output.
    Command {
        /// Program and arguments. `{image}` and `{language}` are substituted.
        command: Vec<String>,
    },

    /// Run the `tesseract` CLI.
    Tesseract {
        /// Extra arguments appended to the `tesseract` command line.
        extra_args: Vec<String>,
    },

    /// Read text produced earlier from `<image stem>.<suffix>.txt`.
    Sidecar {
        /// File name suffix identifying this recognizer's transcripts.
        suffix: String,
    },

    /// Pipe the text another recognizer produced for the same sample through
    /// `command`.
    PostProcess {
        /// Program and arguments for the post-processor.
        command: Vec<String>,
        /// Name of an earlier recognizer whose output gets post-processed.
        base: String,
    },
}

impl RecognizerKind {
    /// The name used for this kind in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerKind::Command { .. } => "command",
            RecognizerKind::Tesseract { .. } => "tesseract",
            RecognizerKind::Sidecar { .. } => "sidecar",
            RecognizerKind::PostProcess { .. } => "post_process",
        }
    }
}

impl<'de> toml_span::Deserialize<'de> for RecognizerConfig {
    fn deserialize(value: &mut toml_span::Value<'de>) -> Result<Self, DeserError> {
        let mut th = TableHelper::new(value)?;
        let name: Option<String> = th.optional("name");
        let language = th.optional("language");
        let unsupported_languages = th.optional("unsupported_languages").unwrap_or_default();
        let concurrent: Option<bool> = th.optional("concurrent");
        let kind_name: Spanned<String> = th.required("kind")?;

        let kind = match kind_name.value.as_str() {
            "command" => RecognizerKind::Command {
                command: th.required("command")?,
            },
            "tesseract" => RecognizerKind::Tesseract {
                extra_args: th.optional("extra_args").unwrap_or_default(),
            },
            "sidecar" => {
                let suffix: Option<String> = th.optional("suffix");
                RecognizerKind::Sidecar {
                    suffix: suffix
                        .or_else(|| name.clone())
                        .unwrap_or_else(|| "sidecar".to_owned()),
                }
            }
            "post_process" => RecognizerKind::PostProcess {
                command: th.required("command")?,
                base: th.required("base")?,
            },
            other => {
                return Err(custom_deser_error(
                    kind_name.span,
                    format!(
                        "unknown recognizer kind {other:?}, expected one of: command, tesseract, sidecar, post_process"
                    ),
                ));
            }
        };
        th.finalize(None)?;

        // Pre-recorded transcripts are just files, so reading them
        // concurrently is always fine.
        let concurrent =
            concurrent.unwrap_or(matches!(kind, RecognizerKind::Sidecar { .. }));
        Ok(Self {
            name: name.unwrap_or_else(|| kind.as_str().to_owned()),
            language,
            unsupported_languages,
            concurrent,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<BenchConfig> {
        BenchConfig::from_toml(toml_str, "test config")
    }

    #[test]
    fn parses_all_recognizer_kinds() {
        let config = parse(
            r#"
            language = "en"

            [[recognizers]]
            name = "tess"
            kind = "tesseract"
            language = "eng"
            unsupported_languages = ["hin"]
            extra_args = ["--psm", "6"]

            [[recognizers]]
            name = "vendor-a"
            kind = "sidecar"

            [[recognizers]]
            name = "custom"
            kind = "command"
            command = ["my-ocr", "{image}"]
            concurrent = true

            [[recognizers]]
            name = "tess-fixed"
            kind = "post_process"
            command = ["spellfix", "--lang", "{language}"]
            base = "tess"
            "#,
        )
        .unwrap();

        assert_eq!(config.language.as_deref(), Some("en"));
        assert_eq!(config.recognizers.len(), 4);

        let tess = &config.recognizers[0];
        assert_eq!(tess.name, "tess");
        assert_eq!(tess.language.as_deref(), Some("eng"));
        assert_eq!(tess.unsupported_languages, vec!["hin".to_owned()]);
        assert!(!tess.concurrent);
        assert_eq!(
            tess.kind,
            RecognizerKind::Tesseract {
                extra_args: vec!["--psm".to_owned(), "6".to_owned()]
            }
        );

        let sidecar = &config.recognizers[1];
        assert!(sidecar.concurrent);
        assert_eq!(
            sidecar.kind,
            RecognizerKind::Sidecar {
                suffix: "vendor-a".to_owned()
            }
        );

        assert!(config.recognizers[2].concurrent);

        let RecognizerKind::PostProcess { command, base } = &config.recognizers[3].kind
        else {
            panic!("expected post_process recognizer");
        };
        assert_eq!(command[0], "spellfix");
        assert_eq!(base, "tess");
        assert!(!config.recognizers[3].concurrent);
    }

    #[test]
    fn post_process_base_must_be_listed_earlier() {
        let err = parse(
            r#"
            [[recognizers]]
            name = "fixed"
            kind = "post_process"
            command = ["spellfix"]
            base = "tess"

            [[recognizers]]
            name = "tess"
            kind = "tesseract"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must be listed before it"));

        let err = parse(
            r#"
            [[recognizers]]
            name = "fixed"
            kind = "post_process"
            command = ["spellfix"]
            base = "fixed"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must be listed before it"));
    }

    #[test]
    fn post_process_base_is_a_name_not_a_table() {
        // Language settings only apply to recognizers that have their own
        // slot, so a nested recognizer table is not accepted.
        assert!(
            parse(
                r#"
                [[recognizers]]
                name = "tess"
                kind = "tesseract"

                [[recognizers]]
                name = "fixed"
                kind = "post_process"
                command = ["spellfix"]

                [recognizers.base]
                kind = "tesseract"
                language = "hin"
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = parse(
            r#"
            [[recognizers]]
            kind = "magic"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("unknown recognizer kind"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(
            parse(
                r#"
                [[recognizers]]
                kind = "tesseract"
                colour = "blue"
                "#,
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = parse(
            r#"
            [[recognizers]]
            kind = "tesseract"

            [[recognizers]]
            kind = "tesseract"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("duplicate recognizer name"));
    }

    #[test]
    fn rejects_empty_recognizer_list_and_empty_commands() {
        assert!(parse("recognizers = []").is_err());
        assert!(
            parse(
                r#"
                [[recognizers]]
                kind = "command"
                command = []
                "#,
            )
            .is_err()
        );
    }
}
