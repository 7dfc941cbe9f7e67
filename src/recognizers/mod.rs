//! OCR engine interface.
//!
//! Every engine we benchmark sits behind [`Recognizer`]. The benchmark core
//! never sees an engine's own API: it hands over an image path and a
//! language, and gets text back.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{
    config::{BenchConfig, RecognizerConfig, RecognizerKind},
    prelude::*,
};

pub mod command;
pub mod post_process;
pub mod sidecar;

/// Text reported when a recognizer does not support the requested language.
pub const UNSUPPORTED_SENTINEL: &str = "not supported";

/// Input passed to a recognizer for a single sample.
#[derive(Clone, Debug)]
pub struct RecognizerInput {
    /// The sample ID, for logging.
    pub id: String,

    /// The image to recognize.
    pub image_path: PathBuf,

    /// The recognition language, if one was configured.
    pub language: Option<String>,

    /// For post-processors, the text the base recognizer produced for this
    /// sample.
    pub base_text: Option<String>,
}

/// What a recognizer returns for a sample.
#[derive(Clone, Debug, Default)]
pub struct Recognition {
    /// The recognized text.
    pub text: String,

    /// How long recognition took, if the recognizer measured it itself. When
    /// this is `None`, the wall-clock time of the call is used.
    pub elapsed: Option<Duration>,
}

impl Recognition {
    /// Build a recognition result with no self-reported timing.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            elapsed: None,
        }
    }
}

/// Interface to an OCR engine.
#[async_trait]
pub trait Recognizer: Send + Sync + 'static {
    /// The name shown in reports.
    fn name(&self) -> &str;

    /// Recognize the text in a single image.
    async fn recognize(&self, input: &RecognizerInput) -> Result<Recognition>;

    /// Can this recognizer safely handle several calls at once? Most OCR
    /// engine instances can't, so the default is `false`.
    fn supports_concurrent_calls(&self) -> bool {
        false
    }

    /// Release any resources held by the engine.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A recognizer and the per-run settings that go with it.
pub struct RecognizerSlot {
    /// The engine.
    recognizer: Arc<dyn Recognizer>,

    /// The language to request.
    language: Option<String>,

    /// Languages which get [`UNSUPPORTED_SENTINEL`] without calling the engine.
    unsupported_languages: Vec<String>,

    /// Index of the earlier slot whose output this one post-processes.
    base: Option<usize>,

    /// Held during calls to engines that can't handle concurrent calls.
    call_lock: Mutex<()>,
}

impl RecognizerSlot {
    /// Wrap a recognizer.
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        language: Option<String>,
        unsupported_languages: Vec<String>,
    ) -> Self {
        Self {
            recognizer,
            language,
            unsupported_languages,
            base: None,
            call_lock: Mutex::new(()),
        }
    }

    /// Post-process the output of the slot at `index`, which must come
    /// earlier in the same [`RecognizerSet`].
    pub fn with_base(mut self, index: usize) -> Self {
        self.base = Some(index);
        self
    }

    /// Index of the slot this one post-processes, if any.
    pub fn base(&self) -> Option<usize> {
        self.base
    }

    /// The recognizer's report name.
    pub fn name(&self) -> &str {
        self.recognizer.name()
    }

    /// The language this recognizer is asked to use.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Has this recognizer declared the language unsupported?
    pub fn is_unsupported(&self) -> bool {
        self.language
            .as_ref()
            .is_some_and(|lang| self.unsupported_languages.contains(lang))
    }

    /// Call the recognizer, serializing calls if it needs that.
    ///
    /// Returns the time spent in the call alongside the result. Time spent
    /// waiting for another call to finish is not included. If the recognizer
    /// reported its own elapsed time, that wins.
    pub async fn recognize(
        &self,
        input: &RecognizerInput,
        timeout: Option<Duration>,
    ) -> (Duration, Result<Recognition>) {
        let _guard = if self.recognizer.supports_concurrent_calls() {
            None
        } else {
            Some(self.call_lock.lock().await)
        };

        let start = Instant::now();
        let call = self.recognizer.recognize(input);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("timed out after {:?}", limit)),
            },
            None => call.await,
        };
        let measured = start.elapsed();
        match result {
            Ok(recognition) => (recognition.elapsed.unwrap_or(measured), Ok(recognition)),
            Err(err) => (measured, Err(err)),
        }
    }
}

/// The recognizers owned by one benchmark run.
///
/// Build one with [`RecognizerSet::from_config`], and call
/// [`RecognizerSet::shutdown`] when the run is over.
pub struct RecognizerSet {
    slots: Vec<RecognizerSlot>,
}

impl RecognizerSet {
    /// Create a set from already-built slots.
    ///
    /// Fails if a slot post-processes a slot which doesn't come before it.
    pub fn new(slots: Vec<RecognizerSlot>) -> Result<Self> {
        for (index, slot) in slots.iter().enumerate() {
            if slot.base.is_some_and(|base| base >= index) {
                return Err(anyhow!(
                    "recognizer {:?} must come after the recognizer it post-processes",
                    slot.name()
                ));
            }
        }
        Ok(Self { slots })
    }

    /// Build every recognizer named in a configuration.
    ///
    /// `language_override` replaces the configuration's default language.
    #[instrument(level = "debug", skip_all)]
    pub fn from_config(config: &BenchConfig, language_override: Option<&str>) -> Result<Self> {
        let default_language = language_override
            .map(str::to_owned)
            .or_else(|| config.language.clone());
        let slots = config
            .recognizers
            .iter()
            .enumerate()
            .map(|(index, recognizer_config)| {
                let recognizer = build_recognizer(recognizer_config)?;
                let language = recognizer_config
                    .language
                    .clone()
                    .or_else(|| default_language.clone());
                debug!(
                    name = recognizer.name(),
                    kind = recognizer_config.kind.as_str(),
                    language = ?language,
                    "Created recognizer"
                );
                let slot = RecognizerSlot::new(
                    recognizer,
                    language,
                    recognizer_config.unsupported_languages.clone(),
                );
                match &recognizer_config.kind {
                    RecognizerKind::PostProcess { base, .. } => {
                        let base_index = config.recognizers[..index]
                            .iter()
                            .position(|earlier| earlier.name == *base)
                            .ok_or_else(|| {
                                anyhow!(
                                    "recognizer {:?} post-processes unknown recognizer {:?}",
                                    recognizer_config.name,
                                    base
                                )
                            })?;
                        Ok(slot.with_base(base_index))
                    }
                    _ => Ok(slot),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(slots)
    }

    /// Our recognizers, in report order.
    pub fn slots(&self) -> &[RecognizerSlot] {
        &self.slots
    }

    /// The names of our recognizers, in report order.
    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.name().to_owned()).collect()
    }

    /// Release all engines. Every engine is shut down even if one fails.
    #[instrument(level = "debug", skip_all)]
    pub async fn shutdown(self) -> Result<()> {
        let mut first_error = None;
        for slot in self.slots {
            if let Err(err) = slot.recognizer.shutdown().await {
                error!(name = slot.name(), "Failed to shut down recognizer: {err:?}");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Construct the recognizer described by `config`.
pub fn build_recognizer(config: &RecognizerConfig) -> Result<Arc<dyn Recognizer>> {
    let name = config.name.clone();
    let recognizer: Arc<dyn Recognizer> = match &config.kind {
        RecognizerKind::Command { command } => Arc::new(command::CommandRecognizer::new(
            name,
            command.clone(),
            config.concurrent,
        )?),
        RecognizerKind::Tesseract { extra_args } => Arc::new(
            command::CommandRecognizer::tesseract(name, extra_args, config.concurrent),
        ),
        RecognizerKind::Sidecar { suffix } => Arc::new(sidecar::SidecarRecognizer::new(
            name,
            suffix.clone(),
            config.concurrent,
        )),
        RecognizerKind::PostProcess { command, .. } => {
            Arc::new(post_process::PostProcessRecognizer::new(
                name,
                command.clone(),
                config.concurrent,
            )?)
        }
    };
    Ok(recognizer)
}

/// Substitute `{image}` and `{language}` in a command template.
pub(crate) fn expand_template(arg: &str, input: &RecognizerInput) -> String {
    arg.replace("{image}", &input.image_path.to_string_lossy())
        .replace("{language}", input.language.as_deref().unwrap_or(""))
}
