//! A "recognizer" that reads transcripts produced ahead of time.
//!
//! Commercial engines often only run on one machine, or only through a
//! vendor GUI. Their output can be saved next to each image as
//! `<image stem>.<suffix>.txt` and scored here like any other engine.

use super::{Recognition, Recognizer, RecognizerInput};
use crate::{async_utils::io::read_text, prelude::*};

/// Recognizer backed by pre-recorded transcripts.
pub struct SidecarRecognizer {
    /// The name shown in reports.
    name: String,

    /// Identifies this recognizer's files.
    suffix: String,

    /// Reading files concurrently is normally fine.
    concurrent: bool,
}

impl SidecarRecognizer {
    /// Create a new sidecar recognizer.
    pub fn new(name: String, suffix: String, concurrent: bool) -> Self {
        Self {
            name,
            suffix,
            concurrent,
        }
    }

    /// Where the transcript for `image_path` lives.
    pub fn transcript_path(&self, image_path: &Path) -> PathBuf {
        let stem = image_path.file_stem().unwrap_or_default().to_string_lossy();
        image_path.with_file_name(format!("{}.{}.txt", stem, self.suffix))
    }
}

#[async_trait]
impl Recognizer for SidecarRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip_all, fields(recognizer = %self.name, id = %input.id))]
    async fn recognize(&self, input: &RecognizerInput) -> Result<Recognition> {
        let path = self.transcript_path(&input.image_path);
        let text = read_text(&path).await?;
        Ok(Recognition::from_text(text.trim()))
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}
