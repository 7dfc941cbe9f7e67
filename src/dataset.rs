//! Finding samples and their reference transcripts on disk.
//!
//! A dataset is a directory of images, optionally grouped into
//! subdirectories one level deep. Each image `name.ext` has its reference
//! transcript in `name.txt` beside it.

use std::fs;

use futures::StreamExt as _;

use crate::{
    async_utils::{BoxedStream, io::read_text},
    bench::Sample,
    errors::BenchError,
    prelude::*,
};

/// An image found in the dataset, before its reference has been read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetEntry {
    /// Path relative to the dataset root, using `/` separators.
    pub id: String,

    /// Path to the image.
    pub image_path: PathBuf,
}

impl DatasetEntry {
    /// Where the reference transcript should be.
    pub fn reference_path(&self) -> PathBuf {
        self.image_path.with_extension("txt")
    }

    /// Read the reference transcript, producing a [`Sample`].
    pub async fn load(self) -> Result<Sample, BenchError> {
        let reference_path = self.reference_path();
        match read_text(&reference_path).await {
            Ok(reference) => Ok(Sample {
                id: self.id,
                image_path: self.image_path,
                reference,
            }),
            Err(err) => Err(BenchError::MalformedSample {
                id: self.id,
                message: format!("{err:#}"),
            }),
        }
    }
}

/// Find every sample image under `root`.
///
/// Images directly in `root` come first, then the contents of each
/// subdirectory. Everything is sorted by path, so runs over the same dataset
/// always process samples in the same order.
#[instrument(level = "debug", skip_all, fields(root = %root.display()))]
pub fn find_samples(root: &Path) -> Result<Vec<DatasetEntry>> {
    if !root.is_dir() {
        return Err(anyhow!("dataset directory {:?} does not exist", root));
    }

    let (mut dirs, files) = list_dir(root)?;
    let mut entries = image_entries(root, files);
    dirs.sort();
    for dir in dirs {
        let (_, files) = list_dir(&dir)?;
        entries.extend(image_entries(root, files));
    }

    if entries.is_empty() {
        return Err(BenchError::EmptyDataset)
            .with_context(|| format!("no images found in {:?}", root));
    }
    debug!(count = entries.len(), "Found samples");
    Ok(entries)
}

/// Turn entries into a stream of samples, reading references lazily.
pub fn sample_stream(entries: Vec<DatasetEntry>) -> BoxedStream<Result<Sample, BenchError>> {
    futures::stream::iter(entries).then(DatasetEntry::load).boxed()
}

/// List the subdirectories and files of `dir`.
fn list_dir(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut dirs = vec![];
    let mut files = vec![];
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;
    for entry in read_dir {
        let entry = entry.with_context(|| format!("Failed to read directory {:?}", dir))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    Ok((dirs, files))
}

/// Keep the files that look like images, sorted by path.
fn image_entries(root: &Path, mut files: Vec<PathBuf>) -> Vec<DatasetEntry> {
    files.sort();
    files
        .into_iter()
        .filter(|path| {
            let keep = is_sample_image(path);
            if !keep {
                debug!(path = %path.display(), "Ignoring non-image file");
            }
            keep
        })
        .map(|image_path| DatasetEntry {
            id: sample_id(root, &image_path),
            image_path,
        })
        .collect()
}

/// Is this a file we should OCR? Transcripts are never samples.
fn is_sample_image(path: &Path) -> bool {
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if is_text {
        return false;
    }
    mime_guess::from_path(path).iter().any(|mime| {
        mime.type_() == mime_guess::mime::IMAGE || mime.essence_str() == "application/pdf"
    })
}

/// Build a stable, platform-independent ID for a sample.
fn sample_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn finds_images_in_root_and_subdirectories_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();
        touch(&root.join("z_root.png"), "");
        touch(&root.join("z_root.txt"), "ref");
        touch(&root.join("notes.md"), "");
        touch(&root.join("b/second.jpg"), "");
        touch(&root.join("b/second.txt"), "ref");
        touch(&root.join("a/first.tif"), "");
        touch(&root.join("a/first.txt"), "ref");
        touch(&root.join("a/first.vendor.txt"), "ocr output");
        touch(&root.join("a/doc.PDF"), "");
        touch(&root.join("a/nested/deep.png"), "");

        let ids = find_samples(root)?
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["z_root.png", "a/doc.PDF", "a/first.tif", "b/second.jpg"]);
        Ok(())
    }

    #[test]
    fn non_images_are_ignored() {
        assert!(is_sample_image(Path::new("page.png")));
        assert!(is_sample_image(Path::new("scan.PDF")));
        assert!(!is_sample_image(Path::new("page.txt")));
        assert!(!is_sample_image(Path::new("page.vendor.TXT")));
        assert!(!is_sample_image(Path::new("notes.md")));
        assert!(!is_sample_image(Path::new("no_extension")));

        let root = Path::new("/data");
        let files = vec![
            root.join("b.png"),
            root.join("notes.md"),
            root.join("a.jpg"),
            root.join("a.txt"),
        ];
        let ids = image_entries(root, files)
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn missing_or_empty_dataset_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(find_samples(&dir.path().join("nope")).is_err());

        touch(&dir.path().join("readme.txt"), "");
        let err = find_samples(dir.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BenchError>(),
            Some(&BenchError::EmptyDataset)
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_reference_is_a_malformed_sample() -> Result<()> {
        let dir = tempfile::tempdir()?;
        touch(&dir.path().join("good.png"), "");
        touch(&dir.path().join("good.txt"), "reference");
        touch(&dir.path().join("orphan.png"), "");

        let samples = sample_stream(find_samples(dir.path())?)
            .collect::<Vec<_>>()
            .await;
        let good = samples[0].as_ref().unwrap();
        assert_eq!(good.id, "good.png");
        assert_eq!(good.reference, "reference");
        assert!(matches!(
            &samples[1],
            Err(BenchError::MalformedSample { id, .. }) if id == "orphan.png"
        ));
        Ok(())
    }
}
