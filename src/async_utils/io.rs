//! I/O utilities.
//!
//! Output may go to a file or to standard output. Both are exposed as a
//! boxed [`AsyncWrite`] so that report writers don't need to care.

use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt as _},
};

use crate::prelude::*;

/// A boxed async writer.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>;

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(path: Option<&Path>) -> Result<BoxedWriter> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Read a UTF-8 text file.
pub async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at path: {:?}", path))
}

/// Write a value as pretty-printed JSON to a file or stdout.
pub async fn write_json_pretty<T>(path: Option<&Path>, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let mut wtr = create_writer(path).await?;
    let json =
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    wtr.write_all(json.as_bytes())
        .await
        .context("Failed to write JSON to output")?;
    wtr.write_all(b"\n")
        .await
        .context("Failed to write newline to output")?;
    wtr.flush().await.context("Failed to flush output")?;
    Ok(())
}
