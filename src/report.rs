//! Writing benchmark results.
//!
//! The CSV layout follows the spreadsheet people were already used to: one
//! row per image with the reference text, then text, time and score for each
//! recognizer, followed by an `AVG` row and an `images amount` row.

use csv_async::{AsyncWriter, AsyncWriterBuilder};

use crate::{
    async_utils::io::{BoxedWriter, create_writer},
    bench::{ComparisonSample, RecognizerSummary, ReportSink},
    prelude::*,
};

/// Label for the row of averages.
pub const AVERAGE_LABEL: &str = "AVG";

/// Label for the row holding the scored sample count.
pub const COUNT_LABEL: &str = "images amount";

/// Writes CSV rows as samples are scored.
pub struct CsvReportWriter {
    wtr: AsyncWriter<BoxedWriter>,
    include_texts: bool,
    width: usize,
}

impl CsvReportWriter {
    /// Create a writer and write the header row.
    ///
    /// If `include_texts` is false, the reference and recognized text columns
    /// are left empty.
    pub async fn create(
        path: Option<&Path>,
        recognizer_names: &[String],
        include_texts: bool,
    ) -> Result<Self> {
        let wtr = AsyncWriterBuilder::new().create_writer(create_writer(path).await?);
        let mut header = vec!["image".to_owned(), "reference".to_owned()];
        for name in recognizer_names {
            header.push(format!("{name} text"));
            header.push(format!("{name} time_ms"));
            header.push(format!("{name} score"));
        }
        let mut writer = Self {
            wtr,
            include_texts,
            width: header.len(),
        };
        writer.write_row(header).await?;
        Ok(writer)
    }

    /// Write the trailing summary rows.
    pub async fn write_summary(
        &mut self,
        summaries: &[RecognizerSummary],
        sample_count: usize,
    ) -> Result<()> {
        let mut row = vec![AVERAGE_LABEL.to_owned(), String::new()];
        for summary in summaries {
            row.push(AVERAGE_LABEL.to_owned());
            row.push(format_number(summary.average_time_ms));
            row.push(format_number(summary.average_score));
        }
        self.write_row(row).await?;
        self.write_row(vec![COUNT_LABEL.to_owned(), sample_count.to_string()])
            .await
    }

    /// Flush all output.
    pub async fn finish(mut self) -> Result<()> {
        self.wtr.flush().await.context("Failed to flush CSV output")
    }

    /// Text for a CSV cell: trimmed, or blank if we've been asked to leave
    /// texts out.
    fn text(&self, text: &str) -> String {
        if self.include_texts {
            text.trim().to_owned()
        } else {
            String::new()
        }
    }

    /// Write a row, padding it so every row has the same number of columns.
    async fn write_row(&mut self, mut row: Vec<String>) -> Result<()> {
        row.resize(self.width.max(row.len()), String::new());
        self.wtr
            .write_record(&row)
            .await
            .context("Failed to write CSV row")
    }
}

#[async_trait]
impl ReportSink for CsvReportWriter {
    async fn write_sample(&mut self, sample: &ComparisonSample) -> Result<()> {
        let mut row = vec![sample.id.clone(), self.text(&sample.reference)];
        for result in &sample.results {
            row.push(self.text(&result.text));
            row.push(format_number(result.elapsed_ms));
            row.push(format_number(result.similarity));
        }
        self.write_row(row).await
    }
}

/// Format a number for the CSV report.
fn format_number(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{RecognitionStatus, RecognizerResult};

    fn scored_sample() -> ComparisonSample {
        ComparisonSample {
            id: "dir/page.png".to_owned(),
            reference: "hello\n".to_owned(),
            results: vec![RecognizerResult {
                recognizer: "tess".to_owned(),
                status: RecognitionStatus::Ok,
                text: "hallo".to_owned(),
                error: None,
                elapsed_ms: 12.5,
                distance: 1,
                similarity: 80.0,
            }],
        }
    }

    async fn write_report(include_texts: bool) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.csv");
        let mut wtr = CsvReportWriter::create(Some(&path), &["tess".to_owned()], include_texts)
            .await?;
        wtr.write_sample(&scored_sample()).await?;
        let summary = RecognizerSummary {
            recognizer: "tess".to_owned(),
            average_time_ms: 12.5,
            average_score: 80.0,
            sample_count: 1,
            failure_count: 0,
            unsupported_count: 0,
        };
        wtr.write_summary(&[summary], 1).await?;
        wtr.finish().await?;
        Ok(std::fs::read_to_string(&path)?.replace("\r\n", "\n"))
    }

    #[tokio::test]
    async fn writes_rows_then_summary() -> Result<()> {
        let csv = write_report(true).await?;
        assert_eq!(
            csv,
            "image,reference,tess text,tess time_ms,tess score\n\
             dir/page.png,hello,hallo,12.50,80.00\n\
             AVG,,AVG,12.50,80.00\n\
             images amount,1,,,\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn texts_are_trimmed() -> Result<()> {
        let csv = write_report(true).await?;
        assert!(csv.contains("dir/page.png,hello,hallo,"));
        assert!(!csv.contains('"'));
        Ok(())
    }

    #[tokio::test]
    async fn can_leave_out_texts() -> Result<()> {
        let csv = write_report(false).await?;
        assert!(csv.contains("dir/page.png,,,12.50,80.00\n"));
        assert!(!csv.contains("hallo"));
        Ok(())
    }

    #[test]
    fn numbers_have_two_decimals() {
        assert_eq!(format_number(80.0), "80.00");
        assert_eq!(format_number(-50.0), "-50.00");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
    }
}
