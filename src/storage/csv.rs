//! CSV record sink.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::models::CrawlRecord;
use crate::storage::RecordSink;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum RowKind {
    Link,
    Image,
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    source_url: &'a str,
    kind: RowKind,
    url: &'a str,
}

/// Writes flattened `source_url,kind,url` rows.
pub struct CsvSink<W: Write> {
    writer: ::csv::Writer<W>,
    rows: usize,
}

impl CsvSink<File> {
    /// Create (truncate) a CSV file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        log::debug!("Writing records to {}", path.display());
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: ::csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::AppError::Io(e.into_error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: &CrawlRecord) -> Result<()> {
        let links = record.links.iter().map(|url| (RowKind::Link, url));
        let images = record.images.iter().map(|url| (RowKind::Image, url));
        for (kind, url) in links.chain(images) {
            self.writer.serialize(Row {
                source_url: &record.source_url,
                kind,
                url,
            })?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
