//! Persistence of crawl records.
//!
//! Records are handed over one at a time in emission order. The on-disk
//! layout belongs to each sink; the CSV sink flattens every record into
//! one row per link or image:
//!
//! ```text
//! source_url,kind,url
//! https://example.com/,link,https://example.com/about
//! https://example.com/,image,https://example.com/logo.png
//! ```

pub mod csv;

use crate::error::Result;
use crate::models::CrawlRecord;

// Re-export for convenience
pub use self::csv::CsvSink;

/// Consumer of crawl records.
pub trait RecordSink {
    /// Append one record.
    fn write_record(&mut self, record: &CrawlRecord) -> Result<()>;

    /// Flush anything buffered. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<CrawlRecord> {
    fn write_record(&mut self, record: &CrawlRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write_record(&mut self, record: &CrawlRecord) -> Result<()> {
        (**self).write_record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
