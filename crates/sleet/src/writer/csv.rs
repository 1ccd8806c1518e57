//! CSV row format.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use snafu::ResultExt;

use crate::error::{CsvFlushSnafu, CsvSerializeSnafu, EncodingError};

/// Serializes one row of fields to bytes.
pub trait RowFormat: Send + Sync {
    /// File extension of objects written in this format.
    fn extension(&self) -> &'static str;

    /// Encode `fields` as one complete row, including the terminator.
    fn encode_row(&self, fields: &[String]) -> Result<Vec<u8>, EncodingError>;
}

/// RFC 4180 CSV with every field quoted and CRLF line endings.
#[derive(Debug)]
pub struct CsvFormat {
    builder: WriterBuilder,
}

impl CsvFormat {
    pub fn new() -> Self {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(b',')
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::CRLF)
            .has_headers(false);
        Self { builder }
    }
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl RowFormat for CsvFormat {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn encode_row(&self, fields: &[String]) -> Result<Vec<u8>, EncodingError> {
        let mut writer = self.builder.from_writer(Vec::with_capacity(128));
        writer.write_record(fields).context(CsvSerializeSnafu)?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context(CsvFlushSnafu)
    }
}
