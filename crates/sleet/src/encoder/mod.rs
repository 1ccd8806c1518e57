//! Row encoders.
//!
//! An encoder fixes the header row once and maps every record to a row
//! positionally aligned with it.

mod no_flattening;
mod root_level;

pub use no_flattening::NoFlatteningEncoder;
pub use root_level::RootLevelEncoder;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EncodingError;
use crate::record::Record;

/// Column holding the id assigned to each record.
pub const RECORD_ID_COLUMN: &str = "_sleet_record_id";
/// Column holding the record's emission time in epoch milliseconds.
pub const EMITTED_AT_COLUMN: &str = "_sleet_emitted_at";
/// Column holding the whole payload as JSON.
pub const DATA_COLUMN: &str = "_sleet_data";

/// Converts records into rows of field values.
pub trait RowEncoder: Send + Sync {
    /// Column names, in output order.
    fn header_row(&self) -> Vec<String>;

    /// Field values for one record, in header order.
    fn data_row(&self, id: Uuid, record: &Record) -> Result<Vec<String>, EncodingError>;
}

/// How record payloads map to columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flattening {
    /// The payload goes into a single JSON column.
    #[default]
    NoFlattening,
    /// Each top-level schema property gets its own column.
    RootLevelFlattening,
}

/// Encoder selected from configuration.
#[derive(Debug, Clone)]
pub enum SheetEncoder {
    NoFlattening(NoFlatteningEncoder),
    RootLevel(RootLevelEncoder),
}

impl SheetEncoder {
    /// Build the encoder for `flattening`. Root level flattening needs a schema.
    pub fn new(flattening: Flattening, schema: Option<&Value>) -> Result<Self, EncodingError> {
        match flattening {
            Flattening::NoFlattening => Ok(Self::NoFlattening(NoFlatteningEncoder)),
            Flattening::RootLevelFlattening => {
                let schema = schema.ok_or_else(|| EncodingError::InvalidSchema {
                    message: "root level flattening requires a json_schema".to_string(),
                })?;
                Ok(Self::RootLevel(RootLevelEncoder::from_schema(schema)?))
            }
        }
    }
}

impl RowEncoder for SheetEncoder {
    fn header_row(&self) -> Vec<String> {
        match self {
            Self::NoFlattening(encoder) => encoder.header_row(),
            Self::RootLevel(encoder) => encoder.header_row(),
        }
    }

    fn data_row(&self, id: Uuid, record: &Record) -> Result<Vec<String>, EncodingError> {
        match self {
            Self::NoFlattening(encoder) => encoder.data_row(id, record),
            Self::RootLevel(encoder) => encoder.data_row(id, record),
        }
    }
}
