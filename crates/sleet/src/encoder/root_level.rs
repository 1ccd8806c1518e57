use serde_json::Value;
use uuid::Uuid;

use super::{EMITTED_AT_COLUMN, RECORD_ID_COLUMN, RowEncoder};
use crate::error::EncodingError;
use crate::record::Record;

/// One column per top-level property of the stream's JSON schema.
///
/// Columns follow the sorted property names. Payload fields outside the schema
/// are dropped; missing or null fields become empty strings.
#[derive(Debug, Clone)]
pub struct RootLevelEncoder {
    columns: Vec<String>,
}

impl RootLevelEncoder {
    pub fn from_schema(schema: &Value) -> Result<Self, EncodingError> {
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| EncodingError::InvalidSchema {
                message: "schema has no 'properties' object".to_string(),
            })?;

        let mut columns: Vec<String> = properties.keys().cloned().collect();
        columns.sort();

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

fn field_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl RowEncoder for RootLevelEncoder {
    fn header_row(&self) -> Vec<String> {
        [RECORD_ID_COLUMN, EMITTED_AT_COLUMN]
            .into_iter()
            .map(str::to_string)
            .chain(self.columns.iter().cloned())
            .collect()
    }

    fn data_row(&self, id: Uuid, record: &Record) -> Result<Vec<String>, EncodingError> {
        let Some(object) = record.data.as_object() else {
            return Err(EncodingError::NotAnObject {
                stream: record.stream.clone(),
            });
        };

        let mut row = Vec::with_capacity(self.columns.len() + 2);
        row.push(id.to_string());
        row.push(record.emitted_at.to_string());
        row.extend(self.columns.iter().map(|column| field_value(object.get(column))));
        Ok(row)
    }
}
