use uuid::Uuid;

use super::{DATA_COLUMN, EMITTED_AT_COLUMN, RECORD_ID_COLUMN, RowEncoder};
use crate::error::EncodingError;
use crate::record::Record;

/// Writes the payload as compact JSON in a single column.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFlatteningEncoder;

impl RowEncoder for NoFlatteningEncoder {
    fn header_row(&self) -> Vec<String> {
        vec![
            RECORD_ID_COLUMN.to_string(),
            EMITTED_AT_COLUMN.to_string(),
            DATA_COLUMN.to_string(),
        ]
    }

    fn data_row(&self, id: Uuid, record: &Record) -> Result<Vec<String>, EncodingError> {
        Ok(vec![
            id.to_string(),
            record.emitted_at.to_string(),
            record.data.to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_is_compact_json() {
        let id = Uuid::nil();
        let record = Record::new("users", json!({"name": "ada", "tags": [1, 2]})).with_emitted_at(42);

        let row = NoFlatteningEncoder.data_row(id, &record).unwrap();
        assert_eq!(
            row,
            vec![
                "00000000-0000-0000-0000-000000000000",
                "42",
                r#"{"name":"ada","tags":[1,2]}"#
            ]
        );
    }

    #[test]
    fn test_non_object_payload_is_accepted() {
        let record = Record::new("users", json!("plain")).with_emitted_at(1);
        let row = NoFlatteningEncoder.data_row(Uuid::nil(), &record).unwrap();
        assert_eq!(row[2], r#""plain""#);
    }
}
