use serde::Serialize;

use crate::backend::CellValue;
use crate::error::SqlbotError;
use crate::table::Table;

fn cell_to_json(value: &CellValue) -> serde_json::Value {
    match value {
        CellValue::Text(s) => serde_json::Value::String(s.clone()),
        CellValue::Null => serde_json::Value::Null,
    }
}

/// Convert a table to a TOON-formatted string.
pub fn to_toon(table: &Table) -> Result<String, SqlbotError> {
    // Zero-row results keep their header; toon_format cannot infer columns
    // from an empty array, so we produce the TOON header manually.
    if table.is_empty() && !table.columns().is_empty() {
        return Ok(format!("[0]{{{}}}:\n", table.columns().join(",")));
    }

    let array: Vec<serde_json::Value> = table
        .records()
        .map(|record| {
            let mut map = serde_json::Map::new();
            for (column, value) in record.iter() {
                // First occurrence wins for duplicate column names.
                if !map.contains_key(column) {
                    map.insert(column.to_string(), cell_to_json(value));
                }
            }
            serde_json::Value::Object(map)
        })
        .collect();

    encode(&serde_json::Value::Array(array))
}

/// Encode any serializable value (catalog, intent, summary) as TOON.
pub fn to_toon_value<T: Serialize>(value: &T) -> Result<String, SqlbotError> {
    let json = serde_json::to_value(value).map_err(|e| SqlbotError::Format {
        message: e.to_string(),
    })?;
    encode(&json)
}

fn encode(value: &serde_json::Value) -> Result<String, SqlbotError> {
    toon_format::encode_default(value).map_err(|e| SqlbotError::Format {
        message: e.to_string(),
    })
}
