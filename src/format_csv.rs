use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::backend::CellValue;
use crate::error::SqlbotError;
use crate::table::Table;

fn csv_error(e: csv::Error) -> SqlbotError {
    SqlbotError::Format {
        message: format!("CSV write failed: {}", e),
    }
}

/// Write a table as RFC 4180 CSV. Nulls become empty fields.
pub fn write_csv_to_writer<W: Write>(table: &Table, writer: W) -> Result<(), SqlbotError> {
    let mut out = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    out.write_record(table.columns()).map_err(csv_error)?;
    for row in table.rows() {
        out.write_record(row.iter().map(|cell| match cell {
            CellValue::Text(s) => s.as_str(),
            CellValue::Null => "",
        }))
        .map_err(csv_error)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a table as CSV to `path`.
pub fn write_csv(table: &Table, path: &Path) -> Result<(), SqlbotError> {
    let file = File::create(path)?;
    write_csv_to_writer(table, file)
}
