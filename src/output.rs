use std::path::Path;

use serde_json::json;

use crate::error::SqlbotError;

/// Print TOON result to stdout.
pub fn print_result(toon_string: &str) {
    print!("{}", toon_string);
    if !toon_string.ends_with('\n') {
        println!();
    }
}

/// Errors go to stderr as `error: <category>: <message>`.
pub fn print_error(err: &SqlbotError) {
    eprintln!("error: {}", err);
}

fn encode(value: &serde_json::Value) -> Result<String, SqlbotError> {
    toon_format::encode_default(value).map_err(|e| SqlbotError::Format {
        message: e.to_string(),
    })
}

/// The TOON object printed after a result table is saved to a file.
pub fn summary_toon(rows: usize, path: &Path, format: &str) -> Result<String, SqlbotError> {
    encode(&json!({
        "rows_written": rows,
        "file": path.display().to_string(),
        "format": format,
    }))
}

pub fn print_summary(rows: usize, path: &Path, format: &str) -> Result<(), SqlbotError> {
    print_result(&summary_toon(rows, path, format)?);
    Ok(())
}

/// A reply without rows (ok, rejected, failure) as a TOON object.
pub fn status_toon(status: &str, message: &str) -> Result<String, SqlbotError> {
    encode(&json!({ "status": status, "message": message }))
}

/// Write TOON string to a file.
pub fn write_file(toon_string: &str, path: &Path) -> Result<(), SqlbotError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(SqlbotError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("parent directory does not exist: {}", parent.display()),
        )));
    }
    std::fs::write(path, toon_string)?;
    Ok(())
}
