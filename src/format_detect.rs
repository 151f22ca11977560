use std::path::{Path, PathBuf};

use crate::error::SqlbotError;

/// File formats a result table can be saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Toon,
    Csv,
}

const SUPPORTED: &str = ".toon, .txt, .csv";

impl OutputFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toon" | "txt" => Some(OutputFormat::Toon),
            "csv" => Some(OutputFormat::Csv),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutputFormat::Toon => "TOON",
            OutputFormat::Csv => "CSV",
        }
    }
}

/// Pick the output format for `--output`. A path without an extension is
/// saved as TOON with `.toon` appended.
pub fn detect_format(path: &Path) -> Result<(OutputFormat, PathBuf), SqlbotError> {
    let Some(ext) = path.extension() else {
        return Ok((OutputFormat::Toon, path.with_extension("toon")));
    };

    let ext = ext.to_string_lossy();
    match OutputFormat::from_extension(&ext) {
        Some(format) => Ok((format, path.to_path_buf())),
        None => Err(SqlbotError::Format {
            message: format!("cannot save results as \".{ext}\" (supported: {SUPPORTED})"),
        }),
    }
}
