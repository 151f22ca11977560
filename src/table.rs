use crate::backend::CellValue;
use crate::engine::ExecutionResult;
use crate::error::SqlbotError;

/// A row set in uniform tabular form. Row and column order are exactly as
/// the database returned them; duplicate column names are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Rows shorter than the header are padded with nulls; longer ones are
    /// cut to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every value of the first column called `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&CellValue>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// One row viewed through the table's column names.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + use<'a> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Convert a row-set result into a [`Table`]. Any other variant is a
/// contract violation by the caller.
pub fn materialize(result: ExecutionResult) -> Result<Table, SqlbotError> {
    match result {
        ExecutionResult::Rows { columns, data } => Ok(Table::new(columns, data)),
        other => Err(SqlbotError::Shape { found: other.kind() }),
    }
}
