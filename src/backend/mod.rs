pub mod openai;
pub mod postgres;

use std::future::Future;

use thiserror::Error;

use crate::catalog::ForeignKey;
use crate::config::ConnectionProfile;
use crate::error::SqlbotError;

/// A single cell value from a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Null,
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Null => None,
        }
    }
}

/// What one executed statement produced. Statements that return no row set
/// leave both fields empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// A statement rejected by the database. `message` is the server's text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StatementError {
    pub message: String,
}

impl StatementError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One column as reported by catalog introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
}

/// Opens sessions against the database named by a connection profile.
pub trait Connector: Send + Sync {
    type Session: Session;

    fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> impl Future<Output = Result<Self::Session, SqlbotError>> + Send;
}

/// A single short-lived database connection.
///
/// Introspection calls fail with connectivity errors; statement and
/// transaction-control calls fail with the database's own error text.
pub trait Session: Send {
    fn list_tables(
        &mut self,
        schema: &str,
    ) -> impl Future<Output = Result<Vec<String>, SqlbotError>> + Send;

    fn list_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> impl Future<Output = Result<Vec<ColumnRow>, SqlbotError>> + Send;

    fn list_foreign_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> impl Future<Output = Result<Vec<ForeignKey>, SqlbotError>> + Send;

    fn begin(&mut self) -> impl Future<Output = Result<(), StatementError>> + Send;

    fn run(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<StatementOutput, StatementError>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<(), StatementError>> + Send;

    fn rollback(&mut self) -> impl Future<Output = Result<(), StatementError>> + Send;

    /// Release the connection. Called on every exit path.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Trait for the external text-completion service.
pub trait CompletionService: Send + Sync {
    fn complete(&self, prompt: &str)
    -> impl Future<Output = Result<String, SqlbotError>> + Send;
}
