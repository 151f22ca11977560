//! In-memory stand-ins for the database and the completion service.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use sqlbot::backend::{
    CellValue, ColumnRow, CompletionService, Connector, Session, StatementError, StatementOutput,
};
use sqlbot::batch::is_read_statement;
use sqlbot::catalog::ForeignKey;
use sqlbot::config::ConnectionProfile;
use sqlbot::error::SqlbotError;

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

pub fn profile() -> ConnectionProfile {
    ConnectionProfile::new("localhost", 5432, "tester", "shop")
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<ColumnRow>,
    pub foreign_keys: Vec<ForeignKey>,
    pub rows: Vec<Vec<CellValue>>,
}

impl FakeTable {
    pub fn new(name: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (col, ty))| ColumnRow {
                name: col.to_string(),
                data_type: ty.to_string(),
                primary_key: i == 0,
            })
            .collect();
        Self {
            name: name.to_string(),
            columns,
            foreign_keys: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<CellValue>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_foreign_key(mut self, column: &str, table: &str, referenced: &str) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            referenced_table: table.to_string(),
            referenced_column: referenced.to_string(),
        });
        self
    }
}

/// The `usuarios` table created by `sqlbot seed`.
pub fn usuarios() -> FakeTable {
    FakeTable::new(
        "usuarios",
        &[
            ("id", "integer"),
            ("nombre", "text"),
            ("email", "text"),
            ("edad", "integer"),
        ],
    )
    .with_rows(vec![
        vec![text("1"), text("prueba 1"), text("prueba1@example.com"), text("30")],
        vec![text("2"), text("prueba 2"), text("prueba2@example.com"), text("25")],
        vec![text("3"), text("prueba 3"), text("prueba3@example.com"), text("40")],
    ])
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub tables: Vec<FakeTable>,
    /// Statements containing this text fail with a syntax error.
    pub fail_on: Option<String>,
    pub fail_commit: bool,
    pub unreachable: bool,
    pub connects: usize,
    pub closes: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub introspections: usize,
    /// Every statement handed to `run`, in order.
    pub executed: Vec<String>,
    /// Statements whose transaction committed.
    pub committed: Vec<String>,
}

/// A database whose tables live in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDatabase {
    pub fn new(tables: Vec<FakeTable>) -> Self {
        let db = Self::default();
        db.state.lock().tables = tables;
        db
    }

    pub fn fail_on(&self, marker: &str) {
        self.state.lock().fail_on = Some(marker.to_string());
    }

    pub fn fail_commit(&self) {
        self.state.lock().fail_commit = true;
    }

    pub fn unreachable(&self) {
        self.state.lock().unreachable = true;
    }

    pub fn add_table(&self, table: FakeTable) {
        self.state.lock().tables.push(table);
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, FakeState> {
        self.state.lock()
    }
}

pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    pending: Vec<String>,
    in_transaction: bool,
}

impl Connector for FakeDatabase {
    type Session = FakeSession;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<FakeSession, SqlbotError> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(SqlbotError::Connection {
                message: format!("cannot connect to {}: connection refused", profile.address()),
            });
        }
        state.connects += 1;
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            in_transaction: false,
        })
    }
}

fn mentions(sql: &str, table: &str) -> bool {
    sql.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case(table))
}

impl Session for FakeSession {
    async fn list_tables(&mut self, _schema: &str) -> Result<Vec<String>, SqlbotError> {
        let mut state = self.state.lock();
        state.introspections += 1;
        Ok(state.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn list_columns(
        &mut self,
        _schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnRow>, SqlbotError> {
        let state = self.state.lock();
        Ok(state
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn list_foreign_keys(
        &mut self,
        _schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKey>, SqlbotError> {
        let state = self.state.lock();
        Ok(state
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn begin(&mut self) -> Result<(), StatementError> {
        self.state.lock().begins += 1;
        self.in_transaction = true;
        Ok(())
    }

    async fn run(&mut self, sql: &str) -> Result<StatementOutput, StatementError> {
        let mut state = self.state.lock();
        state.executed.push(sql.to_string());

        if let Some(ref marker) = state.fail_on
            && sql.contains(marker.as_str())
        {
            return Err(StatementError::new(format!(
                "syntax error at or near \"{}\"",
                marker
            )));
        }

        if self.in_transaction {
            self.pending.push(sql.to_string());
        } else {
            state.committed.push(sql.to_string());
        }

        if !is_read_statement(sql) {
            return Ok(StatementOutput::default());
        }

        match state.tables.iter().find(|t| mentions(sql, &t.name)) {
            Some(table) => Ok(StatementOutput {
                columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                rows: table.rows.clone(),
            }),
            None => Ok(StatementOutput {
                columns: vec!["?column?".to_string()],
                rows: vec![vec![text("1")]],
            }),
        }
    }

    async fn commit(&mut self) -> Result<(), StatementError> {
        let mut state = self.state.lock();
        if state.fail_commit {
            return Err(StatementError::new(
                "could not serialize access due to concurrent update",
            ));
        }
        state.commits += 1;
        state.committed.append(&mut self.pending);
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StatementError> {
        self.state.lock().rollbacks += 1;
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }

    async fn close(self) {
        self.state.lock().closes += 1;
    }
}

/// A completion service that answers from a queue and remembers prompts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCompletion {
    replies: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCompletion {
    pub fn new(replies: &[&str]) -> Self {
        let service = Self::default();
        service
            .replies
            .lock()
            .extend(replies.iter().map(|r| r.to_string()));
        service
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().push_back(reply.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, SqlbotError> {
        self.prompts.lock().push(prompt.to_string());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| SqlbotError::Completion {
                message: "no scripted reply left".to_string(),
            })
    }
}
