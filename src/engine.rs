use std::fmt;

use tracing::{debug, warn};

use crate::backend::{CellValue, Connector, Session, StatementError, StatementOutput};
use crate::batch::{StatementBatch, TransactionControl, is_read_statement, transaction_control};
use crate::config::ConnectionProfile;
use crate::error::SqlbotError;
use crate::verbose::Timer;

pub const SUCCESS_MESSAGE: &str = "Operation completed successfully.";
pub const ROUTINE_CREATED_MESSAGE: &str = "Routine created successfully.";
pub const FAILURE_PREFIX: &str = "Error executing query: ";

/// User-facing text for a failed batch.
pub fn failure_text(message: &str) -> String {
    format!("{FAILURE_PREFIX}{message}")
}

/// Outcome of running one batch. Exactly one variant per execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Rows {
        columns: Vec<String>,
        data: Vec<Vec<CellValue>>,
    },
    Ack {
        message: String,
    },
    /// `message` is the database's error text, unmodified.
    Failure {
        message: String,
    },
}

impl ExecutionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionResult::Rows { .. } => "rows",
            ExecutionResult::Ack { .. } => "ack",
            ExecutionResult::Failure { .. } => "failure",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionResult::Failure { .. })
    }

    fn ack(message: &str) -> Self {
        ExecutionResult::Ack {
            message: message.to_string(),
        }
    }
}

impl From<StatementOutput> for ExecutionResult {
    fn from(output: StatementOutput) -> Self {
        ExecutionResult::Rows {
            columns: output.columns,
            data: output.rows,
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Rows { data, .. } => write!(f, "{} row(s)", data.len()),
            ExecutionResult::Ack { message } => f.write_str(message),
            ExecutionResult::Failure { message } => f.write_str(&failure_text(message)),
        }
    }
}

/// Run `batch` in one transaction on a fresh connection.
///
/// Only a failure to connect is an `Err`; statement errors roll the whole
/// batch back and come back as [`ExecutionResult::Failure`].
pub async fn execute<C: Connector>(
    connector: &C,
    profile: &ConnectionProfile,
    batch: &StatementBatch,
) -> Result<ExecutionResult, SqlbotError> {
    let timer = Timer::start();
    let mut session = connector.connect(profile).await?;
    let result = run_batch(&mut session, batch).await;
    session.close().await;

    debug!(
        statements = batch.len(),
        outcome = result.kind(),
        elapsed_ms = timer.elapsed_ms() as u64,
        "batch executed"
    );
    Ok(result)
}

/// Run `batch` inside a transaction on an open session. The transaction is
/// always committed or rolled back before this returns.
///
/// The batch may not steer that transaction: `BEGIN` and `COMMIT` are
/// skipped, and a batch holding a `ROLLBACK` fails before anything runs.
pub async fn run_batch<S: Session>(session: &mut S, batch: &StatementBatch) -> ExecutionResult {
    if let Some(statement) = batch
        .iter()
        .find(|s| transaction_control(s) == Some(TransactionControl::Rollback))
    {
        warn!(statement, "batch tries to roll back its own transaction, refusing");
        return ExecutionResult::Failure {
            message: format!(
                "transaction control is not allowed in a batch: {}",
                statement.trim_end_matches(';').trim()
            ),
        };
    }

    if let Err(e) = session.begin().await {
        return ExecutionResult::Failure { message: e.message };
    }

    if batch.is_single_routine_definition() {
        let definition = &batch.statements()[0];
        return match session.run(definition).await {
            Ok(_) => finish(session, ExecutionResult::ack(ROUTINE_CREATED_MESSAGE)).await,
            Err(e) => abort(session, e).await,
        };
    }

    // Only the last read's rows survive a batch that reads more than once.
    let mut captured: Option<StatementOutput> = None;
    for (index, statement) in batch.iter().enumerate() {
        if transaction_control(statement).is_some() {
            warn!(index, statement, "skipping transaction control statement");
            continue;
        }
        match session.run(statement).await {
            Ok(output) => {
                if is_read_statement(statement) {
                    if captured.is_some() {
                        warn!(index, "batch has several reads, keeping only the latest rows");
                    }
                    captured = Some(output);
                }
            }
            Err(e) => {
                warn!(index, error = %e, "statement failed, rolling back batch");
                return abort(session, e).await;
            }
        }
    }

    let result = match captured {
        Some(output) => ExecutionResult::from(output),
        None => ExecutionResult::ack(SUCCESS_MESSAGE),
    };
    finish(session, result).await
}

async fn finish<S: Session>(session: &mut S, result: ExecutionResult) -> ExecutionResult {
    match session.commit().await {
        Ok(()) => result,
        Err(e) => abort(session, e).await,
    }
}

async fn abort<S: Session>(session: &mut S, error: StatementError) -> ExecutionResult {
    if let Err(e) = session.rollback().await {
        warn!(error = %e, "rollback failed");
    }
    ExecutionResult::Failure {
        message: error.message,
    }
}
