use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::backend::CompletionService;
use crate::batch::{StatementBatch, first_keyword};
use crate::error::SqlbotError;
use crate::intent::StructuredIntent;
use crate::verbose::Timer;

pub const NOT_A_DATABASE_QUESTION: &str =
    "Sorry, I only answer questions about the database.";

/// A non-error reply meaning the question was not database-directed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalMessage(String);

impl TerminalMessage {
    pub fn not_a_database_question() -> Self {
        Self(NOT_A_DATABASE_QUESTION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiled {
    Batch(StatementBatch),
    Rejected(TerminalMessage),
}

/// What to compile from.
#[derive(Debug, Clone, Copy)]
pub enum CompileRequest<'a> {
    Intent(&'a StructuredIntent),
    Question(&'a str),
}

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub row_cap: u64,
}

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "TABLE", "SHOW", "EXPLAIN", "INSERT", "UPDATE", "DELETE",
    "MERGE", "CREATE", "ALTER", "DROP", "TRUNCATE", "COMMENT", "GRANT", "REVOKE", "CALL", "DO",
    "BEGIN", "DECLARE", "SET",
];

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:answer|respuesta|sql\s+query|sql\s+statement|sql|query|consulta(?:\s+sql)?|sentencia)\s*:\s*",
    )
    .expect("label pattern is valid")
});

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:limit|fetch\s+(?:first|next))\b").expect("limit pattern is valid")
});

fn strip_labels(mut text: &str) -> &str {
    while let Some(found) = LABEL_RE.find(text) {
        text = &text[found.end()..];
    }
    text
}

/// Clean a completion reply into statement text: drop conversational
/// labels and Markdown fences. Terminators are added when splitting.
pub fn clean_reply(reply: &str) -> String {
    let text = strip_labels(reply.trim());
    let text = match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => text,
    };
    strip_labels(text.trim()).trim().to_string()
}

/// Whether the first statement of a batch starts with a SQL keyword.
pub fn looks_like_sql(batch: &StatementBatch) -> bool {
    batch
        .statements()
        .first()
        .is_some_and(|first| SQL_KEYWORDS.contains(&first_keyword(first).as_str()))
}

/// Append `LIMIT cap` to a lone uncapped query.
pub fn apply_row_cap(batch: &mut StatementBatch, cap: u64) {
    let [only] = batch.statements_mut().as_mut_slice() else {
        return;
    };
    if !matches!(first_keyword(only).as_str(), "SELECT" | "WITH" | "VALUES" | "TABLE")
        || LIMIT_RE.is_match(only)
    {
        return;
    }
    let capped = format!("{}\nLIMIT {};", only.trim_end().trim_end_matches(';').trim_end(), cap);
    *only = capped;
}

/// Post-process a reply into a batch, or reject it as conversational.
pub fn postprocess(reply: &str) -> Compiled {
    let batch = StatementBatch::parse(&clean_reply(reply));
    if batch.is_empty() || !looks_like_sql(&batch) {
        return Compiled::Rejected(TerminalMessage::not_a_database_question());
    }
    Compiled::Batch(batch)
}

pub fn intent_sql_prompt(schema: &str, intent: &StructuredIntent, row_cap: u64) -> String {
    let filters = serde_json::to_string(&intent.filters).unwrap_or_else(|_| "{}".to_string());
    let limit = match intent.limit {
        Some(n) => format!("Return at most {n} rows."),
        None => format!("Limit results to {row_cap} rows unless the intent says otherwise."),
    };
    format!(
        "Database schema:\n\
         {schema}\n\n\
         Query information:\n\
         - Intent: {action}\n\
         - Table: {table}\n\
         - Filters: {filters}\n\n\
         Write one precise PostgreSQL statement for this intent, taking into account:\n\
         1. The specific intent\n\
         2. Table and column names exactly as they appear in the schema\n\
         3. Appropriate filtering\n\
         4. {limit}\n\n\
         Return ONLY the SQL statement, with no additional text.\n",
        action = intent.action,
        table = intent.table.as_deref().unwrap_or(""),
    )
}

pub fn question_sql_prompt(schema: &str, question: &str) -> String {
    format!(
        "You are SQLBOT, an assistant that turns natural-language requests into SQL \
         queries, PL/pgSQL statements or calls to stored functions in PostgreSQL.\n\
         The database has the following tables and columns:\n\n\
         {schema}\n\n\
         BEHAVIOUR:\n\
         1. If the question is NOT about the data in this database, reply briefly that \
         you are a PostgreSQL bot and only answer questions about the database.\n\
         2. If it is, decide whether a plain SQL query, a PL/pgSQL statement or a call \
         to an existing function is needed, and produce only that, with no explanation.\n\
         3. To describe a table use: SELECT column_name, data_type FROM \
         information_schema.columns WHERE table_name = '<table>';\n\
         4. Use CREATE TABLE or ALTER TABLE to create tables or relationships.\n\
         5. Multiple statements separated by semicolons are allowed.\n\n\
         Question: {question}\n"
    )
}

/// Turn an intent or a raw question into a statement batch.
///
/// An intent without a target table is rejected without calling the
/// completion service.
pub async fn compile<L: CompletionService>(
    service: &L,
    request: CompileRequest<'_>,
    schema_text: &str,
    options: CompileOptions,
) -> Result<Compiled, SqlbotError> {
    let prompt = match request {
        CompileRequest::Intent(intent) => {
            if !intent.targets_database() {
                debug!("intent has no target table, rejecting");
                return Ok(Compiled::Rejected(TerminalMessage::not_a_database_question()));
            }
            intent_sql_prompt(schema_text, intent, options.row_cap)
        }
        CompileRequest::Question(question) => question_sql_prompt(schema_text, question),
    };

    let timer = Timer::start();
    let reply = service.complete(&prompt).await?;
    debug!(elapsed_ms = timer.elapsed_ms() as u64, "statement reply received");

    let mut compiled = postprocess(&reply);
    match (&mut compiled, request) {
        (Compiled::Batch(batch), CompileRequest::Intent(intent)) => {
            apply_row_cap(batch, intent.limit.unwrap_or(options.row_cap));
        }
        (Compiled::Rejected(_), _) => {
            warn!("statement reply is not SQL, rejecting");
        }
        _ => {}
    }
    Ok(compiled)
}
