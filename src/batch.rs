//! Statement batches and the lexical helpers shared by the compiler and the
//! execution engine.

use serde::Serialize;

/// Ordered, terminator-delimited statements that run in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatementBatch {
    statements: Vec<String>,
}

impl StatementBatch {
    /// Split a script into a batch. Empty fragments are dropped and every
    /// statement ends with `;`.
    pub fn parse(script: &str) -> Self {
        Self {
            statements: split_statements(script),
        }
    }

    pub fn from_statements<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let statements = statements
            .into_iter()
            .flat_map(|s| split_statements(s.as_ref()))
            .collect();
        Self { statements }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// True for a batch holding exactly one `CREATE [OR REPLACE] FUNCTION`
    /// or `PROCEDURE` statement.
    pub fn is_single_routine_definition(&self) -> bool {
        matches!(self.statements.as_slice(), [only] if is_routine_definition(only))
    }

    pub(crate) fn statements_mut(&mut self) -> &mut Vec<String> {
        &mut self.statements
    }

    /// The batch as one script, one statement per line.
    pub fn to_script(&self) -> String {
        self.statements.join("\n")
    }
}

impl<'a> IntoIterator for &'a StatementBatch {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "TABLE", "SHOW", "EXPLAIN"];

/// The statement text after any leading whitespace and comments.
fn strip_leading_comments(sql: &str) -> &str {
    let bytes = sql.as_bytes();
    let mut i = 0;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i..i + 2) {
            Some(b"--") => i = skip_line_comment(bytes, i),
            Some(b"/*") => i = skip_block_comment(bytes, i),
            _ => return &sql[i..],
        }
    }
}

/// First keyword of a statement, uppercased. Leading whitespace, comments
/// and parentheses are skipped.
pub fn first_keyword(sql: &str) -> String {
    let mut rest = strip_leading_comments(sql);
    while let Some(inner) = rest.strip_prefix('(') {
        rest = strip_leading_comments(inner);
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Whether a statement produces a row set worth capturing.
pub fn is_read_statement(sql: &str) -> bool {
    READ_KEYWORDS.contains(&first_keyword(sql).as_str())
}

fn leading_words(sql: &str, count: usize) -> Vec<String> {
    strip_leading_comments(sql)
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .take(count)
        .map(str::to_ascii_uppercase)
        .collect()
}

pub fn is_routine_definition(sql: &str) -> bool {
    let words = leading_words(sql, 4);
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    matches!(
        words.as_slice(),
        ["CREATE", "FUNCTION" | "PROCEDURE", ..] | ["CREATE", "OR", "REPLACE", "FUNCTION" | "PROCEDURE"]
    )
}

/// Top-level transaction control found in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionControl {
    /// `BEGIN`, `START TRANSACTION`
    Begin,
    /// `COMMIT`, `END`
    Commit,
    /// `ROLLBACK`, `ABORT`. `ROLLBACK TO SAVEPOINT` is not included.
    Rollback,
}

pub fn transaction_control(sql: &str) -> Option<TransactionControl> {
    let words = leading_words(sql, 2);
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["BEGIN", ..] | ["START", "TRANSACTION"] => Some(TransactionControl::Begin),
        ["COMMIT" | "END", ..] => Some(TransactionControl::Commit),
        ["ROLLBACK" | "ABORT", "TO"] => None,
        ["ROLLBACK" | "ABORT", ..] => Some(TransactionControl::Rollback),
        _ => None,
    }
}

/// Split on `;`, ignoring terminators inside quoted strings, quoted
/// identifiers, dollar-quoted bodies and comments.
pub fn split_statements(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => i = skip_quoted(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'$' => match dollar_tag(script, i) {
                Some(tag) => i = skip_dollar_quoted(script, i, tag),
                None => i += 1,
            },
            b';' => {
                push_statement(&mut statements, &script[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_statement(&mut statements, &script[start..]);

    statements
}

fn push_statement(statements: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    // A trailing line comment would swallow the terminator.
    let last_line = fragment.rsplit('\n').next().unwrap_or(fragment);
    if last_line.contains("--") {
        statements.push(format!("{}\n;", fragment));
    } else {
        statements.push(format!("{};", fragment));
    }
}

/// Index just past the closing quote; a doubled quote is an escape.
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| start + pos + 1)
}

/// Block comments nest in PostgreSQL.
fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

/// The `$tag$` opening at `start`, if any. Positional parameters (`$1`) and
/// `$` inside identifiers are not tags.
fn dollar_tag(script: &str, start: usize) -> Option<&str> {
    let bytes = script.as_bytes();
    if start > 0 {
        let prev = bytes[start - 1];
        if prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'$' {
            return None;
        }
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    if end >= bytes.len() || bytes[end] != b'$' {
        return None;
    }
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    Some(&script[start..=end])
}

fn skip_dollar_quoted(script: &str, start: usize, tag: &str) -> usize {
    let body = start + tag.len();
    match script[body..].find(tag) {
        Some(pos) => body + pos + tag.len(),
        None => script.len(),
    }
}
