use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::CompletionService;
use crate::error::SqlbotError;
use crate::verbose::Timer;

/// What the user wants done with the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    Count,
    List,
    Describe,
    Unknown,
    Other(String),
}

impl IntentAction {
    /// Map an action word (Spanish or English) onto the known set.
    pub fn from_word(word: &str) -> Self {
        let normalized = word.trim().to_lowercase();
        match normalized.as_str() {
            "contar" | "count" => IntentAction::Count,
            "listar" | "list" | "mostrar" | "show" => IntentAction::List,
            "detallar" | "detalle" | "describir" | "describe" => IntentAction::Describe,
            "" | "desconocida" | "desconocido" | "unknown" => IntentAction::Unknown,
            _ => IntentAction::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IntentAction::Count => "count",
            IntentAction::List => "list",
            IntentAction::Describe => "describe",
            IntentAction::Unknown => "unknown",
            IntentAction::Other(word) => word,
        }
    }
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for IntentAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Parsed form of a natural-language question. A missing table means the
/// question is not about the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredIntent {
    pub action: IntentAction,
    pub table: Option<String>,
    pub filters: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl StructuredIntent {
    /// The fallback used when a reply cannot be parsed.
    pub fn unknown() -> Self {
        Self {
            action: IntentAction::Unknown,
            table: None,
            filters: BTreeMap::new(),
            limit: None,
        }
    }

    pub fn targets_database(&self) -> bool {
        self.table.is_some()
    }
}

/// Why a completion reply could not be read as an intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentParseError {
    #[error("reply is not JSON: {reason}")]
    NotJson { reason: String },

    #[error("reply is JSON but not an object")]
    NotAnObject,

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[derive(Deserialize)]
struct RawIntent {
    #[serde(default, alias = "action")]
    intencion: Option<Value>,
    #[serde(default, alias = "table")]
    tabla: Option<Value>,
    #[serde(default, alias = "filters")]
    filtros: Option<Value>,
    #[serde(default, alias = "limit")]
    limite: Option<Value>,
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the end of the first line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a completion reply into an intent.
pub fn parse_intent(reply: &str) -> Result<StructuredIntent, IntentParseError> {
    let text = strip_code_fence(reply);
    let value: Value = serde_json::from_str(text).map_err(|e| IntentParseError::NotJson {
        reason: e.to_string(),
    })?;
    if !value.is_object() {
        return Err(IntentParseError::NotAnObject);
    }
    let raw: RawIntent = serde_json::from_value(value).map_err(|e| IntentParseError::NotJson {
        reason: e.to_string(),
    })?;

    let action = match raw.intencion {
        None | Some(Value::Null) => IntentAction::Unknown,
        Some(Value::String(word)) => IntentAction::from_word(&word),
        Some(other) => {
            return Err(IntentParseError::InvalidField {
                field: "intencion",
                reason: format!("expected a string, got {}", other),
            });
        }
    };

    let table = match raw.tabla {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.trim().to_string()).filter(|n| !n.is_empty()),
        Some(other) => {
            return Err(IntentParseError::InvalidField {
                field: "tabla",
                reason: format!("expected a string, got {}", other),
            });
        }
    };

    let filters = match raw.filtros {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(other) => {
            return Err(IntentParseError::InvalidField {
                field: "filtros",
                reason: format!("expected an object, got {}", other),
            });
        }
    };

    let limit = match raw.limite {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) | None => {
                return Err(IntentParseError::InvalidField {
                    field: "limite",
                    reason: format!("expected a positive integer, got {}", n),
                });
            }
            Some(limit) => Some(limit),
        },
        Some(other) => {
            return Err(IntentParseError::InvalidField {
                field: "limite",
                reason: format!("expected a number, got {}", other),
            });
        }
    };

    Ok(StructuredIntent {
        action,
        table,
        filters,
        limit,
    })
}

pub fn intent_prompt(schema: &str, question: &str) -> String {
    format!(
        "Given the following database schema:\n\
         {schema}\n\n\
         Interpret the user's question and describe its intent as a single JSON object \
         with exactly these keys:\n\
         - \"intencion\": the action (count, list, describe, ...)\n\
         - \"tabla\": the main table, exactly as named in the schema, or null if the \
         question is not about the database\n\
         - \"filtros\": an object mapping column name to value (may be empty)\n\
         - \"limite\": optional maximum number of rows the user asked for\n\
         Reply with the JSON object only.\n\n\
         Question: {question}\n"
    )
}

/// Ask the completion service for the intent behind `question`.
///
/// A reply that does not parse degrades to [`StructuredIntent::unknown`];
/// only a failed round-trip is an error.
pub async fn interpret<L: CompletionService>(
    service: &L,
    question: &str,
    schema_text: &str,
) -> Result<StructuredIntent, SqlbotError> {
    let timer = Timer::start();
    let reply = service.complete(&intent_prompt(schema_text, question)).await?;
    debug!(elapsed_ms = timer.elapsed_ms() as u64, "intent reply received");

    match parse_intent(&reply) {
        Ok(intent) => Ok(intent),
        Err(reason) => {
            warn!(%reason, "intent reply unreadable, treating question as non-database");
            Ok(StructuredIntent::unknown())
        }
    }
}
