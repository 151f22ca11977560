//! Turns an answered question back into prose.

use crate::backend::CompletionService;
use crate::engine;
use crate::error::SqlbotError;
use crate::format;
use crate::intent::StructuredIntent;
use crate::pipeline::Reply;

/// Cap on rows handed to the completion service.
const MAX_NARRATED_ROWS: usize = 50;

fn render_reply(reply: &Reply) -> Result<String, SqlbotError> {
    Ok(match reply {
        Reply::Table { table, .. } if table.len() > MAX_NARRATED_ROWS => {
            let head = crate::table::Table::new(
                table.columns().to_vec(),
                table.rows()[..MAX_NARRATED_ROWS].to_vec(),
            );
            format!(
                "{}\n(first {} of {} rows)",
                format::to_toon(&head)?,
                MAX_NARRATED_ROWS,
                table.len()
            )
        }
        Reply::Table { table, .. } => format::to_toon(table)?,
        Reply::Ack { message, .. } => message.clone(),
        Reply::Failed { message, .. } => engine::failure_text(message),
        Reply::Rejected(message) => message.to_string(),
    })
}

pub fn narration_prompt(
    question: &str,
    intent: Option<&StructuredIntent>,
    result: &str,
) -> Result<String, SqlbotError> {
    let structure = match intent {
        Some(intent) => format::to_toon_value(intent)?,
        None => "(none)".to_string(),
    };
    Ok(format!(
        "Based on the original question, its query structure and the SQL results:\n\n\
         Question: {question}\n\
         Query structure:\n{structure}\n\
         Query results:\n{result}\n\n\
         Write a concise, clear natural-language answer to the original question.\n\n\
         Answer:"
    ))
}

/// Ask the completion service for a short prose answer.
pub async fn narrate<L: CompletionService>(
    service: &L,
    question: &str,
    intent: Option<&StructuredIntent>,
    reply: &Reply,
) -> Result<String, SqlbotError> {
    let prompt = narration_prompt(question, intent, &render_reply(reply)?)?;
    let answer = service.complete(&prompt).await?;
    Ok(answer.trim().to_string())
}
