//! Sample rows per table, for richer prompt context.

use tracing::warn;

use crate::backend::{Connector, Session};
use crate::catalog::SchemaCatalog;
use crate::config::ConnectionProfile;
use crate::error::SqlbotError;
use crate::format;
use crate::table::Table;

/// Quote an identifier for PostgreSQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sample_query(schema: &str, table: &str, max_rows: usize) -> String {
    format!(
        "SELECT * FROM {}.{} LIMIT {}",
        quote_ident(schema),
        quote_ident(table),
        max_rows
    )
}

/// Describe every table with up to `max_rows` sample rows, over a single
/// connection. A table whose sample cannot be read is listed without rows.
pub async fn summarize<C: Connector>(
    connector: &C,
    profile: &ConnectionProfile,
    catalog: &SchemaCatalog,
    max_rows: usize,
) -> Result<String, SqlbotError> {
    let mut session = connector.connect(profile).await?;
    let mut lines = Vec::new();

    for (name, table) in catalog.tables() {
        lines.push(format!("=== Table: {} ===", name));
        let columns = table
            .columns
            .iter()
            .map(|(col, info)| format!("{} ({})", col, info.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Columns: {}", columns));

        match session.run(&sample_query(&profile.schema, name, max_rows)).await {
            Ok(output) if !output.rows.is_empty() => {
                let sample = Table::new(output.columns, output.rows);
                lines.push(format!("Sample of up to {} rows:", max_rows));
                match format::to_toon(&sample) {
                    Ok(toon) => lines.push(toon.trim_end().to_string()),
                    Err(e) => warn!(table = name, error = %e, "cannot render sample rows"),
                }
            }
            Ok(_) => lines.push("No sample rows (the table is empty).".to_string()),
            Err(e) => {
                warn!(table = name, error = %e, "cannot fetch sample rows");
                lines.push("No sample rows available.".to_string());
            }
        }
        lines.push("-".repeat(60));
    }

    session.close().await;
    Ok(lines.join("\n"))
}
