//! Human-readable labels for catalog identifiers.
//!
//! Labels only ever appear in prompt text and in the schema view; statements
//! sent to the database keep identifiers exactly as the catalog reports them.

use indexmap::IndexMap;
use serde::Serialize;

use crate::catalog::SchemaCatalog;

fn is_separator(c: char) -> bool {
    c == '_' || c == '-' || c == '.' || c.is_whitespace()
}

/// Turn an identifier into a label: split on separators, title-case each
/// word, join with single spaces. `"fecha_de_registro"` → `"Fecha De Registro"`.
///
/// Total and idempotent; the empty string maps to itself.
pub fn humanize(identifier: &str) -> String {
    identifier
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    // Multi-char uppercase forms (ß → SS) would break idempotence.
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => first,
    };
    std::iter::once(head)
        .chain(chars.flat_map(char::to_lowercase))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLabels {
    pub human_name: String,
    pub columns: IndexMap<String, String>,
}

/// Table name → its label and the labels of its columns.
pub type SemanticMap = IndexMap<String, TableLabels>;

pub fn semantic_map(catalog: &SchemaCatalog) -> SemanticMap {
    catalog
        .tables()
        .map(|(name, table)| {
            let columns = table
                .columns
                .keys()
                .map(|col| (col.clone(), humanize(col)))
                .collect();
            (
                name.to_string(),
                TableLabels {
                    human_name: humanize(name),
                    columns,
                },
            )
        })
        .collect()
}

/// Render the catalog as the schema description used in prompts.
pub fn describe_schema(catalog: &SchemaCatalog, include_foreign_keys: bool) -> String {
    if catalog.is_empty() {
        return "(the database has no tables)".to_string();
    }

    let mut lines = Vec::new();
    for (name, table) in catalog.tables() {
        lines.push(format!("Table: {} ({})", name, humanize(name)));

        let columns = table
            .columns
            .iter()
            .map(|(col, info)| {
                let pk = if info.primary_key { ", PK" } else { "" };
                format!("{} [{}] ({}{})", col, humanize(col), info.data_type, pk)
            })
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Columns: {}", columns));

        if include_foreign_keys {
            for fk in &table.foreign_keys {
                lines.push(format!(
                    "FK {}.{} -> {}.{}",
                    name, fk.column, fk.referenced_table, fk.referenced_column
                ));
            }
        }
        lines.push("-".repeat(50));
    }
    lines.join("\n")
}
