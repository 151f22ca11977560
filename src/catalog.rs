use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::backend::{Connector, Session};
use crate::config::{ConnectionProfile, ProfileKey};
use crate::error::SqlbotError;
use crate::verbose::Timer;

/// Declared type and key flag of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub data_type: String,
    pub primary_key: bool,
}

/// An outgoing foreign key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub columns: IndexMap<String, ColumnInfo>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn primary_key(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, info)| info.primary_key)
            .map(|(name, _)| name.as_str())
    }
}

/// Snapshot of the tables, columns and foreign keys visible under a
/// profile's schema at load time. Not live: reload to observe changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    tables: IndexMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: TableSchema) {
        self.tables.insert(name.into(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSchema)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Introspect the database behind `profile`. Opens one connection and
/// closes it before returning, whatever the outcome.
pub async fn load<C: Connector>(
    connector: &C,
    profile: &ConnectionProfile,
) -> Result<SchemaCatalog, SqlbotError> {
    let timer = Timer::start();
    let mut session = connector.connect(profile).await?;
    let result = introspect(&mut session, &profile.schema).await;
    session.close().await;

    if let Ok(ref catalog) = result {
        debug!(
            tables = catalog.len(),
            elapsed_ms = timer.elapsed_ms() as u64,
            "catalog loaded for {}",
            profile.address()
        );
    }
    result
}

async fn introspect<S: Session>(session: &mut S, schema: &str) -> Result<SchemaCatalog, SqlbotError> {
    let mut catalog = SchemaCatalog::new();

    for table in session.list_tables(schema).await? {
        let columns = session
            .list_columns(schema, &table)
            .await?
            .into_iter()
            .map(|col| {
                (
                    col.name,
                    ColumnInfo {
                        data_type: col.data_type,
                        primary_key: col.primary_key,
                    },
                )
            })
            .collect();
        let foreign_keys = session.list_foreign_keys(schema, &table).await?;

        catalog.insert(
            table,
            TableSchema {
                columns,
                foreign_keys,
            },
        );
    }

    Ok(catalog)
}

/// Catalog snapshots memoized by profile identity. No TTL: entries live
/// until invalidated.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: RwLock<HashMap<ProfileKey, Arc<SchemaCatalog>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, profile: &ConnectionProfile) -> Option<Arc<SchemaCatalog>> {
        self.entries.read().get(&profile.key()).cloned()
    }

    /// Return the cached snapshot for `profile`, introspecting on a miss.
    pub async fn load<C: Connector>(
        &self,
        connector: &C,
        profile: &ConnectionProfile,
    ) -> Result<Arc<SchemaCatalog>, SqlbotError> {
        if let Some(hit) = self.get(profile) {
            debug!("catalog cache hit for {}", profile.address());
            return Ok(hit);
        }

        let loaded = Arc::new(load(connector, profile).await?);

        // A concurrent loader may have won the race; keep whichever snapshot
        // landed first so every caller sees the same one.
        let mut entries = self.entries.write();
        Ok(entries.entry(profile.key()).or_insert(loaded).clone())
    }

    /// Drop the snapshot for `profile`. Returns whether one was cached.
    pub fn invalidate(&self, profile: &ConnectionProfile) -> bool {
        self.entries.write().remove(&profile.key()).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
