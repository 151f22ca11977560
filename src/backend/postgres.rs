use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use tracing::debug;

use crate::backend::{CellValue, ColumnRow, Connector, Session, StatementError, StatementOutput};
use crate::catalog::ForeignKey;
use crate::config::ConnectionProfile;
use crate::error::SqlbotError;

const TABLES_SQL: &str = "
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema::text = $1
    ORDER BY table_name";

const COLUMNS_SQL: &str = "
    SELECT
        c.column_name::text,
        c.data_type::text,
        EXISTS (
            SELECT 1
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
             AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
              AND tc.table_schema = c.table_schema
              AND tc.table_name = c.table_name
              AND kcu.column_name = c.column_name
        ) AS is_primary_key
    FROM information_schema.columns c
    WHERE c.table_schema::text = $1 AND c.table_name::text = $2
    ORDER BY c.ordinal_position";

/// Local and referenced columns are paired by position, so a composite key
/// yields one row per column pair.
const FOREIGN_KEYS_SQL: &str = "
    SELECT
        kcu.column_name::text,
        ref.table_name::text AS referenced_table,
        ref.column_name::text AS referenced_column
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_schema = tc.constraint_schema
     AND kcu.constraint_name = tc.constraint_name
     AND kcu.table_name = tc.table_name
    JOIN information_schema.referential_constraints rc
      ON rc.constraint_schema = tc.constraint_schema
     AND rc.constraint_name = tc.constraint_name
    JOIN information_schema.key_column_usage ref
      ON ref.constraint_schema = rc.unique_constraint_schema
     AND ref.constraint_name = rc.unique_constraint_name
     AND ref.ordinal_position = kcu.position_in_unique_constraint
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema::text = $1
      AND tc.table_name::text = $2
    ORDER BY tc.constraint_name, kcu.ordinal_position";

/// Opens `tokio-postgres` connections without TLS.
pub struct PostgresConnector {
    connect_timeout: Duration,
}

impl PostgresConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn client_config(&self, profile: &ConnectionProfile) -> Config {
        let mut config = Config::new();
        config
            .host(&profile.host)
            .port(profile.port)
            .user(&profile.user)
            .dbname(&profile.database)
            .application_name("sqlbot")
            .connect_timeout(self.connect_timeout);
        if let Some(ref password) = profile.password {
            config.password(password.expose_secret());
        }
        config
    }
}

pub struct PostgresSession {
    client: Client,
    connection: JoinHandle<()>,
}

impl Connector for PostgresConnector {
    type Session = PostgresSession;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<PostgresSession, SqlbotError> {
        let (client, connection) = self
            .client_config(profile)
            .connect(NoTls)
            .await
            .map_err(|e| SqlbotError::Connection {
                message: format!("cannot connect to {}: {}", profile.address(), e),
            })?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(%e, "postgres connection errored");
            }
        });

        Ok(PostgresSession { client, connection })
    }
}

fn introspection_error(e: tokio_postgres::Error) -> SqlbotError {
    SqlbotError::Connection {
        message: format!("catalog introspection failed: {}", e),
    }
}

/// Keep the server's own message when there is one.
fn statement_error(e: tokio_postgres::Error) -> StatementError {
    match e.as_db_error() {
        Some(db) => StatementError::new(db.message()),
        None => StatementError::new(e.to_string()),
    }
}

impl Session for PostgresSession {
    async fn list_tables(&mut self, schema: &str) -> Result<Vec<String>, SqlbotError> {
        let rows = self
            .client
            .query(TABLES_SQL, &[&schema])
            .await
            .map_err(introspection_error)?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(introspection_error)
    }

    async fn list_columns(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnRow>, SqlbotError> {
        let rows = self
            .client
            .query(COLUMNS_SQL, &[&schema, &table])
            .await
            .map_err(introspection_error)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnRow {
                name: row.try_get(0).map_err(introspection_error)?,
                data_type: row.try_get(1).map_err(introspection_error)?,
                primary_key: row.try_get(2).map_err(introspection_error)?,
            });
        }
        Ok(columns)
    }

    async fn list_foreign_keys(
        &mut self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKey>, SqlbotError> {
        let rows = self
            .client
            .query(FOREIGN_KEYS_SQL, &[&schema, &table])
            .await
            .map_err(introspection_error)?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(ForeignKey {
                column: row.try_get(0).map_err(introspection_error)?,
                referenced_table: row.try_get(1).map_err(introspection_error)?,
                referenced_column: row.try_get(2).map_err(introspection_error)?,
            });
        }
        Ok(keys)
    }

    async fn begin(&mut self) -> Result<(), StatementError> {
        self.client.batch_execute("BEGIN").await.map_err(statement_error)
    }

    async fn run(&mut self, sql: &str) -> Result<StatementOutput, StatementError> {
        // The simple-query protocol accepts any statement text, including
        // dollar-quoted routine bodies, and returns every value as text.
        let messages = self.client.simple_query(sql).await.map_err(statement_error)?;

        let mut output = StatementOutput::default();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    output.columns = columns.iter().map(|c| c.name().to_string()).collect();
                    output.rows.clear();
                }
                SimpleQueryMessage::Row(row) => {
                    if output.columns.is_empty() {
                        output.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|i| match row.get(i) {
                            Some(text) => CellValue::Text(text.to_string()),
                            None => CellValue::Null,
                        })
                        .collect();
                    output.rows.push(values);
                }
                _ => {}
            }
        }
        Ok(output)
    }

    async fn commit(&mut self) -> Result<(), StatementError> {
        self.client.batch_execute("COMMIT").await.map_err(statement_error)
    }

    async fn rollback(&mut self) -> Result<(), StatementError> {
        self.client.batch_execute("ROLLBACK").await.map_err(statement_error)
    }

    async fn close(self) {
        drop(self.client);
        if let Err(e) = self.connection.await {
            debug!(%e, "postgres connection task did not finish cleanly");
        }
    }
}
