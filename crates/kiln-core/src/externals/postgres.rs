//! PostgreSQL database collaborator
//!
//! Managed tables are every base table in the configured schema except the
//! excluded ones. Cleaning truncates all of them in a single `TRUNCATE`
//! statement, which is atomic on its own and accepts foreign keys between
//! the listed tables; a managed table referenced from an excluded one makes
//! the truncate fail. Seeding runs with `session_replication_role = replica` so
//! foreign key triggers do not fire; the connecting role must be allowed to
//! set it (a superuser in a typical test database).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{Database, DatabaseError};
use crate::fixture::Fixture;
use crate::record::RawRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub schema: String,
    pub exclude_tables: Vec<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            schema: "public".to_string(),
            exclude_tables: Vec::new(),
            max_connections: 2,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Override values from `DATABASE_URL`, `DB_SCHEMA`, `DB_MAX_CONNECTIONS`
    /// and `DB_CONNECT_TIMEOUT`
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.url = url;
        }
        if let Ok(schema) = std::env::var("DB_SCHEMA") {
            self.schema = schema;
        }
        if let Some(max) = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.max_connections = max;
        }
        if let Some(timeout) = std::env::var("DB_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.connect_timeout_secs = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.url.trim().is_empty() {
            return Err(DatabaseError::config("database url is not set"));
        }
        if self.schema.trim().is_empty() {
            return Err(DatabaseError::config("database schema is empty"));
        }
        if self.max_connections == 0 {
            return Err(DatabaseError::config("max_connections must be at least 1"));
        }
        Ok(())
    }
}

pub struct PgDatabase {
    pool: PgPool,
    schema: String,
    exclude_tables: Vec<String>,
}

impl PgDatabase {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(
            schema = %config.schema,
            excluded = config.exclude_tables.len(),
            "Database connection pool created"
        );

        Ok(Self::from_pool(
            pool,
            config.schema.clone(),
            config.exclude_tables.clone(),
        ))
    }

    pub fn from_pool(pool: PgPool, schema: impl Into<String>, exclude_tables: Vec<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            exclude_tables,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Base tables in the schema minus exclusions, sorted by name
    pub async fn managed_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables
            .into_iter()
            .filter(|t| !self.exclude_tables.contains(t))
            .collect())
    }

    /// `schema.table`, or the table's own qualifier when it has one
    fn qualified(&self, table: &str) -> String {
        match table.split_once('.') {
            Some((schema, name)) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
            None => format!("{}.{}", quote_ident(&self.schema), quote_ident(table)),
        }
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let (schema, name) = table.split_once('.').unwrap_or((self.schema.as_str(), table));

        let columns = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(columns)
    }
}

#[async_trait]
impl Database for PgDatabase {
    #[instrument(skip(self))]
    async fn clean(&self) -> Result<usize, DatabaseError> {
        let tables = self.managed_tables().await?;
        if tables.is_empty() {
            return Ok(0);
        }

        let list = tables
            .iter()
            .map(|t| self.qualified(t))
            .collect::<Vec<_>>()
            .join(", ");

        sqlx::query(&format!("TRUNCATE TABLE {} RESTART IDENTITY", list))
            .execute(&self.pool)
            .await?;

        debug!(tables = tables.len(), "Truncated managed tables");
        Ok(tables.len())
    }

    #[instrument(skip(self, fixtures), fields(fixtures = fixtures.len()))]
    async fn seed(&self, fixtures: &[&Fixture]) -> Result<usize, DatabaseError> {
        if fixtures.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL session_replication_role = 'replica'")
            .execute(&mut *tx)
            .await?;

        for fixture in fixtures {
            let sql = insert_statement(&self.qualified(&fixture.table), &fixture.fields);
            let mut query = sqlx::query(&sql);
            if !fixture.fields.is_empty() {
                query = query.bind(Value::Object(fixture.fields.clone()));
            }

            query
                .execute(&mut *tx)
                .await
                .map_err(|source| DatabaseError::Seed {
                    fixture: fixture.name.clone(),
                    source,
                })?;
        }

        tx.commit().await?;
        Ok(fixtures.len())
    }

    #[instrument(skip(self))]
    async fn records(&self, table: &str, columns: &[String]) -> Result<Vec<RawRow>, DatabaseError> {
        let columns = if columns.is_empty() {
            self.table_columns(table).await?
        } else {
            columns.to_vec()
        };

        let select = columns
            .iter()
            .map(|c| format!("{}::text", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");

        let rows = sqlx::query(&format!("SELECT {} FROM {}", select, self.qualified(table)))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row_to_raw(row, &columns))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::from)
    }
}

/// Insert one row, letting PostgreSQL coerce JSON values to column types
fn insert_statement(qualified_table: &str, fields: &RawRow) -> String {
    if fields.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", qualified_table);
    }

    let columns = fields
        .keys()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)",
        table = qualified_table,
        columns = columns,
    )
}

fn row_to_raw(row: &PgRow, columns: &[String]) -> Result<RawRow, sqlx::Error> {
    let mut raw = RawRow::new();
    for (index, column) in columns.iter().enumerate() {
        let value: Option<String> = row.try_get(index)?;
        raw.insert(column.clone(), value.map(Value::String).unwrap_or(Value::Null));
    }
    Ok(raw)
}

/// Quote a PostgreSQL identifier, doubling embedded quotes
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_insert_statement_uses_populate_record() {
        let fields = json!({"id": 1, "name": "Ann"}).as_object().unwrap().clone();
        let sql = insert_statement("\"public\".\"users\"", &fields);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"users\" (\"id\", \"name\") SELECT \"id\", \"name\" \
             FROM jsonb_populate_record(NULL::\"public\".\"users\", $1)"
        );
    }

    #[test]
    fn test_insert_statement_without_fields() {
        assert_eq!(
            insert_statement("\"public\".\"t\"", &RawRow::new()),
            "INSERT INTO \"public\".\"t\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = DatabaseConfig::default();
        assert!(config.validate().is_err());

        config.url = "postgres://localhost/etl_test".to_string();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
