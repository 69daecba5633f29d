//! Schema migrations
//!
//! Migrations are embedded at compile time and versioned by unix timestamp.
//! `{schema}` placeholders are replaced with the configured schema name.

use deadpool_postgres::Object;

use crate::error::{ApiError, ApiResult};

/// A migration with its timestamp and SQL content
struct Migration {
    timestamp: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    timestamp: 1680307200,
    name: "create_contact",
    sql: include_str!("../migrations/1680307200_create_contact.sql"),
}];

/// Apply every migration newer than the recorded schema version.
pub async fn run_migrations(conn: &mut Object, schema: &str) -> ApiResult<()> {
    conn.batch_execute(&format!(
        "CREATE SCHEMA IF NOT EXISTS {schema};
         CREATE TABLE IF NOT EXISTS {schema}.schema_version (
             version    BIGINT PRIMARY KEY,
             name       TEXT NOT NULL,
             applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
         );",
        schema = schema
    ))
    .await?;

    let row = conn
        .query_one(
            &format!("SELECT COALESCE(MAX(version), 0) FROM {}.schema_version", schema),
            &[],
        )
        .await?;
    let current: i64 = row.try_get(0)?;

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.timestamp > current).collect();
    if pending.is_empty() {
        tracing::info!(schema, version = current, "Schema is up to date");
        return Ok(());
    }

    let tx = conn.transaction().await?;
    for migration in pending {
        tracing::info!(
            schema,
            version = migration.timestamp,
            name = migration.name,
            "Applying migration"
        );
        tx.batch_execute(&render(migration.sql, schema)).await?;
        tx.execute(
            &format!(
                "INSERT INTO {}.schema_version (version, name) VALUES ($1, $2)",
                schema
            ),
            &[&migration.timestamp, &migration.name],
        )
        .await?;
    }
    tx.commit().await.map_err(|e| {
        tracing::error!("Migration commit failed: {:?}", e);
        ApiError::database_error("Failed to commit schema migration")
    })
}

fn render(sql: &str, schema: &str) -> String {
    sql.replace("{schema}", schema)
}
