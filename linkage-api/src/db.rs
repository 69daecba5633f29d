//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling with deadpool-postgres and the
//! `ContactStore` implementation backed by the `contact` table.
//!
//! Queries are rendered once per client with the configured schema name,
//! which is validated as a plain SQL identifier before use.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use linkage_core::{
    ContactId, ContactRecord, LinkPrecedence, NewContact, StoreError, StoreResult, Timestamp,
};
use linkage_storage::{ContactStore, StoreOperation};
use regex::Regex;
use tokio_postgres::{NoTls, Row};

use crate::error::{ApiError, ApiResult};
use crate::migrations;
use crate::telemetry::METRICS;

/// Valid unquoted Postgres identifier.
const SCHEMA_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the individual fields
    pub url: Option<String>,
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Schema holding the contact table
    pub schema: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Apply pending migrations at startup
    pub migrate: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "linkage".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            schema: "public".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            migrate: true,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Fails when `LINKAGE_DB_SCHEMA` is not a plain identifier.
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();
        let config = Self {
            url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            host: std::env::var("LINKAGE_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("LINKAGE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("LINKAGE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("LINKAGE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("LINKAGE_DB_PASSWORD").unwrap_or_default(),
            schema: std::env::var("LINKAGE_DB_SCHEMA").unwrap_or(defaults.schema),
            max_size: std::env::var("LINKAGE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("LINKAGE_DB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            migrate: std::env::var("LINKAGE_DB_MIGRATE")
                .map(|s| !matches!(s.trim(), "false" | "0" | "no"))
                .unwrap_or(defaults.migrate),
        };
        config.validate_schema()?;
        Ok(config)
    }

    /// Reject schema names that would need quoting.
    pub fn validate_schema(&self) -> ApiResult<()> {
        let pattern = Regex::new(SCHEMA_PATTERN)
            .map_err(|e| ApiError::internal_error(format!("Invalid schema pattern: {}", e)))?;
        if pattern.is_match(&self.schema) {
            Ok(())
        } else {
            Err(ApiError::invalid_input(format!(
                "Invalid database schema name: {}",
                self.schema
            )))
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(self.max_size);
        pool_config.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SQL
// ============================================================================

const CONTACT_COLUMNS: &str =
    "id, phone_number, email, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// Contact queries rendered for one schema.
#[derive(Debug)]
struct ContactQueries {
    find_by_phone: String,
    find_by_email: String,
    find_by_linked_id: String,
    find_by_id: String,
    insert: String,
    update: String,
}

impl ContactQueries {
    /// Every statement that reads or rewrites a row skips soft-deleted
    /// records; `deleted_at` is only ever set outside this service.
    fn for_schema(schema: &str) -> Self {
        let table = format!("{}.contact", schema);
        Self {
            find_by_phone: format!(
                "SELECT {CONTACT_COLUMNS} FROM {table} \
                 WHERE phone_number = $1 AND deleted_at IS NULL \
                 ORDER BY created_at ASC, id ASC"
            ),
            find_by_email: format!(
                "SELECT {CONTACT_COLUMNS} FROM {table} \
                 WHERE email = $1 AND deleted_at IS NULL \
                 ORDER BY created_at ASC, id ASC"
            ),
            find_by_linked_id: format!(
                "SELECT {CONTACT_COLUMNS} FROM {table} \
                 WHERE linked_id = $1 AND deleted_at IS NULL \
                 ORDER BY id ASC"
            ),
            find_by_id: format!(
                "SELECT {CONTACT_COLUMNS} FROM {table} \
                 WHERE id = $1 AND deleted_at IS NULL"
            ),
            insert: format!(
                "INSERT INTO {table} \
                 (phone_number, email, linked_id, link_precedence, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING {CONTACT_COLUMNS}"
            ),
            update: format!(
                "UPDATE {table} SET phone_number = $1, email = $2, linked_id = $3, \
                 link_precedence = $4, updated_at = GREATEST($5, now()) \
                 WHERE id = $6 AND deleted_at IS NULL \
                 RETURNING {CONTACT_COLUMNS}"
            ),
        }
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Opaque reason for a driver error; the full error is only logged.
fn driver_reason(err: &tokio_postgres::Error) -> String {
    tracing::error!("Database error: {:?}", err);
    match err.as_db_error() {
        Some(db) => format!("database rejected statement (sqlstate {})", db.code().code()),
        None if err.is_closed() => "connection closed".to_string(),
        None => "database operation failed".to_string(),
    }
}

fn query_failed(op: StoreOperation) -> impl FnOnce(tokio_postgres::Error) -> StoreError {
    move |err| StoreError::QueryFailed {
        operation: op.as_str(),
        reason: driver_reason(&err),
    }
}

fn pool_error(err: PoolError) -> StoreError {
    tracing::error!("Connection pool error: {:?}", err);
    match err {
        PoolError::Timeout(_) => StoreError::PoolExhausted,
        PoolError::Closed => StoreError::Connection {
            reason: "connection pool is closed".to_string(),
        },
        _ => StoreError::Connection {
            reason: "failed to acquire database connection".to_string(),
        },
    }
}

fn row_to_contact(row: &Row) -> StoreResult<ContactRecord> {
    let decode = |err: tokio_postgres::Error| StoreError::QueryFailed {
        operation: "decode_contact",
        reason: driver_reason(&err),
    };

    let precedence: String = row.try_get("link_precedence").map_err(decode)?;
    let link_precedence =
        LinkPrecedence::from_db_str(&precedence).map_err(|e| StoreError::QueryFailed {
            operation: "decode_contact",
            reason: e.to_string(),
        })?;

    Ok(ContactRecord {
        id: ContactId::new(row.try_get::<_, i64>("id").map_err(decode)?),
        phone_number: row.try_get("phone_number").map_err(decode)?,
        email: row.try_get("email").map_err(decode)?,
        linked_id: row
            .try_get::<_, Option<i64>>("linked_id")
            .map_err(decode)?
            .map(ContactId::new),
        link_precedence,
        created_at: row.try_get::<_, Timestamp>("created_at").map_err(decode)?,
        updated_at: row.try_get::<_, Timestamp>("updated_at").map_err(decode)?,
        deleted_at: row.try_get::<_, Option<Timestamp>>("deleted_at").map_err(decode)?,
    })
}

fn rows_to_contacts(rows: &[Row]) -> StoreResult<Vec<ContactRecord>> {
    rows.iter().map(row_to_contact).collect()
}

/// Run a store operation, recording its duration and result.
async fn timed<T, F>(op: StoreOperation, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    let start = Instant::now();
    let result = fut.await;
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_store_operation(op.as_str(), result.is_ok(), start.elapsed().as_secs_f64());
    }
    result
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Contact store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
    schema: String,
    queries: Arc<ContactQueries>,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        let queries = Arc::new(ContactQueries::for_schema(&schema));
        Self {
            pool,
            schema,
            queries,
        }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        config.validate_schema()?;
        let pool = config.create_pool()?;
        Ok(Self::new(pool, config.schema.clone()))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        let status = self.pool.status();
        status.size
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> ApiResult<()> {
        let mut conn = self.pool.get().await.map_err(ApiError::from)?;
        migrations::run_migrations(&mut conn, &self.schema).await
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_error)
    }

    async fn query_contacts(
        &self,
        op: StoreOperation,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> StoreResult<Vec<ContactRecord>> {
        timed(op, async {
            let conn = self.get_conn().await?;
            let rows = conn.query(sql, params).await.map_err(query_failed(op))?;
            rows_to_contacts(&rows)
        })
        .await
    }
}

#[async_trait]
impl ContactStore for DbClient {
    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Vec<ContactRecord>> {
        self.query_contacts(
            StoreOperation::FindByPhone,
            &self.queries.find_by_phone,
            &[&phone_number],
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Vec<ContactRecord>> {
        self.query_contacts(
            StoreOperation::FindByEmail,
            &self.queries.find_by_email,
            &[&email],
        )
        .await
    }

    async fn find_by_linked_id(&self, id: ContactId) -> StoreResult<Vec<ContactRecord>> {
        self.query_contacts(
            StoreOperation::FindByLinkedId,
            &self.queries.find_by_linked_id,
            &[&id.get()],
        )
        .await
    }

    async fn find_by_id(&self, id: ContactId) -> StoreResult<Option<ContactRecord>> {
        let op = StoreOperation::FindById;
        timed(op, async {
            let conn = self.get_conn().await?;
            let row = conn
                .query_opt(&self.queries.find_by_id, &[&id.get()])
                .await
                .map_err(query_failed(op))?;
            row.as_ref().map(row_to_contact).transpose()
        })
        .await
    }

    async fn insert(&self, contact: &NewContact) -> StoreResult<ContactRecord> {
        contact
            .validate()
            .map_err(|reason| StoreError::InsertFailed { reason })?;

        timed(StoreOperation::Insert, async {
            let conn = self.get_conn().await?;
            let linked_id = contact.linked_id.map(ContactId::get);
            let row = conn
                .query_one(
                    &self.queries.insert,
                    &[
                        &contact.phone_number,
                        &contact.email,
                        &linked_id,
                        &contact.link_precedence.as_db_str(),
                        &contact.created_at,
                        &contact.updated_at,
                    ],
                )
                .await
                .map_err(|err| StoreError::InsertFailed {
                    reason: driver_reason(&err),
                })?;
            row_to_contact(&row)
        })
        .await
    }

    async fn update(&self, contact: &ContactRecord) -> StoreResult<ContactRecord> {
        timed(StoreOperation::Update, async {
            let conn = self.get_conn().await?;
            let linked_id = contact.linked_id.map(ContactId::get);
            let row = conn
                .query_opt(
                    &self.queries.update,
                    &[
                        &contact.phone_number,
                        &contact.email,
                        &linked_id,
                        &contact.link_precedence.as_db_str(),
                        &contact.updated_at,
                        &contact.id.get(),
                    ],
                )
                .await
                .map_err(|err| StoreError::UpdateFailed {
                    id: contact.id,
                    reason: driver_reason(&err),
                })?;
            match row {
                Some(row) => row_to_contact(&row),
                None => Err(StoreError::NotFound { id: contact.id }),
            }
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        timed(StoreOperation::HealthCheck, async {
            let conn = self.get_conn().await?;
            conn.query_one("SELECT 1", &[])
                .await
                .map_err(|err| StoreError::Connection {
                    reason: driver_reason(&err),
                })?;
            Ok(())
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.schema, "public");
        assert_eq!(config.max_size, 16);
        assert!(config.url.is_none());
        assert!(config.migrate);
    }

    #[test]
    fn test_validate_schema() {
        let ok = DbConfig {
            schema: "identity_v2".to_string(),
            ..DbConfig::default()
        };
        assert!(ok.validate_schema().is_ok());

        for bad in ["", "1contact", "public; DROP TABLE contact", "a-b", "\"quoted\""] {
            let config = DbConfig {
                schema: bad.to_string(),
                ..DbConfig::default()
            };
            assert!(config.validate_schema().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_queries_use_schema_and_ordering() {
        let queries = ContactQueries::for_schema("identity");
        assert!(queries.find_by_email.contains("FROM identity.contact"));
        assert!(queries
            .find_by_phone
            .contains("ORDER BY created_at ASC, id ASC"));
        assert!(queries.find_by_linked_id.ends_with("ORDER BY id ASC"));
        for sql in [
            &queries.find_by_phone,
            &queries.find_by_email,
            &queries.find_by_linked_id,
            &queries.find_by_id,
            &queries.update,
        ] {
            assert!(sql.contains("deleted_at IS NULL"), "{}", sql);
        }
        assert!(queries.insert.contains("RETURNING id, phone_number"));
        assert!(queries.update.contains("GREATEST($5, now())"));
    }

    #[test]
    fn test_pool_error_mapping() {
        assert_eq!(
            pool_error(PoolError::Timeout(deadpool_postgres::TimeoutType::Wait)),
            StoreError::PoolExhausted
        );
        assert!(matches!(
            pool_error(PoolError::Closed),
            StoreError::Connection { .. }
        ));
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() -> ApiResult<()> {
        let config = DbConfig {
            url: Some("postgres://postgres@127.0.0.1:1/linkage".to_string()),
            ..DbConfig::default()
        };
        let client = DbClient::from_config(&config)?;
        assert_eq!(client.pool_size(), 0);
        assert_eq!(client.backend(), "postgres");
        Ok(())
    }
}
