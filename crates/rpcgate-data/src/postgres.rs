//! PostgreSQL-backed record repository.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, instrument};

use crate::error::{DataError, RecordLookup, Result};
use crate::interrupt::Interrupt;
use crate::record::{ConfigRecord, RecordId, RecordRepository, ensure_within_bounds};
use crate::settings::StoreSettings;

/// SQLSTATE raised when text cannot be cast to a number.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
/// SQLSTATE raised when a cast or `+ 1` leaves the `BIGINT` range.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

const FETCH_BY_ID_CALL: &str = r"SELECT * FROM rpcgate_config.fetch_config_by_id(_id => $1)";

const FETCH_BY_NAME_CALL: &str =
    r"SELECT * FROM rpcgate_config.fetch_config_by_name(_name => $1)";

const FETCH_BY_NAMES_CALL: &str =
    r"SELECT * FROM rpcgate_config.fetch_configs_by_names(_names => $1)";

const FETCH_BY_PREFIX_CALL: &str =
    r"SELECT * FROM rpcgate_config.fetch_configs_by_prefix(_prefix => $1)";

const UPSERT_CALL: &str = r"SELECT rpcgate_config.upsert_config(_name => $1, _value => $2)";

const DELETE_CALL: &str = r"SELECT rpcgate_config.delete_config(_name => $1)";

const INCREMENT_CALL: &str = r"SELECT rpcgate_config.increment_counter(_name => $1)";

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::from_query(operation, source)
}

/// Apply the embedded configuration migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    Ok(())
}

/// Database-backed repository for configuration records.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    interrupt: Interrupt,
}

impl PgRecordStore {
    /// Wrap an existing pool, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail or the database is unreachable.
    pub async fn new(pool: PgPool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self {
            pool,
            interrupt: Interrupt::none(),
        })
    }

    /// Establish a pool from `settings` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or migrations fail.
    #[instrument(name = "record_store.connect", skip(settings), fields(max_connections = settings.max_connections))]
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.database_url)
            .await
            .map_err(|source| DataError::ConnectFailed { source })?;

        let mut store = Self::new(pool).await?;
        if let Some(deadline) = settings.statement_deadline {
            store.interrupt = store.interrupt.with_deadline(deadline);
        }
        Ok(store)
    }

    /// Return a copy of the store that applies `interrupt` to every operation.
    #[must_use]
    pub fn with_interrupt(&self, interrupt: Interrupt) -> Self {
        Self {
            pool: self.pool.clone(),
            interrupt,
        }
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordRepository for PgRecordStore {
    async fn load_records(&self, names: &[String]) -> Result<Vec<ConfigRecord>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let operation = "load config records by names";
        self.interrupt
            .run(operation, async {
                sqlx::query_as::<_, ConfigRecord>(FETCH_BY_NAMES_CALL)
                    .bind(names.to_vec())
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await
    }

    async fn load_by_name(&self, name: &str) -> Result<Option<ConfigRecord>> {
        let operation = "load config record by name";
        self.interrupt
            .run(operation, async {
                sqlx::query_as::<_, ConfigRecord>(FETCH_BY_NAME_CALL)
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await
    }

    async fn load_by_prefix(&self, prefix: &str) -> Result<Vec<ConfigRecord>> {
        let operation = "load config records by prefix";
        self.interrupt
            .run(operation, async {
                sqlx::query_as::<_, ConfigRecord>(FETCH_BY_PREFIX_CALL)
                    .bind(prefix)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await
    }

    async fn load_by_id(&self, id: RecordId) -> Result<ConfigRecord> {
        let operation = "load config record by id";
        let record = self
            .interrupt
            .run(operation, async {
                sqlx::query_as::<_, ConfigRecord>(FETCH_BY_ID_CALL)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await?;
        record.ok_or(DataError::RecordNotFound {
            lookup: RecordLookup::Id(id),
        })
    }

    async fn upsert(&self, name: &str, value: &str) -> Result<RecordId> {
        ensure_within_bounds(name, value)?;
        let operation = "upsert config record";
        let id = self
            .interrupt
            .run(operation, async {
                sqlx::query_scalar::<_, RecordId>(UPSERT_CALL)
                    .bind(name)
                    .bind(value)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await?;
        debug!(record_id = id, record_name = name, "stored config record");
        Ok(id)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let operation = "delete config record";
        let existed = self
            .interrupt
            .run(operation, async {
                sqlx::query_scalar::<_, bool>(DELETE_CALL)
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_query_err(operation))
            })
            .await?;
        debug!(record_name = name, existed, "deleted config record");
        Ok(existed)
    }

    async fn increment(&self, name: &str) -> Result<i64> {
        let operation = "increment config counter";
        self.interrupt
            .run(operation, async {
                sqlx::query_scalar::<_, i64>(INCREMENT_CALL)
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|source| {
                        if has_sqlstate(&source, INVALID_TEXT_REPRESENTATION) {
                            DataError::NonNumericCounter {
                                name: name.to_string(),
                                value: None,
                            }
                        } else if has_sqlstate(&source, NUMERIC_VALUE_OUT_OF_RANGE) {
                            DataError::CounterOverflow {
                                name: name.to_string(),
                            }
                        } else {
                            DataError::from_query(operation, source)
                        }
                    })
            })
            .await
    }
}

fn has_sqlstate(error: &sqlx::Error, expected: &str) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| code == expected),
        _ => false,
    }
}
