use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::model::{AppError, Id};
use crate::store::traits::{ChangeKind, PersistenceStore, StagedChange, StoredRecord};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::ConfigError(format!("Failed to run database migrations: {}", e)))
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Classify a driver error: unique violations, unavailability and missing rows
/// get their own kinds, everything else stays a database error.
pub fn map_sqlx_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return AppError::ObjectAlreadyExists(db_err.message().to_string());
        }
    }
    match err {
        sqlx::Error::PoolTimedOut => {
            AppError::ServiceNotAvailable("Timed out waiting for a database connection".to_string())
        }
        sqlx::Error::PoolClosed => {
            AppError::ServiceNotAvailable("Database connection pool is closed".to_string())
        }
        sqlx::Error::Io(io_err) => {
            AppError::ServiceNotAvailable(format!("Database is unreachable: {}", io_err))
        }
        sqlx::Error::RowNotFound => AppError::NotFound("Requested row was not found".to_string()),
        other => AppError::Database(other),
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> StoredRecord {
    StoredRecord {
        id: row.get("id"),
        data: row.get("data"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    }
}

#[async_trait::async_trait]
impl PersistenceStore for PostgresStore {
    async fn load_all(&self, entity_type: &str) -> Result<Vec<StoredRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT id, data, created_at, modified_at FROM entities WHERE entity_type = $1 ORDER BY created_at NULLS LAST, id",
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn load(&self, entity_type: &str, id: Id) -> Result<Option<StoredRecord>, AppError> {
        let row = sqlx::query(
            "SELECT id, data, created_at, modified_at FROM entities WHERE entity_type = $1 AND id = $2",
        )
        .bind(entity_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn apply(&self, changes: Vec<StagedChange>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for change in changes {
            match change.kind {
                ChangeKind::Added => {
                    sqlx::query(
                        "INSERT INTO entities (entity_type, id, data, created_at, modified_at) VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(change.entity_type)
                    .bind(change.id)
                    .bind(&change.data)
                    .bind(change.created_at)
                    .bind(change.modified_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                }
                ChangeKind::Modified => {
                    let result = sqlx::query(
                        "UPDATE entities SET data = $3, modified_at = COALESCE($4, modified_at) WHERE entity_type = $1 AND id = $2",
                    )
                    .bind(change.entity_type)
                    .bind(change.id)
                    .bind(&change.data)
                    .bind(change.modified_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

                    if result.rows_affected() == 0 {
                        return Err(AppError::not_found(change.entity_type, change.id));
                    }
                }
                ChangeKind::Deleted => {
                    let result =
                        sqlx::query("DELETE FROM entities WHERE entity_type = $1 AND id = $2")
                            .bind(change.entity_type)
                            .bind(change.id)
                            .execute(&mut *tx)
                            .await
                            .map_err(map_sqlx_error)?;

                    if result.rows_affected() == 0 {
                        return Err(AppError::not_found(change.entity_type, change.id));
                    }
                }
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_mean_service_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            AppError::ServiceNotAvailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            AppError::ServiceNotAvailable(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Io(io)),
            AppError::ServiceNotAvailable(_)
        ));
    }

    #[test]
    fn test_row_not_found_and_fallback() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::Protocol("bad frame".to_string())),
            AppError::Database(_)
        ));
    }

    const LIVE_ENTITY: &str = "LiveStoreCheck";

    async fn live_store() -> Option<PostgresStore> {
        let url = std::env::var("HENDRY_TEST_DATABASE_URL").ok()?;
        let store = PostgresStore::new(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    // Needs a reachable database: HENDRY_TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_apply_and_load_against_live_database() {
        let Some(store) = live_store().await else {
            return;
        };
        let first = Id::new_v4();
        let second = Id::new_v4();
        let stamp = chrono::Utc::now();

        let mut added = StagedChange::new(
            ChangeKind::Added,
            LIVE_ENTITY,
            first,
            serde_json::json!({ "name": "first" }),
        );
        added.created_at = Some(stamp);
        added.modified_at = Some(stamp);
        let later = StagedChange::new(
            ChangeKind::Added,
            LIVE_ENTITY,
            second,
            serde_json::json!({ "name": "second" }),
        );
        store.apply(vec![added, later]).await.unwrap();

        let loaded = store.load(LIVE_ENTITY, first).await.unwrap().unwrap();
        assert_eq!(loaded.data["name"], "first");
        assert!(loaded.created_at.is_some());

        let mine: Vec<Id> = store
            .load_all(LIVE_ENTITY)
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.id)
            .filter(|id| *id == first || *id == second)
            .collect();
        assert_eq!(mine, vec![first, second]);

        let modified = StagedChange::new(
            ChangeKind::Modified,
            LIVE_ENTITY,
            first,
            serde_json::json!({ "name": "renamed" }),
        );
        store.apply(vec![modified]).await.unwrap();
        let reloaded = store.load(LIVE_ENTITY, first).await.unwrap().unwrap();
        assert_eq!(reloaded.data["name"], "renamed");
        assert_eq!(reloaded.modified_at, loaded.modified_at);

        // A failing change rolls back the whole batch
        let deleted = StagedChange::new(ChangeKind::Deleted, LIVE_ENTITY, second, serde_json::json!({}));
        let missing = StagedChange::new(
            ChangeKind::Modified,
            LIVE_ENTITY,
            Id::new_v4(),
            serde_json::json!({}),
        );
        assert!(matches!(
            store.apply(vec![deleted, missing]).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.load(LIVE_ENTITY, second).await.unwrap().is_some());

        let deleted = StagedChange::new(ChangeKind::Deleted, LIVE_ENTITY, second, serde_json::json!({}));
        store.apply(vec![deleted]).await.unwrap();
        assert!(store.load(LIVE_ENTITY, second).await.unwrap().is_none());

        sqlx::query("DELETE FROM entities WHERE entity_type = $1")
            .bind(LIVE_ENTITY)
            .execute(store.pool())
            .await
            .unwrap();
    }
}
