use crate::application::ports::KeyValueStore;
use crate::infrastructure::database::DbPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: DbPool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const UPSERT: &str = r#"
    INSERT INTO kv_store (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), AppError> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_many(&self, entries: Vec<(String, String)>) -> Result<(), AppError> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_store() -> SqliteKeyValueStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteKeyValueStore::new(pool)
    }

    #[tokio::test]
    async fn test_put_get_overwrite_remove() {
        let store = setup_store().await;
        assert_eq!(store.get("students").await.unwrap(), None);

        store.put("students", "[]".into()).await.unwrap();
        store.put("students", "[1]".into()).await.unwrap();
        assert_eq!(store.get("students").await.unwrap().as_deref(), Some("[1]"));

        store.remove("students").await.unwrap();
        assert_eq!(store.get("students").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_many_writes_every_entry() {
        let store = setup_store().await;
        store
            .put_many(vec![
                ("students".into(), "[]".into()),
                ("pendingOperations".into(), "{}".into()),
            ])
            .await
            .unwrap();
        assert_eq!(store.get("students").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.get("pendingOperations").await.unwrap().as_deref(),
            Some("{}")
        );
    }
}
