use std::path::Path;

use async_trait::async_trait;
use const_format::concatcp;
use sqlx::{query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};

use super::{constants::*, KeyValueStore, PersistenceError};

/// Key/value store backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await
                .map_err(|_| PersistenceError::Database(format!("Failed to create database directory: {:?}", parent)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|_| PersistenceError::Database(format!("Failed to connect to database {:?}", path)))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Private in-memory database. Held on one connection that is never recycled,
    /// since every new connection would see an empty database.
    pub async fn connect_in_memory() -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::new().in_memory(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|_| PersistenceError::Database("Failed to open in-memory database".to_string()))?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<(), PersistenceError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", KEY_VALUE_TABLE_NAME, "(",
                KEY,   " TEXT PRIMARY KEY,",
                VALUE, " TEXT NOT NULL
            )")).await
            .map_err(|_| PersistenceError::Database("Failed to create key/value table".to_string()))
            .map(|_| ())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        query_as::<_, (String,)>(concatcp!("SELECT ", VALUE, " FROM ", KEY_VALUE_TABLE_NAME, " WHERE ", KEY, " = ?1"))
            .bind(key)
            .fetch_optional(&self.pool).await
            .map_err(|_| PersistenceError::Database(format!("Failed to read key {key}")))
            .map(|row| row.map(|row| row.0))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        query(concatcp!("
            INSERT INTO ", KEY_VALUE_TABLE_NAME, "(", KEY, ", ", VALUE, ")
            VALUES (?1, ?2)
            ON CONFLICT(", KEY, ") DO UPDATE SET ", VALUE, " = excluded.", VALUE))
            .bind(key)
            .bind(value)
            .execute(&self.pool).await
            .map_err(|_| PersistenceError::Database(format!("Failed to write key {key}")))
            .map(|_| ())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        query(concatcp!("DELETE FROM ", KEY_VALUE_TABLE_NAME))
            .execute(&self.pool).await
            .map_err(|_| PersistenceError::Database("Failed to clear key/value table".to_string()))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_overwrite_clear() {
        let db = SqliteStore::connect_in_memory().await.unwrap();

        assert_eq!(db.get("tracks").await.unwrap(), None);

        db.set("tracks", "[]").await.unwrap();
        db.set("colors", "[\"#000000\"]").await.unwrap();
        db.set("tracks", "[1]").await.unwrap();

        assert_eq!(db.get("tracks").await.unwrap().as_deref(), Some("[1]"));
        assert_eq!(db.get("colors").await.unwrap().as_deref(), Some("[\"#000000\"]"));

        db.clear().await.unwrap();
        assert_eq!(db.get("tracks").await.unwrap(), None);
        assert_eq!(db.get("colors").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_database_creates_directory_and_persists() {
        let dir = std::env::temp_dir().join(format!("gpx_viewer_sqlite_{}", std::process::id()));
        let path = dir.join("nested").join("viewer.db");
        let _ = tokio::fs::remove_dir_all(&dir).await;

        let db = SqliteStore::connect(&path).await.unwrap();
        assert!(path.exists());
        db.set("settings", r#"{"sidebar_open":false}"#).await.unwrap();
        db.pool.close().await;

        let reopened = SqliteStore::connect(&path).await.unwrap();
        assert_eq!(reopened.get("settings").await.unwrap().as_deref(), Some(r#"{"sidebar_open":false}"#));
        reopened.pool.close().await;

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
