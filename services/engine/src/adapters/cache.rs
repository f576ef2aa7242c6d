//! services/engine/src/adapters/cache.rs
//!
//! This module contains the local session cache adapter, which is the
//! concrete implementation of the `SessionCacheService` port from the `core`
//! crate. Sessions are stored one row per user in a SQLite file next to the
//! engine, so the working session survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use recap_core::domain::Session;
use recap_core::ports::{PortError, PortResult, SessionCacheService};
use sqlx::{FromRow, SqlitePool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A session cache adapter that implements the `SessionCacheService` port.
#[derive(Clone)]
pub struct SqliteCacheAdapter {
    pool: SqlitePool,
}

impl SqliteCacheAdapter {
    /// Creates a new `SqliteCacheAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[derive(FromRow)]
struct SessionRow {
    payload: String,
}

//=========================================================================================
// `SessionCacheService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionCacheService for SqliteCacheAdapter {
    async fn save(&self, user_id: &str, session: &Session) -> PortResult<()> {
        let payload =
            serde_json::to_string(session).map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO sessions (user_id, payload, saved_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at",
        )
        .bind(user_id)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, user_id: &str) -> PortResult<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT payload FROM sessions WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        match row {
            Some(row) => {
                let session = serde_json::from_str(&row.payload)
                    .map_err(|e| PortError::Unexpected(format!("Corrupt cached session: {}", e)))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, user_id: &str) -> PortResult<()> {
        // Deleting an absent row succeeds, which makes clearing idempotent.
        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
