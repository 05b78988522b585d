use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::subscriptions::{
    database::SubscriptionDatabase, entities::PushSubscription, error::SubscriptionError,
};

/// Subscription registry that survives restarts.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the necessary tables if they don't exist
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                endpoint TEXT NOT NULL,
                descriptor TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl From<sqlx::Error> for SubscriptionError {
    fn from(err: sqlx::Error) -> Self {
        SubscriptionError::Database(err.to_string())
    }
}

#[async_trait]
impl SubscriptionDatabase for SqliteDatabase {
    async fn add_subscription(
        &self,
        subscription: PushSubscription,
    ) -> Result<bool, SubscriptionError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, endpoint, descriptor, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(subscription.id())
        .bind(subscription.endpoint())
        .bind(subscription.canonical_json())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_subscriptions(&self) -> Result<Vec<PushSubscription>, SubscriptionError> {
        let rows = sqlx::query("SELECT id, descriptor FROM subscriptions")
            .fetch_all(&self.pool)
            .await?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let descriptor: String = row.try_get("descriptor")?;

            let parsed = serde_json::from_str(&descriptor)
                .map_err(|err| SubscriptionError::Database(err.to_string()))
                .and_then(PushSubscription::try_from_value);
            match parsed {
                Ok(subscription) => subscriptions.push(subscription),
                Err(err) => warn!(id = %id, "Skipping unreadable subscription row: {}", err),
            }
        }

        Ok(subscriptions)
    }

    async fn remove_subscription(
        &self,
        subscription: &PushSubscription,
    ) -> Result<bool, SubscriptionError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(subscription.id())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_subscriptions(&self) -> Result<usize, SubscriptionError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM subscriptions")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        Ok(count as usize)
    }
}
