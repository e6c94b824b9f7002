//! Redis service backing email reminder deduplication

use redis::Client;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    /// Claim a notification tag for `ttl_seconds`.
    ///
    /// Returns `false` when the tag was already claimed, meaning the
    /// notification has been delivered before and should be skipped.
    pub async fn claim_tag(&self, tag: &str, ttl_seconds: u64) -> AppResult<bool> {
        let mut conn = self.connection().await?;

        let key = format!("notification:tag:{}", tag);
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to claim notification tag in Redis: {}", e)))?;

        Ok(reply.is_some())
    }

    /// Forget a claimed tag so the notification can be sent again
    pub async fn release_tag(&self, tag: &str) -> AppResult<()> {
        let mut conn = self.connection().await?;

        let key = format!("notification:tag:{}", tag);
        redis::cmd("DEL")
            .arg(&key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to release notification tag in Redis: {}", e)))?;

        Ok(())
    }
}
