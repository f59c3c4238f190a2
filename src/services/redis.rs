//! Redis service for one-time account verification codes

use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

fn otp_key(user_id: Uuid) -> String {
    format!("otp:account:{}", user_id)
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let service = Self { client };

        // Test connection
        let mut conn = service.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(service)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }

    /// Store a verification code, replacing any previous one
    pub async fn store_otp(&self, user_id: Uuid, code: &str, expiration_seconds: u64) -> AppResult<()> {
        let mut conn = self.connection().await?;

        conn.set_ex::<_, _, ()>(otp_key(user_id), code, expiration_seconds)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store OTP in Redis: {}", e)))?;

        Ok(())
    }

    /// Verify and consume a verification code
    pub async fn verify_otp(&self, user_id: Uuid, code: &str) -> AppResult<bool> {
        let mut conn = self.connection().await?;
        let key = otp_key(user_id);

        let stored_code: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get OTP from Redis: {}", e)))?;

        match stored_code {
            Some(stored) if stored == code => {
                // One-time use
                conn.del::<_, ()>(&key)
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to delete OTP from Redis: {}", e)))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis ping failed: {}", e)))?;
        Ok(())
    }
}
