//! Issued access tokens and logout blacklist

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppResult;

/// Tokens are stored as SHA-256 hex digests, never in clear
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct TokensRepository {
    pool: Pool<Postgres>,
}

impl TokensRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn record(&self, user_id: Uuid, token: &str, expiry_time: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO access_tokens (user_id, token_digest, expiry_time) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_digest(token))
        .bind(expiry_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Blacklist a token; returns false if it was never issued
    pub async fn blacklist(&self, token: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE access_tokens SET blacklisted = TRUE WHERE token_digest = $1",
        )
        .bind(token_digest(token))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_blacklisted(&self, token: &str) -> AppResult<bool> {
        let blacklisted: Option<bool> = sqlx::query_scalar(
            "SELECT blacklisted FROM access_tokens WHERE token_digest = $1",
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .await?;
        Ok(blacklisted.unwrap_or(false))
    }
}
