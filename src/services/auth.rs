//! Registration, OTP verification and session management

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use totp_lite::totp_custom;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, User, UserClaims},
    repository::Repository,
    services::{email::EmailService, redis::RedisService},
};

/// Access token handed to a client after login or verification
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expiry_time: DateTime<Utc>,
}

/// Six-digit code derived from a fresh random TOTP secret
fn generate_otp() -> String {
    let mut secret = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut secret);
    let now = Utc::now().timestamp() as u64;
    totp_custom::<sha1::Sha1>(30, 6, &secret, now)
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
    redis: RedisService,
    email: EmailService,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig, redis: RedisService, email: EmailService) -> Self {
        Self {
            repository,
            config,
            redis,
            email,
        }
    }

    /// Create an inactive member account and email its verification code
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;

        if self.repository.users.email_exists(&request.email).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
        if self.repository.users.username_exists(&request.username).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let password_hash = self.hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.username, &request.email, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, "User registered");

        self.issue_otp(&user).await?;
        Ok(user)
    }

    /// Send a new verification code to an account that is not yet active
    pub async fn resend_otp(&self, email: &str) -> AppResult<()> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if user.is_active {
            return Err(AppError::Conflict("Account already verified".to_string()));
        }

        self.issue_otp(&user).await
    }

    /// Check the emailed code, activate the account and open a session
    pub async fn verify_otp(&self, email: &str, code: &str) -> AppResult<(IssuedToken, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

        if user.is_active {
            return Err(AppError::Conflict("Account already verified".to_string()));
        }

        if !self.redis.verify_otp(user.id, code.trim()).await? {
            return Err(AppError::Authentication("Invalid or expired OTP".to_string()));
        }

        let user = self.repository.users.activate(user.id).await?;
        tracing::info!(user_id = %user.id, "Account verified");

        let token = self.create_token_for_user(&user).await?;
        Ok((token, user))
    }

    /// Authenticate by email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(IssuedToken, User)> {
        let mut user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        if !user.is_active {
            return Err(AppError::Authentication("Account is not verified".to_string()));
        }

        let token = self.create_token_for_user(&user).await?;

        let now = Utc::now();
        self.repository.users.touch_last_login(user.id, now).await?;
        user.last_login = Some(now);

        Ok((token, user))
    }

    /// Revoke a token
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        if !self.repository.tokens.blacklist(token).await? {
            return Err(AppError::Authentication("Unknown token".to_string()));
        }
        Ok(())
    }

    /// Decode a bearer token, reject revoked ones and resolve the account
    /// as currently stored (role and active flag)
    pub async fn validate_token(&self, token: &str) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        if self.repository.tokens.is_blacklisted(token).await? {
            return Err(AppError::Authentication("Token has been revoked".to_string()));
        }

        let user = match self.repository.users.get_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication("Account no longer exists".to_string()))
            }
            Err(e) => return Err(e),
        };

        claims.for_account(&user)
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    async fn issue_otp(&self, user: &User) -> AppResult<()> {
        let code = generate_otp();
        self.redis
            .store_otp(user.id, &code, self.config.otp_expiration_minutes * 60)
            .await?;

        // Delivery failures are not fatal: the user can ask for a new code
        if let Err(e) = self
            .email
            .send_otp_code(&user.email, &user.username, &code, self.config.otp_expiration_minutes)
            .await
        {
            tracing::warn!(user_id = %user.id, "Failed to send verification email: {}", e);
        }

        Ok(())
    }

    async fn create_token_for_user(&self, user: &User) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let expiry_time = now + Duration::minutes(self.config.jwt_expiration_minutes);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: expiry_time.timestamp(),
            iat: now.timestamp(),
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        self.repository.tokens.record(user.id, &token, expiry_time).await?;

        Ok(IssuedToken { token, expiry_time })
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_shape() {
        for _ in 0..20 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
