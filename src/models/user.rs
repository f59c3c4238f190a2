//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// User role, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Librarian,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Librarian => "librarian",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "librarian" => Ok(Role::Librarian),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role (stored as TEXT)
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Hashed password (argon2)
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reg_number: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public user representation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reg_number: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            reg_number: user.reg_number,
            bio: user.bio,
            role: user.role,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Admin update of another account
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUpdateUser {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Require at least the given role
    pub fn require_role(&self, minimum: Role) -> Result<(), AppError> {
        if self.role >= minimum {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "The {} role is required for this operation",
                minimum
            )))
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        self.require_role(Role::Librarian)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        self.require_role(Role::Admin)
    }

    /// Re-check decoded claims against the stored account. Disabled
    /// accounts are refused and the role comes from the row, so demotions
    /// apply to tokens issued before them.
    pub fn for_account(mut self, user: &User) -> Result<Self, AppError> {
        if user.id != self.user_id {
            return Err(AppError::Authentication(
                "Token does not match the account".to_string(),
            ));
        }
        if !user.is_active {
            return Err(AppError::Authentication("Account is disabled".to_string()));
        }

        self.role = user.role;
        self.sub = user.username.clone();
        self.email = user.email.clone();
        Ok(self)
    }

    /// Borrower a lending request acts for. Acting on behalf of someone
    /// else is reserved to staff.
    pub fn resolve_borrower(&self, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        match requested {
            Some(id) if id != self.user_id => {
                self.require_staff()?;
                Ok(id)
            }
            _ => Ok(self.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "ada".to_string(),
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    fn account(claims: &UserClaims, role: Role, is_active: bool) -> User {
        let now = Utc::now();
        User {
            id: claims.user_id,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: String::new(),
            first_name: None,
            last_name: None,
            reg_number: None,
            bio: None,
            role,
            is_active,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_demoted_account_loses_token_rights() {
        let token_claims = claims(Role::Admin);
        let stored = account(&token_claims, Role::Member, true);

        let current = token_claims.for_account(&stored).unwrap();
        assert_eq!(current.role, Role::Member);
        assert!(matches!(current.require_admin(), Err(AppError::Authorization(_))));
        assert!(current.resolve_borrower(Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_deactivated_account_is_refused() {
        let token_claims = claims(Role::Librarian);
        let stored = account(&token_claims, Role::Librarian, false);

        assert!(matches!(
            token_claims.for_account(&stored),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_claims_for_another_account_are_refused() {
        let token_claims = claims(Role::Member);
        let mut stored = account(&token_claims, Role::Member, true);
        stored.id = Uuid::new_v4();

        assert!(token_claims.for_account(&stored).is_err());
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Librarian);
        assert!(Role::Librarian > Role::Member);
        assert_eq!("LIBRARIAN".parse::<Role>(), Ok(Role::Librarian));
        assert!("liberian".parse::<Role>().is_err());
    }

    #[test]
    fn test_require_role() {
        assert!(claims(Role::Member).require_staff().is_err());
        assert!(claims(Role::Librarian).require_staff().is_ok());
        assert!(claims(Role::Librarian).require_admin().is_err());
        assert!(claims(Role::Admin).require_staff().is_ok());
    }

    #[test]
    fn test_resolve_borrower() {
        let member = claims(Role::Member);
        assert_eq!(member.resolve_borrower(None).unwrap(), member.user_id);
        assert_eq!(
            member.resolve_borrower(Some(member.user_id)).unwrap(),
            member.user_id
        );
        assert!(matches!(
            member.resolve_borrower(Some(Uuid::new_v4())),
            Err(AppError::Authorization(_))
        ));

        let librarian = claims(Role::Librarian);
        let other = Uuid::new_v4();
        assert_eq!(librarian.resolve_borrower(Some(other)).unwrap(), other);
    }

    #[test]
    fn test_token_round_trip() {
        let original = claims(Role::Admin);
        let token = original.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, original.user_id);
        assert_eq!(parsed.role, Role::Admin);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
