//! Business logic services

pub mod auth;
pub mod catalog;
pub mod email;
pub mod lending;
pub mod redis;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, EmailConfig},
    models::loan::LendingPolicy,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    pub users: users::UsersService,
    pub redis: redis::RedisService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        email_config: EmailConfig,
        lending_policy: LendingPolicy,
        redis_service: redis::RedisService,
    ) -> Self {
        let email = email::EmailService::new(email_config);
        Self {
            auth: auth::AuthService::new(repository.clone(), auth_config, redis_service.clone(), email),
            catalog: catalog::CatalogService::new(repository.clone()),
            lending: lending::LendingService::new(Arc::new(repository.ledger.clone()), lending_policy),
            users: users::UsersService::new(repository.clone()),
            redis: redis_service,
            repository,
        }
    }
}
