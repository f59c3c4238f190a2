//! Account administration service

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        page::PageRequest,
        user::{AdminUpdateUser, User},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List all accounts
    pub async fn list_users(&self, page: PageRequest) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.list(page).await
    }

    /// Change role or active flag of an account
    pub async fn update_user(&self, id: Uuid, update: AdminUpdateUser) -> AppResult<User> {
        let user = self.repository.users.admin_update(id, &update).await?;
        tracing::info!(user_id = %user.id, role = %user.role, is_active = user.is_active, "User updated");
        Ok(user)
    }
}
