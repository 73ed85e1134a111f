//! Mock implementation of UserRepository for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{LoginRecord, User};
use crate::db::{DbError, UserRepository};

/// Mock implementation of UserRepository using in-memory storage.
pub struct MockUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    logins: Arc<RwLock<Vec<LoginRecord>>>,
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUserRepository {
    /// Creates a new mock repository.
    pub fn new() -> Self {
        Self::with_users(Vec::new())
    }

    /// Creates a mock repository pre-populated with users.
    pub fn with_users(users: Vec<User>) -> Self {
        let map: HashMap<Uuid, User> = users.into_iter().map(|u| (u.id, u)).collect();
        Self {
            users: Arc::new(RwLock::new(map)),
            logins: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Gets a snapshot of all users in the mock.
    pub async fn snapshot(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }

    /// Gets every recorded sign-in in insertion order.
    pub async fn logins(&self) -> Vec<LoginRecord> {
        self.logins.read().await.clone()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        let mut users = self.users.write().await;

        if users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DbError::Constraint(format!(
                "User with email '{}' already exists",
                user.email
            )));
        }

        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let email = email.trim();
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn record_login(&self, record: &LoginRecord) -> Result<(), DbError> {
        self.logins.write().await.push(record.clone());
        Ok(())
    }

    async fn recent_logins(&self, user_id: Uuid, limit: u32) -> Result<Vec<LoginRecord>, DbError> {
        let logins = self.logins.read().await;
        let mut result: Vec<LoginRecord> = logins
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.logged_in_at.cmp(&a.logged_in_at));
        result.truncate(limit as usize);
        Ok(result)
    }
}
