use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{NewUser, RepositoryError, User, UserRepository};

/// Process-local user store (dev/test).
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    by_username: BTreeMap<String, User>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().by_username.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.lock().unwrap().by_username.get(username).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.by_username.contains_key(&user.username) {
            return Err(RepositoryError::Conflict(user.username));
        }

        inner.next_id += 1;
        let now = Utc::now();
        let stored = User {
            id: inner.next_id,
            username: user.username.clone(),
            password_hash: user.password_hash,
            created_at: now,
            edited_at: now,
        };
        inner.by_username.insert(user.username, stored.clone());
        Ok(stored)
    }
}
