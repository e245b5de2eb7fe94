use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{normalize_email, NewUser, User, UserChanges};

/// In-process `UserStore` for tests; counts every call it receives.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    calls: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<Uuid, StoreError> {
        self.touch();
        let email = normalize_email(&user.email);
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        users.insert(
            id,
            User {
                id,
                name: user.name,
                email,
                password: user.password_hash,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.touch();
        let email = normalize_email(email);
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.touch();
        self.get(id).ok_or(StoreError::NotFound)
    }

    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<(), StoreError> {
        self.touch();
        if changes == UserChanges::default() {
            return Ok(());
        }
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(&id) {
            if let Some(name) = changes.name {
                user.name = name;
            }
            if let Some(hash) = changes.password_hash {
                user.password = hash;
            }
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}
