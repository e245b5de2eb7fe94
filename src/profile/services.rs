use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::services::{validate_name, validate_password},
    error::AppError,
    users::{ProfileUpdate, User, UserStore},
};

/// Reads and edits the caller's own record.
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn UserStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<User, AppError> {
        Ok(self.store.find_by_id(user_id).await?)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        mut update: ProfileUpdate,
    ) -> Result<(), AppError> {
        if update.is_empty() {
            debug!(%user_id, "empty profile update");
            return Ok(());
        }
        if let Some(name) = update.name.as_mut() {
            validate_name(name)?;
            *name = name.trim().to_string();
        }
        if let Some(password) = update.password.as_deref() {
            validate_password(password)?;
        }

        let name_changed = update.name.is_some();
        let password_changed = update.password.is_some();
        self.store.update(user_id, update).await?;

        info!(%user_id, name_changed, password_changed, "profile updated");
        Ok(())
    }
}
