use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password_async, verify_password_async},
    },
    error::AppError,
    users::{repo_types::normalize_email, NewUser, StoreError, User, UserStore},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Registration, login and token issuance.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Uuid, AppError> {
        let name = name.trim();
        let email = normalize_email(email);

        validate_name(name)?;
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::validation("Invalid email"));
        }
        validate_password(password)?;

        let password_hash = hash_password_async(password.to_string()).await.map_err(|e| {
            error!(error = %e, "hash_password failed");
            AppError::Internal(e)
        })?;

        let id = self
            .store
            .create(NewUser {
                name: name.to_string(),
                email: email.clone(),
                password_hash,
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateEmail) {
                    warn!(email = %email, "email already registered");
                }
                AppError::from(e)
            })?;

        info!(user_id = %id, email = %email, "user registered");
        Ok(id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let email = normalize_email(email);

        let user = match self.store.find_by_email(&email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!(email = %email, "login unknown email");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(AppError::Store(e)),
        };

        let ok = verify_password_async(password.to_string(), user.password.clone()).await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AppError::Internal(e)
        })?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome { token, user })
    }
}
