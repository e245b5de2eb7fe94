use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::password::hash_password_async;
use crate::users::repo_types::{normalize_email, NewUser, ProfileUpdate, User, UserChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("database operation failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hash error: {0}")]
    Hash(String),
}

/// Persistence of user rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, returning the assigned id.
    async fn create(&self, user: NewUser) -> Result<Uuid, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    /// Write the present columns atomically. Empty changes must not fail.
    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<(), StoreError>;

    /// Hash the password (if any) and apply the profile change.
    async fn update(&self, id: Uuid, update: ProfileUpdate) -> Result<(), StoreError> {
        let password_hash = match update.password {
            Some(plain) => Some(
                hash_password_async(plain)
                    .await
                    .map_err(|e| StoreError::Hash(e.to_string()))?,
            ),
            None => None,
        };
        self.apply_changes(
            id,
            UserChanges {
                name: update.name,
                password_hash,
            },
        )
        .await
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateEmail
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<Uuid, StoreError> {
        let email = normalize_email(&user.email);

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(&email)
                .fetch_one(&self.db)
                .await?;
        if exists {
            return Err(StoreError::DuplicateEmail);
        }

        let now = OffsetDateTime::now_utc();
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, name, email, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(map_insert_error)?;

        debug!(user_id = %id, "user row inserted");
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn apply_changes(&self, id: Uuid, changes: UserChanges) -> Result<(), StoreError> {
        if changes == UserChanges::default() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.db.begin().await?;
        let now = OffsetDateTime::now_utc();

        if let Some(name) = &changes.name {
            sqlx::query("UPDATE users SET name = $1, updated_at = $2 WHERE id = $3")
                .bind(name)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(hash) = &changes.password_hash {
            sqlx::query("UPDATE users SET password = $1, updated_at = $2 WHERE id = $3")
                .bind(hash)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(user_id = %id, "user row updated");
        Ok(())
    }
}

/// Needs a live database: `TEST_DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use super::*;
    use crate::auth::password::{hash_password, verify_password};

    async fn store() -> PgUserStore {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let db = PgPool::connect(&url).await.expect("connect test database");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");
        PgUserStore::new(db)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Tester".into(),
            email: email.into(),
            password_hash: hash_password("secret1").expect("hash"),
        }
    }

    fn unique_email() -> String {
        format!("{}@example.com", Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn duplicate_email_differing_in_case_is_rejected() {
        let store = store().await;
        let email = unique_email();
        store.create(new_user(&email)).await.expect("first insert");
        let err = store
            .create(new_user(&email.to_uppercase()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn concurrent_case_variant_registrations_yield_one_duplicate() {
        let store = store().await;
        let email = unique_email();
        let (a, b) = tokio::join!(
            store.create(new_user(&email)),
            store.create(new_user(&email.to_uppercase())),
        );

        let duplicates = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(StoreError::DuplicateEmail)))
            .count();
        assert_eq!(duplicates, 1, "a={a:?} b={b:?}");
        assert!(a.is_ok() || b.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn update_changes_only_present_fields() {
        let store = store().await;
        let email = unique_email();
        let id = store.create(new_user(&email)).await.expect("insert");
        let before = store.find_by_id(id).await.expect("find");

        store
            .update(id, ProfileUpdate { name: Some("Renamed".into()), password: None })
            .await
            .expect("update name");
        let after = store.find_by_email(&email.to_uppercase()).await.expect("find");
        assert_eq!(after.name, "Renamed");
        assert_eq!(after.password, before.password);

        store
            .update(id, ProfileUpdate { name: None, password: Some("another1".into()) })
            .await
            .expect("update password");
        let after = store.find_by_id(id).await.expect("find");
        assert_eq!(after.name, "Renamed");
        assert!(verify_password("another1", &after.password).expect("verify"));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn failed_password_write_rolls_back_name() {
        let store = store().await;
        let id = store.create(new_user(&unique_email())).await.expect("insert");

        let tag = Uuid::new_v4().simple().to_string();
        let rejected = format!("rejected-{tag}");
        let constraint = format!("reject_password_{tag}");
        sqlx::query(&format!(
            "ALTER TABLE users ADD CONSTRAINT {constraint} \
             CHECK (password <> '{rejected}') NOT VALID"
        ))
        .execute(&store.db)
        .await
        .expect("add constraint");

        let result = store
            .apply_changes(
                id,
                UserChanges {
                    name: Some("Changed".into()),
                    password_hash: Some(rejected),
                },
            )
            .await;

        sqlx::query(&format!("ALTER TABLE users DROP CONSTRAINT {constraint}"))
            .execute(&store.db)
            .await
            .expect("drop constraint");

        assert!(matches!(result, Err(StoreError::Database(_))));
        let user = store.find_by_id(id).await.expect("find");
        assert_eq!(user.name, "Tester");
        assert!(verify_password("secret1", &user.password).expect("verify"));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn unknown_id_is_not_found() {
        let store = store().await;
        let err = store.find_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
