use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    auth::{AuthService, JwtKeys},
    config::AppConfig,
    db,
    profile::ProfileService,
    users::{PgUserStore, UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub auth: AuthService,
    pub profiles: ProfileService,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        if config.jwt.uses_default_secret() {
            tracing::warn!("JWT_SECRET not set; using the built-in development secret");
        }
        let pool = db::connect(&config.database).await?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let store = Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let jwt = JwtKeys::new(&config.jwt);
        Self {
            auth: AuthService::new(store.clone(), jwt.clone()),
            profiles: ProfileService::new(store),
            jwt,
            config,
        }
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for ProfileService {
    fn from_ref(state: &AppState) -> Self {
        state.profiles.clone()
    }
}
