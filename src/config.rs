use serde::Deserialize;

pub const DEFAULT_JWT_SECRET: &str = "default-secret-key-please-change";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

impl JwtConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_JWT_SECRET
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Full connection string; takes precedence over the individual parts.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode=disable",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(fallback)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            host: env_or("DB_HOST", "localhost"),
            port: env_parse("DB_PORT", 5432),
            user: env_or("DB_USER", "postgres"),
            password: env_or("DB_PASSWORD", "postgres"),
            name: env_or("DB_NAME", "chat_app"),
            url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            max_connections: env_parse("DB_MAX_CONNECTIONS", 25),
        };
        let missing_parts =
            database.host.is_empty() || database.user.is_empty() || database.name.is_empty();
        if database.url.is_none() && missing_parts {
            anyhow::bail!(
                "invalid database configuration: DB_HOST, DB_USER and DB_NAME must be set"
            );
        }

        let jwt = JwtConfig {
            secret: env_or("JWT_SECRET", DEFAULT_JWT_SECRET),
        };

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("APP_PORT"))
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port,
            database,
            jwt,
        })
    }
}
