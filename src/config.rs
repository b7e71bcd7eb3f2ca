use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides the discrete fields when present.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl: bool,
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    /// Hosted UI domain prefix, e.g. `quantified-me` for
    /// `quantified-me.auth.<region>.amazoncognito.com`.
    pub domain: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cognito: CognitoConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: var("DATABASE_URL").filter(|v| !v.is_empty()),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_or("DB_PORT", var("DB_PORT"), 5432)?,
            name: var("DB_NAME").unwrap_or_else(|| "quantified_me".into()),
            user: var("DB_USER").unwrap_or_else(|| "postgres".into()),
            password: var("DB_PASSWORD").filter(|v| !v.is_empty()),
            ssl: var("DB_SSL").map(|v| v == "true").unwrap_or(false),
            max_connections: parse_or("DB_MAX_CONNECTIONS", var("DB_MAX_CONNECTIONS"), 20)?,
            idle_timeout: Duration::from_secs(parse_or(
                "DB_IDLE_TIMEOUT_SECS",
                var("DB_IDLE_TIMEOUT_SECS"),
                30,
            )?),
            acquire_timeout: Duration::from_secs(parse_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                var("DB_ACQUIRE_TIMEOUT_SECS"),
                2,
            )?),
        };

        let cognito = CognitoConfig {
            region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".into()),
            user_pool_id: var("COGNITO_USER_POOL_ID")
                .ok_or(ConfigError::Missing("COGNITO_USER_POOL_ID"))?,
            client_id: var("COGNITO_CLIENT_ID").ok_or(ConfigError::Missing("COGNITO_CLIENT_ID"))?,
            domain: var("COGNITO_DOMAIN").filter(|v| !v.is_empty()),
            redirect_uri: var("COGNITO_REDIRECT_URI")
                .unwrap_or_else(|| "http://localhost:3000".into()),
        };

        Ok(Self {
            database,
            cognito,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or("PORT", var("PORT"), 3001)?,
        })
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return Ok(PgConnectOptions::from_str(url)?);
        }
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .ssl_mode(if self.ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            });
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        Ok(opts)
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
