use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// Longest accepted token lifetime: one year.
pub const JWT_TTL_MAX_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { max_limit: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accounts".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accounts-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60)?,
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");
        check_ttl(jwt.ttl_minutes)?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("PASSWORD_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("PASSWORD_ITERATIONS", defaults.iterations)?,
            parallelism: env_or("PASSWORD_PARALLELISM", defaults.parallelism)?,
        };

        let pagination = PaginationConfig {
            max_limit: env_or("PAGE_MAX_LIMIT", PaginationConfig::default().max_limit)?,
        };
        anyhow::ensure!(pagination.max_limit > 0, "PAGE_MAX_LIMIT must be positive");

        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt,
            password,
            pagination,
        })
    }
}

fn check_ttl(minutes: i64) -> anyhow::Result<()> {
    anyhow::ensure!(minutes > 0, "JWT_TTL_MINUTES must be positive");
    anyhow::ensure!(
        minutes <= JWT_TTL_MAX_MINUTES,
        "JWT_TTL_MINUTES must be at most {JWT_TTL_MAX_MINUTES}"
    );
    Ok(())
}

/// Reads an optional variable, falling back to `default` when unset.
/// A value that is present but unparsable is an error.
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
