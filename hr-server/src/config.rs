//! Server configuration

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::auth::{DataTokenCodec, SessionTokenCodec};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_JWT_EXPIRY_MINUTES: i64 = 60;
const DEFAULT_DATA_JWT_EXPIRY_MINUTES: i64 = 5;
const DEFAULT_SESSION_GC_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Where the relational store lives
#[derive(Debug, Clone)]
pub enum DatabaseTarget {
    /// Full connection URL (env: DATABASE_URL)
    Url(String),
    /// Discrete settings (env: DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_NAME, DB_SSH)
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        name: String,
        ssl_mode: Option<String>,
    },
}

impl DatabaseTarget {
    /// Build sqlx connect options
    pub fn connect_options(&self) -> Result<PgConnectOptions, BoxError> {
        match self {
            Self::Url(url) => Ok(url.parse()?),
            Self::Parts {
                host,
                port,
                user,
                password,
                name,
                ssl_mode,
            } => {
                let mut options = PgConnectOptions::new()
                    .host(host)
                    .port(*port)
                    .username(user)
                    .password(password)
                    .database(name);
                if let Some(mode) = ssl_mode {
                    options = options.ssl_mode(mode.parse::<PgSslMode>()?);
                }
                Ok(options)
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP listen address
    pub http_addr: String,
    /// PostgreSQL target
    pub database: DatabaseTarget,
    /// Pool size
    pub db_max_connections: u32,
    /// Pre-shared application key (header `x-csv-key`)
    pub app_key: String,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Session token lifetime, also used as the session-store TTL
    pub jwt_expiry_minutes: i64,
    /// HMAC secret for mobile data tokens
    pub data_jwt_secret: String,
    /// Data token lifetime
    pub data_jwt_expiry_minutes: i64,
    /// Identity whose actions are flagged in the audit log
    pub super_admin: Option<String>,
    /// Expired-session sweep interval
    pub session_gc_interval_secs: u64,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BoxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let database = match lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            Some(url) => DatabaseTarget::Url(url),
            None => {
                let host = lookup("DB_HOST")
                    .filter(|s| !s.is_empty())
                    .ok_or("DATABASE_URL or DB_HOST must be set")?;
                let name = lookup("DB_NAME")
                    .filter(|s| !s.is_empty())
                    .ok_or("DATABASE_URL or DB_NAME must be set")?;
                DatabaseTarget::Parts {
                    host,
                    port: parse_or(lookup("DB_PORT"), 5432),
                    user: lookup("DB_USER").unwrap_or_else(|| "postgres".into()),
                    password: lookup("DB_PASSWORD").unwrap_or_default(),
                    name,
                    ssl_mode: lookup("DB_SSH").filter(|s| !s.is_empty()),
                }
            }
        };

        Ok(Self {
            http_addr: lookup("HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.into()),
            database,
            db_max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS),
            app_key: require_secret(&lookup, "APP_KEY", &environment)?,
            jwt_secret: require_secret(&lookup, "JWT_SECRET_KEY", &environment)?,
            jwt_expiry_minutes: parse_or(lookup("JWT_EXPIRED_TIME"), DEFAULT_JWT_EXPIRY_MINUTES),
            data_jwt_secret: require_secret(&lookup, "JWT_DATA_SECRET_KEY", &environment)?,
            data_jwt_expiry_minutes: parse_or(
                lookup("JWT_DATA_EXPIRED_TIME"),
                DEFAULT_DATA_JWT_EXPIRY_MINUTES,
            ),
            super_admin: lookup("SUPER_ADMIN").filter(|s| !s.is_empty()),
            session_gc_interval_secs: parse_or(
                lookup("SESSION_GC_INTERVAL_SECS"),
                DEFAULT_SESSION_GC_SECS,
            ),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: lookup("LOG_JSON").is_some_and(|v| v == "true" || v == "1"),
            log_dir: Some(lookup("LOG_DIR").unwrap_or_else(|| "./assets/log".into()))
                .filter(|s| !s.is_empty()),
            environment,
        })
    }

    /// Session token codec (JWT_SECRET_KEY, JWT_EXPIRED_TIME)
    pub fn session_token_codec(&self) -> SessionTokenCodec {
        SessionTokenCodec::new(
            &self.jwt_secret,
            chrono::Duration::minutes(self.jwt_expiry_minutes),
        )
    }

    /// Mobile data token codec (JWT_DATA_SECRET_KEY, JWT_DATA_EXPIRED_TIME).
    ///
    /// Data tokens are stateless and never pass through the session gate, so
    /// the codec is not part of the server state.
    pub fn data_token_codec(&self) -> DataTokenCodec {
        DataTokenCodec::new(
            &self.data_jwt_secret,
            chrono::Duration::minutes(self.data_jwt_expiry_minutes),
        )
    }
}

/// Require a secret: must be set and non-empty outside development.
fn require_secret<F>(lookup: &F, name: &str, environment: &str) -> Result<String, BoxError>
where
    F: Fn(&str) -> Option<String>,
{
    let val = match lookup(name) {
        Some(v) => v,
        None => {
            if environment != "development" {
                return Err(format!("{name} must be set in {environment} environment").into());
            }
            format!("dev-{name}-not-for-production")
        }
    };
    if val.is_empty() && environment != "development" {
        return Err(format!("{name} must not be empty in {environment} environment").into());
    }
    Ok(val)
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_development_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/hr")]))
                .unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.jwt_expiry_minutes, 60);
        assert_eq!(config.data_jwt_expiry_minutes, 5);
        assert_eq!(config.session_gc_interval_secs, 10);
        assert_eq!(config.app_key, "dev-APP_KEY-not-for-production");
        assert_eq!(config.log_dir.as_deref(), Some("./assets/log"));
        assert!(config.super_admin.is_none());
        assert!(matches!(config.database, DatabaseTarget::Url(_)));
    }

    #[test]
    fn test_token_codecs_use_their_own_secrets() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("JWT_SECRET_KEY", "session-secret-0123456789"),
            ("JWT_DATA_SECRET_KEY", "data-secret-0123456789"),
            ("JWT_DATA_EXPIRED_TIME", "2"),
        ]))
        .unwrap();
        let data = config.data_token_codec();
        assert_eq!(data.ttl(), chrono::Duration::minutes(2));

        let token = data
            .issue(&crate::auth::DataPayload {
                employee_id: "E042".into(),
                date_in_seconds: 1_700_000_000,
                coordinates: "10.7769,106.7009".into(),
                shift_id: 3,
            })
            .unwrap();
        assert_eq!(data.verify(&token).unwrap().shift_id, 3);
        assert!(config.session_token_codec().verify(&token).is_err());
    }

    #[test]
    fn test_production_requires_secrets() {
        let result = Config::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "production"),
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("JWT_SECRET_KEY", "s"),
            ("JWT_DATA_SECRET_KEY", "d"),
        ]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("APP_KEY"));
    }

    #[test]
    fn test_production_rejects_empty_secret() {
        let result = Config::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "production"),
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("APP_KEY", ""),
            ("JWT_SECRET_KEY", "s"),
            ("JWT_DATA_SECRET_KEY", "d"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_database_parts() {
        let config = Config::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_USER", "hr"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "hr_admin"),
            ("DB_SSH", "disable"),
        ]))
        .unwrap();
        match &config.database {
            DatabaseTarget::Parts {
                host, port, name, ssl_mode, ..
            } => {
                assert_eq!(host, "db.internal");
                assert_eq!(*port, 6543);
                assert_eq!(name, "hr_admin");
                assert_eq!(ssl_mode.as_deref(), Some("disable"));
            }
            other => panic!("unexpected target: {other:?}"),
        }
        assert!(config.database.connect_options().is_ok());
    }

    #[test]
    fn test_missing_database_is_error() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/hr"),
            ("JWT_EXPIRED_TIME", "soon"),
            ("SESSION_GC_INTERVAL_SECS", "-3"),
            ("LOG_JSON", "1"),
            ("SUPER_ADMIN", "1105"),
        ]))
        .unwrap();
        assert_eq!(config.jwt_expiry_minutes, 60);
        assert_eq!(config.session_gc_interval_secs, 10);
        assert!(config.log_json);
        assert_eq!(config.super_admin.as_deref(), Some("1105"));
    }
}
