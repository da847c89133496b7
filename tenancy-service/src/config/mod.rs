use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// Public origin used to build links in outbound mail.
    pub public_base_url: String,
    /// `None` selects the in-memory store (dev and tests only).
    pub database: Option<DatabaseConfig>,
    /// `None` selects the in-process session blacklist.
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
    /// `None` logs outbound mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub sender_address: String,
    pub sender_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub sign_in_attempts: u32,
    pub sign_in_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limits on the first `x-forwarded-for` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

const DEV_JWT_SECRET: &str = "dev-only-secret-change-me-0123456789abcdef";

impl TenancyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match get_optional_env("DATABASE_URL", is_prod)? {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            }),
            None => None,
        };

        let smtp = match get_optional_env("SMTP_HOST", is_prod)? {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                sender_address: get_env("MAIL_SENDER_ADDRESS", None, is_prod)?,
                sender_name: get_env("MAIL_SENDER_NAME", Some("Tenancy"), is_prod)?,
            }),
            None => None,
        };

        let config = TenancyConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("tenancy-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            public_base_url: get_env("PUBLIC_BASE_URL", Some("http://localhost:8080"), is_prod)?
                .trim_end_matches('/')
                .to_string(),
            database,
            redis: get_optional_env("REDIS_URL", is_prod)?.map(|url| RedisConfig { url }),
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", Some(DEV_JWT_SECRET), is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "60",
                    is_prod,
                )?,
            },
            smtp,
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                sign_in_attempts: parse_env("RATE_LIMIT_SIGN_IN_ATTEMPTS", "5", is_prod)?,
                sign_in_window_seconds: parse_env(
                    "RATE_LIMIT_SIGN_IN_WINDOW_SECONDS",
                    "900",
                    is_prod,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
                trust_forwarded_for: parse_env("TRUST_FORWARDED_FOR", "false", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if let Some(database) = &self.database {
            if database.min_connections > database.max_connections {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS"
                )));
            }
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.jwt.secret.len() < 32 || self.jwt.secret == DEV_JWT_SECRET {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be a unique value of at least 32 bytes in production"
                )));
            }
        }

        Ok(())
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

/// Backing services are optional in dev, mandatory in prod.
fn get_optional_env(key: &str, is_prod: bool) -> Result<Option<String>, AppError> {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(Some(val)),
        _ if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        _ => Ok(None),
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> TenancyConfig {
        TenancyConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "tenancy-service".to_string(),
            service_version: "test".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            public_base_url: "http://localhost:8080".to_string(),
            database: None,
            redis: None,
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.to_string(),
                access_token_expiry_minutes: 60,
            },
            smtp: None,
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            rate_limit: RateLimitConfig {
                sign_in_attempts: 5,
                sign_in_window_seconds: 900,
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
                trust_forwarded_for: false,
            },
        }
    }

    #[test]
    fn parses_environment_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn dev_defaults_are_valid() {
        assert!(dev_config().validate().is_ok());
    }

    #[test]
    fn prod_rejects_the_dev_secret_and_wildcard_origins() {
        let mut config = dev_config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.jwt.secret = "a-very-long-production-secret-value-0001".to_string();
        assert!(config.validate().is_ok());

        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_token_expiry_is_rejected() {
        let mut config = dev_config();
        config.jwt.access_token_expiry_minutes = 0;
        assert!(config.validate().is_err());
    }
}
