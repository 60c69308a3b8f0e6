use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Placeholder secret for local development. Refused in production mode.
pub const DEV_SIGNING_SECRET: &str = "dev-secret-change-in-prod";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Long-run average admission rate per client.
    pub requests_per_minute: u32,
    /// Token-bucket capacity; short bursts up to this size are admitted.
    pub burst_size: u32,
    pub strategy: RateLimitStrategy,
    /// Interval between idle-record sweeps.
    pub sweep_interval_secs: u64,
    /// Client records untouched for longer than this are evicted.
    pub client_idle_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub signing_secret: String,
    pub algorithm: String,
    pub token_lifetime_hours: i64,
    pub environment: Environment,
    /// Operator-supplied plaintext for the initial admin key. Only its
    /// digest is ever stored; nothing is generated or logged at startup.
    pub bootstrap_admin_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

impl FromStr for RateLimitStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "token_bucket" => Ok(Self::TokenBucket),
            "sliding_window" => Ok(Self::SlidingWindow),
            "fixed_window" => Ok(Self::FixedWindow),
            other => Err(Error::Config(format!(
                "unknown rate limit strategy: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(Error::Config(format!("unknown environment: {other}"))),
        }
    }
}

impl Config {
    /// Load configuration from the environment and validate it. A missing or
    /// placeholder signing secret in production aborts startup.
    pub fn load() -> Result<Self> {
        let config = Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: env::var("RATE_LIMIT_PER_MINUTE")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
                burst_size: env::var("RATE_LIMIT_BURST")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .unwrap_or(100),
                strategy: env::var("RATE_LIMIT_STRATEGY")
                    .unwrap_or_else(|_| "token_bucket".to_string())
                    .parse()?,
                sweep_interval_secs: env::var("RATE_LIMIT_SWEEP_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                client_idle_secs: env::var("RATE_LIMIT_IDLE_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            auth: AuthConfig {
                signing_secret: env::var("SECRET_KEY")
                    .unwrap_or_else(|_| DEV_SIGNING_SECRET.to_string()),
                algorithm: env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
                token_lifetime_hours: env::var("TOKEN_LIFETIME_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
                environment: env::var("ENVIRONMENT")
                    .unwrap_or_else(|_| "development".to_string())
                    .parse()?,
                bootstrap_admin_key: env::var("BOOTSTRAP_ADMIN_KEY").ok(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.environment == Environment::Production
            && (self.auth.signing_secret.trim().is_empty()
                || self.auth.signing_secret == DEV_SIGNING_SECRET)
        {
            return Err(Error::Config(
                "SECRET_KEY must be set to a real secret in production".to_string(),
            ));
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_PER_MINUTE must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.burst_size == 0 {
            return Err(Error::Config("RATE_LIMIT_BURST must be at least 1".to_string()));
        }
        match self.auth.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {}
            other => {
                return Err(Error::Config(format!(
                    "unsupported signing algorithm: {other} (expected HS256/HS384/HS512)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                log_level: "info".to_string(),
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: 1000,
                burst_size: 100,
                strategy: RateLimitStrategy::TokenBucket,
                sweep_interval_secs: 300,
                client_idle_secs: 3600,
            },
            auth: AuthConfig {
                signing_secret: DEV_SIGNING_SECRET.to_string(),
                algorithm: "HS256".to_string(),
                token_lifetime_hours: 24,
                environment: Environment::Development,
                bootstrap_admin_key: None,
            },
        }
    }

    #[test]
    fn dev_secret_allowed_in_development() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn dev_secret_refused_in_production() {
        let mut config = base_config();
        config.auth.environment = Environment::Production;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.auth.signing_secret = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn blank_secret_refused_in_production() {
        let mut config = base_config();
        config.auth.environment = Environment::Production;
        config.auth.signing_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!(
            "sliding_window".parse::<RateLimitStrategy>().unwrap(),
            RateLimitStrategy::SlidingWindow
        );
        assert!("leaky_bucket".parse::<RateLimitStrategy>().is_err());
    }

    #[test]
    fn unsupported_algorithm_refused() {
        let mut config = base_config();
        config.auth.algorithm = "RS256".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
