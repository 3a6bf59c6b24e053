//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use rust_decimal::Decimal;
use std::env;

use crate::auth::AuthConfig;
use crate::payments::providers::StripeConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub limits: PaymentLimitsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Outbound mail configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    /// When set, mail is written to files in this directory instead of
    /// being sent over SMTP. Development only.
    pub file_transport_dir: Option<String>,
}

/// Amount bounds for the two payment flows
#[derive(Debug, Clone)]
pub struct PaymentLimitsConfig {
    pub reservation_max_amount: Decimal,
    pub topup_min_amount: Decimal,
    pub topup_max_amount: Decimal,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            stripe: StripeConfig::from_env().map_err(|e| {
                ConfigError::MissingVariable(format!("payment provider config: {}", e))
            })?,
            email: EmailConfig::from_env()?,
            auth: AuthConfig::from_env()
                .map_err(|e| ConfigError::MissingVariable(format!("auth config: {}", e)))?,
            limits: PaymentLimitsConfig::from_env()?,
        })
    }

    /// Validate the entire configuration. Required secrets must be
    /// present at startup; the service fails closed otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.email.validate()?;
        self.limits.validate()?;

        if self.stripe.secret_key.is_empty() {
            return Err(ConfigError::InvalidValue("STRIPE_SECRET_KEY".to_string()));
        }
        if self.stripe.webhook_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "STRIPE_WEBHOOK_SECRET".to_string(),
            ));
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let enabled = env::var("EMAIL_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .to_lowercase()
            != "false";

        Ok(EmailConfig {
            enabled,
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SMTP_PORT".to_string()))?,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@toiletpass.fr".to_string()),
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "ToiletPass".to_string()),
            file_transport_dir: env::var("EMAIL_FILE_TRANSPORT_DIR").ok(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.file_transport_dir.is_none() {
            if self.smtp_username.is_empty() {
                return Err(ConfigError::MissingVariable("SMTP_USERNAME".to_string()));
            }
            if self.smtp_password.is_empty() {
                return Err(ConfigError::MissingVariable("SMTP_PASSWORD".to_string()));
            }
        }

        if self.from_email.is_empty() {
            return Err(ConfigError::InvalidValue("EMAIL_FROM".to_string()));
        }

        Ok(())
    }
}

impl PaymentLimitsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let parse_decimal = |name: &str, default: &str| -> Result<Decimal, ConfigError> {
            env::var(name)
                .unwrap_or_else(|_| default.to_string())
                .parse::<Decimal>()
                .map_err(|_| ConfigError::InvalidValue(name.to_string()))
        };

        Ok(PaymentLimitsConfig {
            reservation_max_amount: parse_decimal("RESERVATION_MAX_AMOUNT", "100")?,
            topup_min_amount: parse_decimal("TOPUP_MIN_AMOUNT", "5")?,
            topup_max_amount: parse_decimal("TOPUP_MAX_AMOUNT", "100")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reservation_max_amount <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue(
                "RESERVATION_MAX_AMOUNT must be positive".to_string(),
            ));
        }

        if self.topup_min_amount > self.topup_max_amount {
            return Err(ConfigError::InvalidValue(
                "TOPUP_MIN_AMOUNT must be <= TOPUP_MAX_AMOUNT".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
