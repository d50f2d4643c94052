use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

/// SMTP relay settings; absent when confirmation emails should only be logged
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub confirmation_secret: String,
    pub confirmation_code_maxage: i64,
    /// Signup variant: `true` activates accounts immediately, `false` leaves
    /// them pending until the first successful token exchange
    pub signup_activates_user: bool,
    pub frontend_url: String,
    pub port: u16,
    pub log_dir: String,
    pub smtp: Option<SmtpConfig>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let confirmation_secret =
            std::env::var("CONFIRMATION_SECRET_KEY").unwrap_or_else(|_| jwt_secret.clone());

        let smtp = match std::env::var("SMTP_SERVER") {
            Ok(server) => Some(SmtpConfig {
                server,
                port: parsed_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            }),
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_maxage: parsed_or("JWT_MAXAGE", 24 * 60 * 60)?,
            confirmation_secret,
            confirmation_code_maxage: parsed_or("CONFIRMATION_CODE_MAXAGE", 3 * 24 * 60 * 60)?,
            signup_activates_user: parsed_or("SIGNUP_ACTIVATES_USER", false)?,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: parsed_or("PORT", 8000)?,
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
            smtp,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/review_backend_test".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            jwt_maxage: 3600,
            confirmation_secret: "test-confirmation-secret".to_string(),
            confirmation_code_maxage: 3600,
            signup_activates_user: false,
            frontend_url: "http://localhost:3000".to_string(),
            port: 8000,
            log_dir: "./logs".to_string(),
            smtp: None,
        }
    }
}
