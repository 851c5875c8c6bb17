use std::str::FromStr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Clone, Debug, Deserialize)]
pub struct Listen {
    pub bind_ip: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Listen {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl Postgres {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        let ssl_mode = PgSslMode::from_str(&self.ssl_mode).map_err(|e| {
            ConfigError::Message(format!("invalid postgres.ssl_mode {}: {}", self.ssl_mode, e))
        })?;

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.name)
            .ssl_mode(ssl_mode))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub listen: Listen,
    pub postgres: Postgres,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("listen.bind_ip", "localhost")?
            .set_default("listen.port", 8080)?
            .set_default("listen.request_timeout_secs", 15)?
            .set_default("postgres.host", "localhost")?
            .set_default("postgres.port", 5432)?
            .set_default("postgres.username", "docker")?
            .set_default("postgres.password", "docker")?
            .set_default("postgres.name", "docker")?
            .set_default("postgres.ssl_mode", "disable")?
            .set_default("postgres.max_connections", 10)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CARDS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::new("does-not-exist.toml").unwrap();

        assert_eq!(settings.listen.address(), "localhost:8080");
        assert_eq!(settings.listen.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.postgres.port, 5432);
        assert_eq!(settings.postgres.max_connections, 10);
    }

    #[test]
    fn test_connect_options() {
        let settings = Settings::new("does-not-exist.toml").unwrap();
        let options = settings.postgres.connect_options().unwrap();

        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_database(), Some("docker"));
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut settings = Settings::new("does-not-exist.toml").unwrap();
        settings.postgres.ssl_mode = "sometimes".to_string();

        assert!(settings.postgres.connect_options().is_err());
    }
}
