use serde::Deserialize;

/// Minimum length, in bytes, required of `API_KEY_HASH_KEY`: it keys both the
/// HMAC lookup digest and the AES-256 ciphertext, so anything shorter would
/// panic deep inside cipher construction instead of failing at boot.
const MIN_HASH_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub rabbitmq: RabbitMqConfig,
    pub api_key_hash_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RabbitMqConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl RabbitMqConfig {
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }
}

impl Config {
    /// Builds configuration the way `internal/managers/configmanager/config.go`
    /// builds `models.Config`: documented defaults first, then whatever is
    /// present in the process environment overrides them. An optional
    /// `config/default.yaml` is honored if present, matching the original's
    /// (best-effort, not-required) `viper.ReadInConfig`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("log_level", "info")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "cashflow_user")?
            .set_default("database.password", "cashflow_pass")?
            .set_default("database.name", "cashflow_dev")?
            .set_default("database.ssl_mode", "disable")?
            .set_default("rabbitmq.host", "localhost")?
            .set_default("rabbitmq.port", 5672)?
            .set_default("rabbitmq.user", "guest")?
            .set_default("rabbitmq.password", "guest")?
            .set_default("rabbitmq.vhost", "/")?
            .set_default(
                "api_key_hash_key",
                "cashflow_test_2024_secure_key_123456789",
            )?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(env_overrides())
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let valid_log_levels = ["debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(config::ConfigError::Message(format!(
                "invalid LOG_LEVEL '{}', must be one of: debug, info, warn, error",
                self.log_level
            )));
        }

        if self.api_key_hash_key.len() < MIN_HASH_KEY_LEN {
            return Err(config::ConfigError::Message(format!(
                "API_KEY_HASH_KEY must be at least {} bytes, got {}",
                MIN_HASH_KEY_LEN,
                self.api_key_hash_key.len()
            )));
        }

        Ok(())
    }
}

/// Maps the documented flat env-var names onto the nested `Config` shape.
/// `config::Environment`'s automatic nesting assumes a separator convention
/// the documented names (`DB_HOST`, `RABBITMQ_VHOST`, ...) don't follow, so
/// each one is wired explicitly instead, mirroring `getEnvAsString` call
/// sites in the original `configmanager.Load`.
fn env_overrides() -> config::Environment {
    config::Environment::default()
        .source(Some(
            [
                ("server_port", "SERVER_PORT"),
                ("log_level", "LOG_LEVEL"),
                ("db_host", "DB_HOST"),
                ("db_port", "DB_PORT"),
                ("db_user", "DB_USER"),
                ("db_password", "DB_PASSWORD"),
                ("db_name", "DB_NAME"),
                ("db_ssl_mode", "DB_SSL_MODE"),
                ("rabbitmq_host", "RABBITMQ_HOST"),
                ("rabbitmq_port", "RABBITMQ_PORT"),
                ("rabbitmq_user", "RABBITMQ_USER"),
                ("rabbitmq_password", "RABBITMQ_PASSWORD"),
                ("rabbitmq_vhost", "RABBITMQ_VHOST"),
                ("api_key_hash_key", "API_KEY_HASH_KEY"),
            ]
            .into_iter()
            .filter_map(|(_, env_name)| {
                std::env::var(env_name)
                    .ok()
                    .map(|v| (config_key_for(env_name), v))
            })
            .collect::<std::collections::HashMap<String, String>>(),
        ))
}

fn config_key_for(env_name: &str) -> String {
    match env_name {
        "SERVER_PORT" => "port".to_string(),
        "LOG_LEVEL" => "log_level".to_string(),
        "DB_HOST" => "database.host".to_string(),
        "DB_PORT" => "database.port".to_string(),
        "DB_USER" => "database.user".to_string(),
        "DB_PASSWORD" => "database.password".to_string(),
        "DB_NAME" => "database.name".to_string(),
        "DB_SSL_MODE" => "database.ssl_mode".to_string(),
        "RABBITMQ_HOST" => "rabbitmq.host".to_string(),
        "RABBITMQ_PORT" => "rabbitmq.port".to_string(),
        "RABBITMQ_USER" => "rabbitmq.user".to_string(),
        "RABBITMQ_PASSWORD" => "rabbitmq.password".to_string(),
        "RABBITMQ_VHOST" => "rabbitmq.vhost".to_string(),
        "API_KEY_HASH_KEY" => "api_key_hash_key".to_string(),
        other => other.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        // Exercises the builder's documented defaults directly, without
        // touching process environment (which is shared across test threads).
        let cfg: Config = config::Config::builder()
            .set_default("host", "0.0.0.0")
            .unwrap()
            .set_default("port", 8080)
            .unwrap()
            .set_default("log_level", "info")
            .unwrap()
            .set_default("database.host", "localhost")
            .unwrap()
            .set_default("database.port", 5432)
            .unwrap()
            .set_default("database.user", "cashflow_user")
            .unwrap()
            .set_default("database.password", "cashflow_pass")
            .unwrap()
            .set_default("database.name", "cashflow_dev")
            .unwrap()
            .set_default("database.ssl_mode", "disable")
            .unwrap()
            .set_default("rabbitmq.host", "localhost")
            .unwrap()
            .set_default("rabbitmq.port", 5672)
            .unwrap()
            .set_default("rabbitmq.user", "guest")
            .unwrap()
            .set_default("rabbitmq.password", "guest")
            .unwrap()
            .set_default("rabbitmq.vhost", "/")
            .unwrap()
            .set_default("api_key_hash_key", "cashflow_test_2024_secure_key_123456789")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.rabbitmq.vhost, "/");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_hash_key() {
        let mut cfg = sample_config();
        cfg.api_key_hash_key = "too-short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut cfg = sample_config();
        cfg.log_level = "verbose".to_string();
        assert!(cfg.validate().is_err());
    }

    fn sample_config() -> Config {
        Config {
            host: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            database: DatabaseConfig {
                host: "localhost".into(),
                port: 5432,
                user: "cashflow_user".into(),
                password: "cashflow_pass".into(),
                name: "cashflow_dev".into(),
                ssl_mode: "disable".into(),
            },
            rabbitmq: RabbitMqConfig {
                host: "localhost".into(),
                port: 5672,
                user: "guest".into(),
                password: "guest".into(),
                vhost: "/".into(),
            },
            api_key_hash_key: "cashflow_test_2024_secure_key_123456789".into(),
        }
    }
}