//! Process configuration.
//!
//! Loaded once at startup from defaults, an optional TOML file and
//! `POLYSTORE_`-prefixed environment variables, then validated. Nothing
//! mutates a [`Config`] after [`Config::load`] returns.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;

pub const CONFIG_PATH_ENV: &str = "POLYSTORE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_PREFIX: &str = "POLYSTORE_";

/// Keys whose environment values are kept verbatim. Figment otherwise parses
/// `12345` or `007` into numbers before they reach a `String` field.
const TEXT_KEYS: &[&str] = &[
    "loglevel",
    "server.listen_addr",
    "server.env",
    "database.relational.driver",
    "database.relational.host",
    "database.relational.user",
    "database.relational.password",
    "database.relational.dbname",
    "database.relational.timezone",
    "database.relational.charset",
    "database.redis.host",
    "database.mongodb.uri",
    "database.mongodb.app_name",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub loglevel: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            env: "development".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub relational: RelationalConfig,
    pub redis: KeyValueConfig,
    pub mongodb: DocumentConfig,
}

/// `yes` / `no` switch used for backend activation and the pool monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Yes,
    #[default]
    No,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Toggle::Yes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalDriver {
    MySql,
    Postgres,
    Sqlite,
}

impl RelationalDriver {
    pub fn is_embedded(self) -> bool {
        self == RelationalDriver::Sqlite
    }

    pub fn default_port(self) -> u16 {
        match self {
            RelationalDriver::MySql => 3306,
            RelationalDriver::Postgres => 5432,
            RelationalDriver::Sqlite => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationalDriver::MySql => "mysql",
            RelationalDriver::Postgres => "postgres",
            RelationalDriver::Sqlite => "sqlite3",
        }
    }
}

impl FromStr for RelationalDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(RelationalDriver::MySql),
            "postgres" | "postgresql" => Ok(RelationalDriver::Postgres),
            "sqlite3" | "sqlite" => Ok(RelationalDriver::Sqlite),
            other => Err(format!(
                "database.relational.driver `{other}` is not one of mysql, postgres, sqlite3"
            )),
        }
    }
}

impl std::fmt::Display for RelationalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    #[default]
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

/// Statement log verbosity of the relational driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlLogLevel {
    Silent,
    Error,
    #[default]
    Warn,
    Info,
}

impl From<SqlLogLevel> for log::LevelFilter {
    fn from(level: SqlLogLevel) -> Self {
        match level {
            SqlLogLevel::Silent => log::LevelFilter::Off,
            SqlLogLevel::Error => log::LevelFilter::Error,
            SqlLogLevel::Warn => log::LevelFilter::Warn,
            SqlLogLevel::Info => log::LevelFilter::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalConfig {
    pub activate: Toggle,
    /// Engine name; only checked once the backend is activated.
    pub driver: String,
    pub host: String,
    /// Zero picks the engine's standard port.
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Catalog name, or the database file path for `sqlite3`.
    pub dbname: String,
    pub sslmode: SslMode,
    pub timezone: String,
    pub charset: String,
    pub max_idle_conns: u32,
    pub max_open_conns: u32,
    /// Zero means connections are never recycled by age.
    pub conn_max_lifetime_secs: u64,
    pub connect_timeout_secs: u64,
    pub log_level: SqlLogLevel,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            activate: Toggle::No,
            driver: RelationalDriver::Postgres.to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            sslmode: SslMode::default(),
            timezone: "UTC".to_string(),
            charset: "utf8mb4".to_string(),
            max_idle_conns: 10,
            max_open_conns: 100,
            conn_max_lifetime_secs: 3600,
            connect_timeout_secs: 10,
            log_level: SqlLogLevel::default(),
        }
    }
}

impl RelationalConfig {
    pub fn engine(&self) -> Result<RelationalDriver, StoreError> {
        self.driver.parse().map_err(StoreError::Config)
    }

    pub fn port_for(&self, driver: RelationalDriver) -> u16 {
        match self.port {
            0 => driver.default_port(),
            port => port,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn conn_max_lifetime(&self) -> Option<Duration> {
        (self.conn_max_lifetime_secs > 0).then(|| Duration::from_secs(self.conn_max_lifetime_secs))
    }

    fn validate(&self) -> Result<(), String> {
        let driver: RelationalDriver = self.driver.parse()?;
        if self.connect_timeout_secs == 0 {
            return Err("database.relational.connect_timeout_secs must be positive".into());
        }
        if driver.is_embedded() {
            return require("database.relational.dbname", &self.dbname);
        }
        require("database.relational.host", &self.host)?;
        require("database.relational.user", &self.user)?;
        require("database.relational.dbname", &self.dbname)?;
        if self.max_open_conns == 0 {
            return Err("database.relational.max_open_conns must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueConfig {
    pub activate: Toggle,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
    pub conn_ttl_secs: u64,
}

impl Default for KeyValueConfig {
    fn default() -> Self {
        Self {
            activate: Toggle::No,
            host: "127.0.0.1".to_string(),
            port: 6379,
            pool_size: 10,
            conn_ttl_secs: 5,
        }
    }
}

impl KeyValueConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.conn_ttl_secs)
    }

    fn validate(&self) -> Result<(), String> {
        require("database.redis.host", &self.host)?;
        if self.port == 0 {
            return Err("database.redis.port must be set".into());
        }
        if self.pool_size == 0 {
            return Err("database.redis.pool_size must be positive".into());
        }
        if self.conn_ttl_secs == 0 {
            return Err("database.redis.conn_ttl_secs must be positive".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub activate: Toggle,
    pub uri: String,
    pub pool_size: u32,
    pub app_name: String,
    pub conn_ttl_secs: u64,
    pub pool_mon: Toggle,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            activate: Toggle::No,
            uri: "mongodb://127.0.0.1:27017".to_string(),
            pool_size: 50,
            app_name: "polystore".to_string(),
            conn_ttl_secs: 10,
            pool_mon: Toggle::No,
        }
    }
}

impl DocumentConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.conn_ttl_secs)
    }

    fn validate(&self) -> Result<(), String> {
        let uri = Url::parse(&self.uri)
            .map_err(|e| format!("database.mongodb.uri is not a valid URI: {e}"))?;
        if !matches!(uri.scheme(), "mongodb" | "mongodb+srv") {
            return Err(format!(
                "database.mongodb.uri has unsupported scheme `{}`",
                uri.scheme()
            ));
        }
        if self.pool_size == 0 {
            return Err("database.mongodb.pool_size must be positive".into());
        }
        if self.conn_ttl_secs == 0 {
            return Err("database.mongodb.conn_ttl_secs must be positive".into());
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

impl Config {
    /// Load from `.env`, the TOML file named by `POLYSTORE_CONFIG` and the environment.
    pub fn load() -> Result<Self, StoreError> {
        let path: PathBuf = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path));
        Self::from_figment(with_env(figment))
    }

    /// Extract and validate from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self, StoreError> {
        let cfg: Config = figment.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, StoreError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)),
        )
    }

    /// Reject missing or malformed fields of activated backends.
    pub fn validate(&self) -> Result<(), StoreError> {
        let db = &self.database;
        let checks = [
            (db.relational.activate, db.relational.validate()),
            (db.redis.activate, db.redis.validate()),
            (db.mongodb.activate, db.mongodb.validate()),
        ];
        for (activate, result) in checks {
            if activate.is_on() {
                result.map_err(StoreError::Config)?;
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.env.eq_ignore_ascii_case("production")
    }

    /// Production emits one JSON object per event; anything else stays human-readable.
    pub fn log_format(&self) -> LogFormat {
        if self.is_production() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Layer `POLYSTORE_*` variables on top of `figment`.
fn with_env(figment: Figment) -> Figment {
    let env = Env::prefixed(ENV_PREFIX).split("__");
    let text: Vec<(String, String)> = env
        .clone()
        .only(TEXT_KEYS)
        .iter()
        .map(|(key, value)| (key.as_str().to_string(), value))
        .collect();
    text.into_iter()
        .fold(figment.merge(env.ignore(TEXT_KEYS)), |fig, (key, value)| {
            fig.merge(Serialized::default(&key, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_activate_nothing() {
        let cfg = Config::from_toml_str("").unwrap();
        assert!(!cfg.database.relational.activate.is_on());
        assert!(!cfg.database.redis.activate.is_on());
        assert!(!cfg.database.mongodb.activate.is_on());
    }

    #[test]
    fn parses_relational_section() {
        let cfg = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "postgres"
            host = "db.internal"
            port = 5433
            user = "app"
            password = "pw"
            dbname = "app"
            sslmode = "verify-full"
            timezone = "Europe/Berlin"
            max_idle_conns = 5
            max_open_conns = 20
            conn_max_lifetime_secs = 0
            log_level = "silent"
            "#,
        )
        .unwrap();
        let rel = &cfg.database.relational;
        assert_eq!(rel.engine().unwrap(), RelationalDriver::Postgres);
        assert_eq!(rel.sslmode, SslMode::VerifyFull);
        assert_eq!(rel.port, 5433);
        assert_eq!(rel.conn_max_lifetime(), None);
        assert_eq!(log::LevelFilter::from(rel.log_level), log::LevelFilter::Off);
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "oracle"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("oracle")));
    }

    #[test]
    fn unknown_driver_of_inactive_backend_is_ignored() {
        let cfg = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "no"
            driver = "oracle"
            "#,
        );
        assert!(cfg.is_ok());
    }

    #[test]
    fn port_defaults_follow_the_engine() {
        let cfg = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "mysql"
            user = "app"
            dbname = "app"
            "#,
        )
        .unwrap();
        let rel = &cfg.database.relational;
        assert_eq!(rel.port_for(rel.engine().unwrap()), 3306);
        assert_eq!(rel.port_for(RelationalDriver::Postgres), 5432);

        let pinned = RelationalConfig {
            port: 6033,
            ..RelationalConfig::default()
        };
        assert_eq!(pinned.port_for(RelationalDriver::MySql), 6033);
    }

    #[test]
    fn numeric_looking_env_values_stay_text() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("POLYSTORE_DATABASE__RELATIONAL__PASSWORD", "12345");
            jail.set_env("POLYSTORE_DATABASE__RELATIONAL__USER", "007");
            jail.set_env("POLYSTORE_DATABASE__RELATIONAL__DBNAME", "2024");
            jail.set_env("POLYSTORE_DATABASE__RELATIONAL__PORT", "6033");
            jail.set_env("POLYSTORE_DATABASE__REDIS__HOST", "10");

            let cfg = Config::load().map_err(|e| e.to_string())?;
            let rel = &cfg.database.relational;
            assert_eq!(rel.password, "12345");
            assert_eq!(rel.user, "007");
            assert_eq!(rel.dbname, "2024");
            assert_eq!(rel.port, 6033);
            assert_eq!(cfg.database.redis.host, "10");
            Ok(())
        });
    }

    #[test]
    fn production_logs_as_json() {
        let cfg = Config::from_toml_str("[server]\nenv = \"Production\"").unwrap();
        assert!(cfg.is_production());
        assert_eq!(cfg.log_format(), LogFormat::Json);
        assert_eq!(Config::default().log_format(), LogFormat::Pretty);
    }

    #[test]
    fn unknown_toggle_is_rejected() {
        assert!(Config::from_toml_str("[database.redis]\nactivate = \"maybe\"").is_err());
    }

    #[test]
    fn sqlite_only_needs_a_path() {
        let cfg = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "sqlite3"
            host = ""
            dbname = "app.db"
            "#,
        )
        .unwrap();
        assert!(cfg.database.relational.engine().unwrap().is_embedded());

        let err = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "sqlite3"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("dbname")));
    }

    #[test]
    fn inactive_backends_are_not_validated() {
        let cfg = Config::from_toml_str(
            r#"
            [database.mongodb]
            activate = "no"
            uri = "not a uri"
            "#,
        );
        assert!(cfg.is_ok());
    }

    #[test]
    fn document_uri_scheme_is_checked() {
        let err = Config::from_toml_str(
            r#"
            [database.mongodb]
            activate = "yes"
            uri = "http://localhost:27017"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("scheme")));
    }

    #[test]
    fn networked_engine_requires_user() {
        let err = Config::from_toml_str(
            r#"
            [database.relational]
            activate = "yes"
            driver = "mysql"
            dbname = "app"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(msg) if msg.contains("user")));
    }
}
